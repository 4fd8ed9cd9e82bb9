use crate::foundation::core::{CodecFamily, ConversionPath};

pub type ConvoyResult<T> = Result<T, ConvoyError>;

#[derive(thiserror::Error, Debug)]
pub enum ConvoyError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("backend unavailable: {backend}: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("mandatory metadata missing for {codec}: {reason}")]
    MandatoryMetadataMissing { codec: CodecFamily, reason: String },

    #[error("{path} backend failed ({reason}): {message}")]
    BackendExecution {
        path: ConversionPath,
        reason: String,
        message: String,
    },

    #[error("conversion cancelled")]
    Cancelled,

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConvoyError {
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn backend_unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    pub fn metadata_missing(codec: CodecFamily, reason: impl Into<String>) -> Self {
        Self::MandatoryMetadataMissing {
            codec,
            reason: reason.into(),
        }
    }

    pub fn backend_execution(
        path: ConversionPath,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BackendExecution {
            path,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::Telemetry(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for the cancellation terminal state (explicit or superseded).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Fatal errors never enter the fallback cascade.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::BackendUnavailable { .. }
                | Self::MandatoryMetadataMissing { .. }
                | Self::Cancelled
        )
    }
}
