//! Fixed-answer collaborators for planning without real media (CLI, tests).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{
    BackendOutput, MetadataResolver, NativeFastBackend, PipelineInfo, PipelineProbe, PipelineQuery,
    ProgressSink,
};
use crate::codec::classify::is_complex;
use crate::foundation::core::VideoMetadata;
use crate::foundation::error::{ConvoyError, ConvoyResult};
use crate::orchestrator::request::{ConversionOptions, InputFile};

/// Resolver answering with preset metadata layered over what the caller knows.
#[derive(Clone, Debug, Default)]
pub struct StaticMetadata {
    answer: Option<VideoMetadata>,
}

impl StaticMetadata {
    pub fn new(answer: VideoMetadata) -> Self {
        Self {
            answer: Some(answer),
        }
    }

    /// Resolver that never learns anything new.
    pub fn empty() -> Self {
        Self { answer: None }
    }
}

#[async_trait]
impl MetadataResolver for StaticMetadata {
    async fn resolve(
        &self,
        _file: &InputFile,
        known: &VideoMetadata,
        cancel: &CancellationToken,
    ) -> ConvoyResult<VideoMetadata> {
        if cancel.is_cancelled() {
            return Err(ConvoyError::Cancelled);
        }
        let merged = match &self.answer {
            Some(a) => known.refined_with(a),
            None => known.clone(),
        };
        let codec = merged.codec_or_unknown();
        if is_complex(codec) && !merged.has_duration() {
            return Err(ConvoyError::metadata_missing(
                codec,
                "static resolver has no duration",
            ));
        }
        Ok(merged)
    }
}

/// Probe answering with a preset pipeline description.
#[derive(Clone, Debug, Default)]
pub struct StaticPipeline {
    info: Option<PipelineInfo>,
}

impl StaticPipeline {
    pub fn new(info: PipelineInfo) -> Self {
        Self { info: Some(info) }
    }

    /// Probe that always fails, forcing metadata-only planning.
    pub fn unavailable() -> Self {
        Self { info: None }
    }
}

#[async_trait]
impl PipelineProbe for StaticPipeline {
    async fn probe(&self, query: PipelineQuery<'_>) -> ConvoyResult<PipelineInfo> {
        if query.cancel.is_cancelled() {
            return Err(ConvoyError::Cancelled);
        }
        self.info
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no pipeline information for {}", query.file.name).into())
    }
}

/// Native encoder stand-in that only answers availability.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticNative {
    available: bool,
}

impl StaticNative {
    pub fn new(available: bool) -> Self {
        Self { available }
    }
}

#[async_trait]
impl NativeFastBackend for StaticNative {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn convert(
        &self,
        _file: &InputFile,
        _options: &ConversionOptions,
        _progress: ProgressSink<'_>,
    ) -> ConvoyResult<BackendOutput> {
        Err(ConvoyError::backend_unavailable(
            "native-fast",
            "static stand-in does not encode",
        ))
    }

    fn cancel(&self) {}
}

#[cfg(test)]
#[path = "../../tests/unit/backend/fixed.rs"]
mod tests;
