use std::fmt;
use std::sync::Arc;

use crate::foundation::core::{
    CaptureMode, CodecFamily, ConversionPath, EncoderBackend, GifEncoder, OutputFormat,
    QualityTier, VideoMetadata,
};
use crate::foundation::error::{ConvoyError, ConvoyResult};

/// Normalized 0–100 progress callback.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;
/// Human-readable status callback.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Polled at every checkpoint; `true` cancels the attempt.
pub type CancelPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Opaque handle to the user's input file.
#[derive(Clone)]
pub struct InputFile {
    pub name: String,
    pub size_bytes: u64,
    pub data: Arc<[u8]>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size_bytes: data.len() as u64,
            data,
        }
    }

    /// Handle without a payload; backends that only inspect the name/size can use this.
    pub fn named(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            data: Arc::from(Vec::new()),
        }
    }
}

impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// User-facing conversion options.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    pub quality: QualityTier,
    /// Output scale in `(0, 1]`.
    pub scale: f64,
    /// Convert at most this many seconds of the source.
    pub max_duration_secs: Option<f64>,
    /// Output frame rate; the planner picks one per quality tier when unset.
    pub fps: Option<f64>,
    /// GIF encoder requested by the user.
    pub gif_encoder: Option<GifEncoder>,
    /// Frame capture mode requested by the user.
    pub capture_mode: Option<CaptureMode>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            quality: QualityTier::Medium,
            scale: 1.0,
            max_duration_secs: None,
            fps: None,
            gif_encoder: None,
            capture_mode: None,
        }
    }
}

impl ConversionOptions {
    pub fn validate(&self) -> ConvoyResult<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > 1.0 {
            return Err(ConvoyError::validation("scale must be in (0, 1]"));
        }
        if let Some(fps) = self.fps
            && (!fps.is_finite() || fps <= 0.0)
        {
            return Err(ConvoyError::validation("fps must be finite and > 0"));
        }
        if let Some(d) = self.max_duration_secs
            && (!d.is_finite() || d <= 0.0)
        {
            return Err(ConvoyError::validation(
                "max_duration_secs must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// One conversion request. Immutable for the lifetime of an attempt.
#[derive(Clone)]
pub struct ConversionRequest {
    pub file: InputFile,
    pub format: OutputFormat,
    pub options: ConversionOptions,
    pub metadata: Option<VideoMetadata>,
    pub on_progress: Option<ProgressCallback>,
    pub on_status: Option<StatusCallback>,
    pub should_cancel: Option<CancelPredicate>,
}

impl ConversionRequest {
    pub fn new(file: InputFile, format: OutputFormat) -> Self {
        Self {
            file,
            format,
            options: ConversionOptions::default(),
            metadata: None,
            on_progress: None,
            on_status: None,
            should_cancel: None,
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metadata(mut self, metadata: VideoMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn on_progress(mut self, f: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_status(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }

    pub fn cancel_when(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.should_cancel = Some(Arc::new(f));
        self
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.should_cancel.as_ref().is_some_and(|f| f())
    }
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("file", &self.file)
            .field("format", &self.format)
            .field("options", &self.options)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// What actually ran, finalized on success.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversionMetadata {
    /// Executed path; differs from `planned_path` after a fallback.
    pub path: ConversionPath,
    pub planned_path: ConversionPath,
    /// Runtime-reported encoder.
    pub encoder: EncoderBackend,
    pub elapsed_ms: u64,
    pub original_codec: CodecFamily,
    /// The software transcoder decoded and re-encoded the source in one pass.
    pub was_transcoded: bool,
    pub capture_mode: Option<CaptureMode>,
    pub fallbacks: u32,
    pub plan_reason: String,
}

/// Successful conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionResult {
    pub output: Vec<u8>,
    pub metadata: ConversionMetadata,
}
