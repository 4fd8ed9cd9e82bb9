//! Collaborator seams: metadata resolution, pipeline probing and the three conversion backends.
//!
//! Every backend answers with the same [`BackendOutput`] envelope so the orchestrator can read
//! what actually ran without knowing which backend produced it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::foundation::core::{
    CaptureMode, ContainerKind, ConversionPath, EncoderBackend, GifEncoder, OutputFormat,
    VideoMetadata,
};
use crate::foundation::error::ConvoyResult;
use crate::orchestrator::request::{ConversionOptions, InputFile};

pub mod fixed;

/// Backend-side progress sink taking a fraction in `[0, 1]`.
pub type ProgressSink<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Uniform result of every backend.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendOutput {
    pub data: Vec<u8>,
    /// Encoder that really produced `data`.
    pub executed_backend: EncoderBackend,
    pub capture_mode: Option<CaptureMode>,
}

impl BackendOutput {
    pub fn new(data: Vec<u8>, executed_backend: EncoderBackend) -> Self {
        Self {
            data,
            executed_backend,
            capture_mode: None,
        }
    }

    pub fn with_capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = Some(mode);
        self
    }
}

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Fill in what `known` is missing. May fail with `MandatoryMetadataMissing`.
    async fn resolve(
        &self,
        file: &InputFile,
        known: &VideoMetadata,
        cancel: &CancellationToken,
    ) -> ConvoyResult<VideoMetadata>;
}

/// Input to a pipeline probe.
#[derive(Clone, Copy, Debug)]
pub struct PipelineQuery<'a> {
    pub file: &'a InputFile,
    pub format: OutputFormat,
    pub metadata: &'a VideoMetadata,
    pub cancel: &'a CancellationToken,
}

/// Primary video track as seen by the container parser.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackInfo {
    /// Raw codec string (fourCC or profile).
    pub codec: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
    pub framerate: Option<f64>,
}

impl TrackInfo {
    pub fn metadata(&self) -> VideoMetadata {
        let codec = crate::codec::classify::normalize(&self.codec);
        VideoMetadata {
            width: self.width,
            height: self.height,
            duration_secs: self.duration_secs,
            codec: Some(codec),
            framerate: self.framerate,
            bitrate: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineInfo {
    /// Decode path the probe would pick on its own.
    pub decode_path: ConversionPath,
    pub container: ContainerKind,
    pub track: Option<TrackInfo>,
    pub demuxer_present: bool,
}

#[async_trait]
pub trait PipelineProbe: Send + Sync {
    async fn probe(&self, query: PipelineQuery<'_>) -> ConvoyResult<PipelineInfo>;
}

/// Platform encoder producing mp4 directly.
#[async_trait]
pub trait NativeFastBackend: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn convert(
        &self,
        file: &InputFile,
        options: &ConversionOptions,
        progress: ProgressSink<'_>,
    ) -> ConvoyResult<BackendOutput>;

    fn cancel(&self);
}

/// Everything the hardware backend needs for one run.
#[derive(Clone, Copy)]
pub struct HardwareJob<'a> {
    pub file: &'a InputFile,
    pub format: OutputFormat,
    pub options: &'a ConversionOptions,
    pub metadata: &'a VideoMetadata,
    /// GIF frame encoder; `None` for WebP.
    pub encoder: Option<GifEncoder>,
    pub capture_mode: Option<CaptureMode>,
    pub use_demuxer: bool,
    pub cancel: &'a CancellationToken,
    pub progress: ProgressSink<'a>,
}

#[async_trait]
pub trait HardwareBackend: Send + Sync {
    /// `Ok(None)` means the backend could not proceed and the caller should fall back.
    async fn convert(&self, job: HardwareJob<'_>) -> ConvoyResult<Option<BackendOutput>>;
}

/// Lazily-loaded software transcoder.
#[async_trait]
pub trait SoftwareBackend: Send + Sync {
    fn is_loaded(&self) -> bool;

    async fn initialize(&self) -> ConvoyResult<()>;

    async fn convert_to_gif(
        &self,
        file: &InputFile,
        options: &ConversionOptions,
        metadata: &VideoMetadata,
        progress: ProgressSink<'_>,
    ) -> ConvoyResult<BackendOutput>;

    async fn convert_to_webp(
        &self,
        file: &InputFile,
        options: &ConversionOptions,
        metadata: &VideoMetadata,
        progress: ProgressSink<'_>,
    ) -> ConvoyResult<BackendOutput>;

    fn cancel_conversion(&self);
}
