use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{ConvoyError, ConvoyResult};

/// Output container/format of a conversion.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Animated GIF.
    Gif,
    /// Animated WebP.
    Webp,
    /// MP4 video, produced only by the native-fast encoder.
    Mp4,
}

impl OutputFormat {
    /// Every supported format.
    pub const ALL: [OutputFormat; 3] = [Self::Gif, Self::Webp, Self::Mp4];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Mp4 => "mp4",
        }
    }

    /// Parse a user-supplied format name.
    pub fn parse(s: &str) -> ConvoyResult<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == lower)
            .ok_or_else(|| ConvoyError::unsupported_format(format!("'{s}'")))
    }

    /// Animated image formats produced frame-by-frame (GIF and WebP).
    pub fn is_gif_like(self) -> bool {
        matches!(self, Self::Gif | Self::Webp)
    }

    /// Formats that can only be produced by the native-fast encoder.
    pub fn requires_native_fast(self) -> bool {
        matches!(self, Self::Mp4)
    }
}

impl FromStr for OutputFormat {
    type Err = ConvoyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized codec family.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CodecFamily {
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    #[default]
    Unknown,
}

impl CodecFamily {
    pub const ALL: [CodecFamily; 6] = [
        Self::H264,
        Self::Hevc,
        Self::Vp8,
        Self::Vp9,
        Self::Av1,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::Unknown => "unknown",
        }
    }

    /// Exact name lookup; use [`crate::codec::classify::normalize`] for raw codec strings.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which decode paths can handle a codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeCapability {
    HardwareOnly,
    SoftwareOnly,
    Both,
    Unsupported,
}

impl DecodeCapability {
    pub fn allows_hardware(self) -> bool {
        matches!(self, Self::HardwareOnly | Self::Both)
    }

    pub fn allows_software(self) -> bool {
        matches!(self, Self::SoftwareOnly | Self::Both)
    }
}

/// Execution path of a conversion attempt.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionPath {
    /// Accelerated decode with a frame encoder.
    Hardware,
    /// Portable software transcoder.
    Software,
    /// Dedicated high-throughput encoder (MP4 only).
    NativeFast,
    /// No viable path.
    Unsupported,
}

impl ConversionPath {
    pub const ALL: [ConversionPath; 4] = [
        Self::Hardware,
        Self::Software,
        Self::NativeFast,
        Self::Unsupported,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Software => "software",
            Self::NativeFast => "native-fast",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Paths that need width/height/duration before execution.
    pub fn requires_full_metadata(self) -> bool {
        matches!(self, Self::Hardware)
    }
}

impl fmt::Display for ConversionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ancillary GIF encoder used on the hardware path.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GifEncoder {
    /// Single-threaded palette quantizer. Safe default.
    Palette,
    /// Multi-threaded worker encoder. Faster, memory hungry.
    Worker,
}

impl GifEncoder {
    pub const ALL: [GifEncoder; 2] = [Self::Palette, Self::Worker];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Palette => "palette",
            Self::Worker => "worker",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == s)
    }
}

impl fmt::Display for GifEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete encoder backend that produced an output.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    Palette,
    Worker,
    /// Software transcoder (decode and encode in one pass).
    Transcoder,
    /// Native-fast encoder.
    Native,
}

impl EncoderBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Palette => "palette",
            Self::Worker => "worker",
            Self::Transcoder => "transcoder",
            Self::Native => "native",
        }
    }

    pub fn gif_encoder(self) -> Option<GifEncoder> {
        match self {
            Self::Palette => Some(GifEncoder::Palette),
            Self::Worker => Some(GifEncoder::Worker),
            Self::Transcoder | Self::Native => None,
        }
    }
}

impl From<GifEncoder> for EncoderBackend {
    fn from(e: GifEncoder) -> Self {
        match e {
            GifEncoder::Palette => Self::Palette,
            GifEncoder::Worker => Self::Worker,
        }
    }
}

impl fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the hardware path pulls frames out of the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// Encoded samples extracted by a container demuxer.
    Demuxer,
    /// Media track processor.
    Track,
    /// Per-frame callbacks from a playing media element.
    FrameCallback,
    /// Seek-and-grab on a paused media element.
    Seek,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 4] = [Self::Demuxer, Self::Track, Self::FrameCallback, Self::Seek];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Demuxer => "demuxer",
            Self::Track => "track",
            Self::FrameCallback => "frame-callback",
            Self::Seek => "seek",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output quality tier.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Source container as reported by the pipeline probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Mp4,
    Mov,
    Webm,
    Mkv,
    Unknown,
}

impl ContainerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Webm => "webm",
            Self::Mkv => "mkv",
            Self::Unknown => "unknown",
        }
    }

    /// Containers a sample demuxer can parse.
    pub fn is_demuxable(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Source video properties, partially known at request time.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: Option<u32>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// Duration in seconds.
    pub duration_secs: Option<f64>,
    /// Normalized codec family.
    pub codec: Option<CodecFamily>,
    /// Frames per second.
    pub framerate: Option<f64>,
    /// Bits per second.
    pub bitrate: Option<u64>,
}

impl VideoMetadata {
    /// Duration when it is known, finite and non-zero.
    pub fn duration(&self) -> Option<f64> {
        self.duration_secs.filter(|d| d.is_finite() && *d > 0.0)
    }

    pub fn has_duration(&self) -> bool {
        self.duration().is_some()
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Everything the hardware path needs to schedule frames.
    pub fn is_complete(&self) -> bool {
        self.resolution().is_some() && self.has_duration()
    }

    pub fn codec_or_unknown(&self) -> CodecFamily {
        self.codec.unwrap_or_default()
    }

    /// Overlay `newer` onto `self`; fields known in `newer` win.
    pub fn refined_with(&self, newer: &VideoMetadata) -> VideoMetadata {
        VideoMetadata {
            width: newer.width.or(self.width),
            height: newer.height.or(self.height),
            duration_secs: newer.duration().or(self.duration_secs),
            codec: match newer.codec {
                Some(CodecFamily::Unknown) | None => self.codec.or(newer.codec),
                known => known,
            },
            framerate: newer.framerate.or(self.framerate),
            bitrate: newer.bitrate.or(self.bitrate),
        }
    }
}

/// Identity of one conversion attempt.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Milliseconds since the unix epoch.
pub(crate) fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
