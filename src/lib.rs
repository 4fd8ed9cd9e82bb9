//! convoy picks a conversion path for each video-to-GIF/WebP/MP4 request and drives it to a
//! result.
//!
//! - A [`PathPlanner`] chooses hardware decode, the software transcoder or the native encoder
//!   from codec, capabilities, session history and developer overrides.
//! - The [`Orchestrator`] runs the plan through a fallback cascade with cooperative
//!   cancellation, then records the outcome in [`OutcomeHistory`].
#![forbid(unsafe_code)]

pub mod backend;
pub mod capability;
pub mod codec;
mod config;
pub mod foundation;
pub mod history;
pub mod orchestrator;
pub mod overrides;
pub mod plan;
pub mod progress;
pub mod storage;
pub mod strategy;

pub use crate::backend::{
    BackendOutput, HardwareBackend, HardwareJob, MetadataResolver, NativeFastBackend,
    PipelineInfo, PipelineProbe, PipelineQuery, SoftwareBackend, TrackInfo,
};
pub use crate::capability::probe::{Capabilities, CapabilityProbe, PlatformQuery, StaticPlatform};
pub use crate::codec::classify::{capability, is_complex, normalize};
pub use crate::config::EngineConfig;
pub use crate::foundation::core::{
    CaptureMode, CodecFamily, ContainerKind, ConversionPath, DecodeCapability, EncoderBackend,
    GifEncoder, OperationId, OutputFormat, QualityTier, VideoMetadata,
};
pub use crate::foundation::error::{ConvoyError, ConvoyResult};
pub use crate::history::stats::{EncoderRecommendation, SummaryEntry};
pub use crate::history::store::{HistoryConfig, Outcome, OutcomeHistory, OutcomeRecord};
pub use crate::orchestrator::engine::{Collaborators, Orchestrator};
pub use crate::orchestrator::request::{
    ConversionMetadata, ConversionOptions, ConversionRequest, ConversionResult, InputFile,
};
pub use crate::orchestrator::status::{ConversionPhase, ConversionStatus};
pub use crate::overrides::store::{OverrideSet, OverrideStore};
pub use crate::plan::budget::PlannerBudgets;
pub use crate::plan::planner::{ExecutionPlan, PathPlanner, PlanRequest};
pub use crate::progress::reporter::{PhaseProgress, PhaseWeights, ProgressPhase};
pub use crate::storage::kv::{JsonFileStore, MemoryStore, SessionStore};
pub use crate::strategy::registry::{
    Confidence, Strategy, StrategyQuery, StrategyReasoning, StrategyRegistry,
};
