//! Per-attempt path selection.
//!
//! Precedence: mp4 short-circuit, developer override, user hint, auto planning. The planner
//! never runs a backend; it only reads capabilities, the pipeline probe, the strategy table,
//! session history and the override store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::{NativeFastBackend, PipelineInfo, PipelineProbe, PipelineQuery};
use crate::capability::probe::{Capabilities, CapabilityProbe};
use crate::codec::classify::{capability, is_complex};
use crate::foundation::core::{
    CaptureMode, CodecFamily, ContainerKind, ConversionPath, DecodeCapability, GifEncoder,
    OutputFormat, VideoMetadata,
};
use crate::foundation::error::{ConvoyError, ConvoyResult};
use crate::history::store::OutcomeHistory;
use crate::orchestrator::request::{ConversionOptions, InputFile};
use crate::overrides::store::{OverrideSet, OverrideStore};
use crate::plan::budget::{FrameBufferEstimate, PlannerBudgets};
use crate::strategy::registry::{Confidence, StrategyQuery, StrategyRegistry};

/// What the planner needs from one request.
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest<'a> {
    pub file: &'a InputFile,
    pub format: OutputFormat,
    pub options: &'a ConversionOptions,
    /// Best-known metadata at planning time.
    pub metadata: &'a VideoMetadata,
}

/// The single decision driving one attempt.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ExecutionPlan {
    pub path: ConversionPath,
    pub format: OutputFormat,
    /// Never empty.
    pub reason: String,
    /// Codec of the input (not the forced strategy codec).
    pub codec: CodecFamily,
    pub container: Option<ContainerKind>,
    pub use_demuxer: bool,
    /// Frame encoder on the hardware GIF path.
    pub encoder: Option<GifEncoder>,
    pub capture_mode: Option<CaptureMode>,
    pub forced_by_override: bool,
    pub disable_fallback: bool,
    pub confidence: Option<Confidence>,
    /// The encoder came from an override or the user and survives re-resolution.
    pub encoder_pinned: bool,
}

impl ExecutionPlan {
    fn new(
        path: ConversionPath,
        format: OutputFormat,
        codec: CodecFamily,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path,
            format,
            reason: reason.into(),
            codec,
            container: None,
            use_demuxer: false,
            encoder: None,
            capture_mode: None,
            forced_by_override: false,
            disable_fallback: false,
            confidence: None,
            encoder_pinned: false,
        }
    }

    fn uses_gif_encoder(&self) -> bool {
        self.path == ConversionPath::Hardware && self.format == OutputFormat::Gif
    }
}

pub struct PathPlanner {
    probe: Arc<CapabilityProbe>,
    pipeline: Arc<dyn PipelineProbe>,
    native: Arc<dyn NativeFastBackend>,
    history: Arc<OutcomeHistory>,
    overrides: Option<Arc<OverrideStore>>,
    registry: StrategyRegistry,
    budgets: PlannerBudgets,
}

impl PathPlanner {
    pub fn new(
        probe: Arc<CapabilityProbe>,
        pipeline: Arc<dyn PipelineProbe>,
        native: Arc<dyn NativeFastBackend>,
        history: Arc<OutcomeHistory>,
        overrides: Option<Arc<OverrideStore>>,
        budgets: PlannerBudgets,
    ) -> Self {
        Self {
            probe,
            pipeline,
            native,
            history,
            overrides,
            registry: StrategyRegistry::new(),
            budgets,
        }
    }

    fn current_overrides(&self) -> OverrideSet {
        self.overrides
            .as_ref()
            .map(|o| o.get())
            .unwrap_or_default()
    }

    #[tracing::instrument(skip_all, fields(format = %req.format, file = %req.file.name))]
    pub async fn plan(
        &self,
        req: &PlanRequest<'_>,
        cancel: &CancellationToken,
    ) -> ConvoyResult<ExecutionPlan> {
        checkpoint(cancel)?;
        let codec = req.metadata.codec_or_unknown();

        if req.format.requires_native_fast() {
            let available = self.native.is_available().await;
            checkpoint(cancel)?;
            if !available {
                return Err(ConvoyError::backend_unavailable(
                    "native-fast",
                    format!("{} output requires the native encoder", req.format),
                ));
            }
            let mut plan = ExecutionPlan::new(
                ConversionPath::NativeFast,
                req.format,
                codec,
                format!("{} output uses the native encoder; no fallback exists", req.format),
            );
            plan.confidence = Some(Confidence::High);
            return Ok(plan);
        }

        let overrides = self.current_overrides();
        if overrides.forces_execution() {
            ensure_duration(codec, req.metadata)?;
            let plan = self.override_plan(req, codec, &overrides);
            tracing::info!(path = %plan.path, reason = %plan.reason, "developer override in effect");
            return Ok(plan);
        }

        let caps = self.probe.detect().await;
        checkpoint(cancel)?;

        if let Some(plan) = self.user_hint_plan(req, codec, &caps, &overrides) {
            ensure_duration(codec, req.metadata)?;
            return Ok(plan);
        }

        self.auto_plan(req, &caps, &overrides, cancel).await
    }

    fn override_plan(
        &self,
        req: &PlanRequest<'_>,
        codec: CodecFamily,
        overrides: &OverrideSet,
    ) -> ExecutionPlan {
        let path = overrides.forced_path.unwrap_or(ConversionPath::Hardware);
        let mut plan = ExecutionPlan::new(path, req.format, codec, String::new());
        plan.forced_by_override = true;
        plan.disable_fallback = overrides.disable_fallback;
        if plan.uses_gif_encoder() {
            plan.encoder = overrides.forced_encoder;
            plan.encoder_pinned = overrides.forced_encoder.is_some();
        }
        if path == ConversionPath::Hardware {
            plan.capture_mode = overrides.forced_capture_mode;
        }

        let mut reason = format!("developer override forced {path} path");
        if let Some(e) = plan.encoder {
            reason.push_str(&format!(" with {e} encoder"));
        }
        if plan.disable_fallback {
            reason.push_str("; fallback disabled");
        }
        plan.reason = reason;
        plan
    }

    fn user_hint_plan(
        &self,
        req: &PlanRequest<'_>,
        codec: CodecFamily,
        caps: &Capabilities,
        overrides: &OverrideSet,
    ) -> Option<ExecutionPlan> {
        if !req.format.is_gif_like() {
            return None;
        }
        let hinted_encoder = match req.format {
            OutputFormat::Gif => req.options.gif_encoder,
            _ => None,
        };
        if hinted_encoder.is_none() && req.options.capture_mode.is_none() {
            return None;
        }

        let cap = capability(codec);
        if !cap.allows_hardware()
            || (!caps.hardware_decode && cap != DecodeCapability::HardwareOnly)
        {
            tracing::info!(%codec, "user encoder/capture hint dropped; codec cannot use hardware path");
            return None;
        }

        let mut plan = ExecutionPlan::new(ConversionPath::Hardware, req.format, codec, String::new());
        plan.disable_fallback = overrides.disable_fallback;
        plan.capture_mode = req.options.capture_mode.or(overrides.forced_capture_mode);

        let mut reason = String::from("user requested");
        if let Some(e) = hinted_encoder {
            match self.budgets.substitute_for(codec, e) {
                Some(sub) => {
                    tracing::warn!(%codec, requested = %e, substitute = %sub, "substituting unreliable encoder");
                    plan.encoder = Some(sub);
                    reason.push_str(&format!(
                        " {e} encoder (substituted by {sub}: {e} is unreliable for {codec})"
                    ));
                }
                None => {
                    plan.encoder = Some(e);
                    reason.push_str(&format!(" {e} encoder"));
                }
            }
            plan.encoder_pinned = true;
        }
        if let Some(m) = req.options.capture_mode {
            reason.push_str(&format!(" {m} capture"));
        }
        reason.push_str(" on the hardware path");
        plan.reason = reason;
        Some(plan)
    }

    async fn auto_plan(
        &self,
        req: &PlanRequest<'_>,
        caps: &Capabilities,
        overrides: &OverrideSet,
        cancel: &CancellationToken,
    ) -> ConvoyResult<ExecutionPlan> {
        let probed = self
            .pipeline
            .probe(PipelineQuery {
                file: req.file,
                format: req.format,
                metadata: req.metadata,
                cancel,
            })
            .await;
        checkpoint(cancel)?;
        let info: Option<PipelineInfo> = match probed {
            Ok(info) => Some(info),
            Err(ConvoyError::Cancelled) => return Err(ConvoyError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "pipeline probe failed; planning from metadata only");
                None
            }
        };

        let metadata = match info.as_ref().and_then(|i| i.track.as_ref()) {
            Some(track) => track.metadata().refined_with(req.metadata),
            None => req.metadata.clone(),
        };
        let codec = metadata.codec_or_unknown();
        ensure_duration(codec, &metadata)?;

        let strategy_codec = overrides.forced_strategy_codec.unwrap_or(codec);
        if strategy_codec != codec {
            tracing::info!(%codec, %strategy_codec, "developer override: planning as a different codec");
        }
        let container = info.as_ref().map(|i| i.container);
        let strategy = self.registry.get_strategy(&StrategyQuery {
            codec: strategy_codec,
            format: req.format,
            container,
            capabilities: caps,
            duration_secs: metadata.duration(),
        });

        let mut plan = ExecutionPlan::new(strategy.preferred_path, req.format, codec, strategy.reason);
        plan.container = container;
        plan.confidence = Some(strategy.confidence);
        if plan.path == ConversionPath::Hardware
            && capability(strategy_codec) != DecodeCapability::HardwareOnly
            && info
                .as_ref()
                .is_some_and(|i| i.decode_path == ConversionPath::Software)
        {
            tracing::info!(%codec, "pipeline probe has no hardware decoder for this track");
            plan.path = ConversionPath::Software;
            plan.confidence = Some(Confidence::Low);
            plan.reason = format!(
                "{}; overridden: pipeline probe reports no hardware decoder for this track",
                plan.reason
            );
        }
        plan.disable_fallback = overrides.disable_fallback;
        plan.use_demuxer = info
            .as_ref()
            .is_some_and(|i| i.demuxer_present && i.container.is_demuxable());
        if plan.path == ConversionPath::Hardware {
            plan.capture_mode = overrides
                .forced_capture_mode
                .or(plan.use_demuxer.then_some(CaptureMode::Demuxer));
        }
        if plan.uses_gif_encoder() {
            let (encoder, why) = self.auto_encoder(strategy_codec, &metadata, req.options, caps);
            plan.encoder = Some(encoder);
            plan.reason = format!("{}; {why}", plan.reason);
        }

        tracing::debug!(path = %plan.path, encoder = ?plan.encoder, reason = %plan.reason, "auto plan");
        Ok(plan)
    }

    /// Worker when every eligibility condition holds, palette otherwise.
    fn auto_encoder(
        &self,
        codec: CodecFamily,
        metadata: &VideoMetadata,
        options: &ConversionOptions,
        caps: &Capabilities,
    ) -> (GifEncoder, String) {
        let mut blockers = Vec::new();
        if !is_complex(codec) {
            blockers.push(format!("{codec} decodes cheaply"));
        }
        if !caps.threading_available() {
            blockers.push("multi-threading unavailable".to_string());
        } else if caps.logical_cores < self.budgets.min_worker_cores {
            blockers.push(format!("only {} logical core(s)", caps.logical_cores));
        }
        match (metadata.resolution(), metadata.duration()) {
            (Some((w, h)), Some(d)) => {
                let duration = options.max_duration_secs.map_or(d, |cap| d.min(cap));
                let fps = options
                    .fps
                    .unwrap_or_else(|| self.budgets.target_fps.get(options.quality));
                let est = FrameBufferEstimate::new(w, h, duration, fps, options.scale);
                blockers.extend(
                    self.budgets
                        .violations(&est, options.quality, options.scale, caps),
                );
            }
            _ => blockers.push("resolution or duration unknown".to_string()),
        }
        if caps.is_mobile {
            blockers.push("mobile device".to_string());
        }
        if caps.is_low_memory(self.budgets.low_memory_gb) {
            blockers.push("low-memory device".to_string());
        }
        if self.budgets.history_gated_codec == Some(codec) {
            match self.history.encoder_recommendation(codec) {
                Some(r) if r.encoder == GifEncoder::Worker => {}
                Some(r) => blockers.push(format!("session history favors {}", r.encoder)),
                None => blockers.push(format!("no session history backing worker for {codec}")),
            }
        }

        if blockers.is_empty() {
            (GifEncoder::Worker, "worker encoder eligible".to_string())
        } else {
            (
                GifEncoder::Palette,
                format!("palette encoder ({})", blockers.join(", ")),
            )
        }
    }

    /// Re-derive the GIF encoder against final metadata. Pinned encoders and overrides win.
    pub fn resolve_encoder(
        &self,
        mut plan: ExecutionPlan,
        metadata: &VideoMetadata,
        options: &ConversionOptions,
        caps: &Capabilities,
    ) -> ExecutionPlan {
        if !plan.uses_gif_encoder() {
            return plan;
        }
        let overrides = self.current_overrides();
        if let Some(forced) = overrides.forced_encoder {
            plan.encoder = Some(forced);
            plan.encoder_pinned = true;
            return plan;
        }
        if plan.encoder_pinned {
            return plan;
        }
        let codec = overrides
            .forced_strategy_codec
            .unwrap_or_else(|| metadata.codec.unwrap_or(plan.codec));
        let (encoder, why) = self.auto_encoder(codec, metadata, options, caps);
        if plan.encoder != Some(encoder) {
            tracing::info!(
                from = ?plan.encoder,
                to = %encoder,
                %why,
                "encoder re-resolved against final metadata"
            );
            plan.reason = format!("{}; re-resolved: {why}", plan.reason);
        }
        plan.encoder = Some(encoder);
        plan
    }
}

fn checkpoint(cancel: &CancellationToken) -> ConvoyResult<()> {
    if cancel.is_cancelled() {
        Err(ConvoyError::Cancelled)
    } else {
        Ok(())
    }
}

fn ensure_duration(codec: CodecFamily, metadata: &VideoMetadata) -> ConvoyResult<()> {
    if is_complex(codec) && !metadata.has_duration() {
        return Err(ConvoyError::metadata_missing(
            codec,
            "duration is required before planning",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/plan/planner.rs"]
mod tests;
