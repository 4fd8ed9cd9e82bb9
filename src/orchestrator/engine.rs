//! One conversion's lifecycle: plan, cascade through backends, finalize, record.
//!
//! Only the attempt holding the active slot may touch the status or release the slot. A newer
//! `convert` call takes the slot over; the older attempt notices at its next checkpoint and
//! ends as `Cancelled` without recording telemetry.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::{
    BackendOutput, HardwareBackend, HardwareJob, MetadataResolver, NativeFastBackend,
    PipelineProbe, SoftwareBackend,
};
use crate::capability::probe::CapabilityProbe;
use crate::codec::classify::{capability, is_complex};
use crate::config::EngineConfig;
use crate::foundation::core::{
    CaptureMode, CodecFamily, ConversionPath, DecodeCapability, EncoderBackend, GifEncoder,
    OperationId, OutputFormat, VideoMetadata, unix_millis,
};
use crate::foundation::error::{ConvoyError, ConvoyResult};
use crate::history::store::{Outcome, OutcomeHistory, OutcomeRecord, PhaseTimings};
use crate::orchestrator::request::{ConversionMetadata, ConversionRequest, ConversionResult};
use crate::orchestrator::status::{ConversionPhase, ConversionStatus};
use crate::overrides::store::OverrideStore;
use crate::plan::planner::{ExecutionPlan, PathPlanner, PlanRequest};
use crate::progress::reporter::{PhaseProgress, PhaseWeights, ProgressPhase};

/// How often a running backend re-checks the caller's cancel predicate.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub metadata: Arc<dyn MetadataResolver>,
    pub pipeline: Arc<dyn PipelineProbe>,
    pub native: Arc<dyn NativeFastBackend>,
    pub hardware: Arc<dyn HardwareBackend>,
    pub software: Arc<dyn SoftwareBackend>,
}

struct ActiveSlot {
    id: OperationId,
    token: CancellationToken,
    /// Backend currently running, for cancel propagation.
    backend: Option<ConversionPath>,
}

struct Attempt {
    id: OperationId,
    token: CancellationToken,
    started: Instant,
    progress: PhaseProgress,
}

/// What one attempt did so far; feeds the outcome record.
#[derive(Default)]
struct Trace {
    codec: CodecFamily,
    planned_path: Option<ConversionPath>,
    executed_path: Option<ConversionPath>,
    encoder: Option<EncoderBackend>,
    capture_mode: Option<CaptureMode>,
    output_bytes: Option<u64>,
    analysis_started: Option<Instant>,
    conversion_started: Option<Instant>,
    conversion_finished: Option<Instant>,
}

pub struct Orchestrator {
    planner: PathPlanner,
    backends: Collaborators,
    probe: Arc<CapabilityProbe>,
    history: Arc<OutcomeHistory>,
    weights: PhaseWeights,
    next_id: AtomicU64,
    active: Mutex<Option<ActiveSlot>>,
    status: Mutex<ConversionStatus>,
}

impl Orchestrator {
    /// `overrides` is `None` in production builds.
    pub fn new(
        backends: Collaborators,
        probe: Arc<CapabilityProbe>,
        history: Arc<OutcomeHistory>,
        overrides: Option<Arc<OverrideStore>>,
        config: &EngineConfig,
    ) -> Self {
        let planner = PathPlanner::new(
            probe.clone(),
            backends.pipeline.clone(),
            backends.native.clone(),
            history.clone(),
            overrides,
            config.planner.clone(),
        );
        Self {
            planner,
            backends,
            probe,
            history,
            weights: config.progress,
            next_id: AtomicU64::new(0),
            active: Mutex::new(None),
            status: Mutex::new(ConversionStatus::default()),
        }
    }

    /// Snapshot of the active (or last finished) attempt.
    pub fn get_status(&self) -> ConversionStatus {
        self.status.lock().clone()
    }

    /// Cancel the active attempt, if any, and tell the running backend.
    pub fn cancel(&self) {
        let target = self
            .active
            .lock()
            .as_ref()
            .map(|s| (s.id, s.token.clone(), s.backend));
        let Some((id, token, backend)) = target else {
            tracing::debug!("cancel requested with no active attempt");
            return;
        };
        self.propagate_cancel(id, &token, backend);
    }

    fn propagate_cancel(
        &self,
        id: OperationId,
        token: &CancellationToken,
        backend: Option<ConversionPath>,
    ) {
        tracing::info!(attempt = %id, backend = ?backend, "cancelling conversion");
        token.cancel();
        match backend {
            Some(ConversionPath::NativeFast) => self.backends.native.cancel(),
            Some(ConversionPath::Software) => self.backends.software.cancel_conversion(),
            _ => {}
        }
        self.update_status(id, |s| s.status_message = "Cancelling".to_string());
    }

    #[tracing::instrument(skip_all, fields(format = %request.format, file = %request.file.name))]
    pub async fn convert(&self, request: ConversionRequest) -> ConvoyResult<ConversionResult> {
        let attempt = self.begin(&request);
        let mut trace = Trace::default();
        let result = self.run(&attempt, &mut trace, &request).await;
        self.finish(&attempt, &trace, &request, result)
    }

    fn begin(&self, request: &ConversionRequest) -> Attempt {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let token = CancellationToken::new();
        {
            let mut slot = self.active.lock();
            let previous = slot.replace(ActiveSlot {
                id,
                token: token.clone(),
                backend: None,
            });
            if let Some(prev) = previous {
                tracing::info!(attempt = %id, superseded = %prev.id, "superseding in-flight attempt");
            }
            *self.status.lock() = ConversionStatus::started();
        }
        Attempt {
            id,
            token,
            started: Instant::now(),
            progress: PhaseProgress::new(
                self.weights,
                request.on_progress.clone(),
                request.on_status.clone(),
            ),
        }
    }

    async fn run(
        &self,
        attempt: &Attempt,
        trace: &mut Trace,
        request: &ConversionRequest,
    ) -> ConvoyResult<ConversionResult> {
        self.report(attempt, ProgressPhase::Initializing, 0.0);
        request.options.validate()?;
        self.warm_capabilities();
        self.report(attempt, ProgressPhase::Initializing, 1.0);
        self.checkpoint(attempt, request)?;

        trace.analysis_started = Some(Instant::now());
        self.enter(attempt, ConversionPhase::Analyzing, "Analyzing video");
        let mut metadata = request.metadata.clone().unwrap_or_default();
        trace.codec = metadata.codec_or_unknown();
        if is_complex(trace.codec) && !metadata.has_duration() {
            metadata = self.resolve_metadata(attempt, request, &metadata, true).await?;
        }

        let planned = self
            .planner
            .plan(
                &PlanRequest {
                    file: &request.file,
                    format: request.format,
                    options: &request.options,
                    metadata: &metadata,
                },
                &attempt.token,
            )
            .await;
        self.checkpoint(attempt, request)?;
        let plan = planned?;
        trace.planned_path = Some(plan.path);
        trace.codec = plan.codec;
        if metadata.codec_or_unknown() == CodecFamily::Unknown {
            metadata.codec = Some(plan.codec);
        }
        tracing::info!(
            attempt = %attempt.id,
            path = %plan.path,
            encoder = ?plan.encoder,
            forced = plan.forced_by_override,
            reason = %plan.reason,
            "plan selected"
        );
        self.report(attempt, ProgressPhase::Analyzing, 0.5);

        if plan.path.requires_full_metadata() && !metadata.is_complete() {
            let mandatory = is_complex(plan.codec);
            match self
                .resolve_metadata(attempt, request, &metadata, mandatory)
                .await
            {
                Ok(resolved) => metadata = resolved,
                Err(e) if mandatory || e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "metadata resolution failed; continuing with partial metadata");
                }
            }
        }
        let caps = self.probe.detect().await;
        self.checkpoint(attempt, request)?;
        let plan = self
            .planner
            .resolve_encoder(plan, &metadata, &request.options, &caps);
        self.report(attempt, ProgressPhase::Analyzing, 1.0);

        trace.conversion_started = Some(Instant::now());
        self.enter(
            attempt,
            ConversionPhase::Converting,
            &format!("Converting via {} path", plan.path),
        );
        let (output, executed, fallbacks) = self
            .execute(attempt, trace, request, &plan, &metadata)
            .await?;
        trace.conversion_finished = Some(Instant::now());
        self.checkpoint(attempt, request)?;

        self.report(attempt, ProgressPhase::Finalizing, 0.5);
        let capture_mode = output.capture_mode.or(match executed {
            ConversionPath::Hardware => plan.capture_mode,
            _ => None,
        });
        trace.encoder = Some(output.executed_backend);
        trace.capture_mode = capture_mode;
        trace.output_bytes = Some(output.data.len() as u64);
        if executed != plan.path {
            tracing::info!(planned = %plan.path, executed = %executed, fallbacks, "executed path differs from plan");
        }

        Ok(ConversionResult {
            metadata: ConversionMetadata {
                path: executed,
                planned_path: plan.path,
                encoder: output.executed_backend,
                elapsed_ms: attempt.started.elapsed().as_millis() as u64,
                original_codec: plan.codec,
                was_transcoded: executed == ConversionPath::Software,
                capture_mode,
                fallbacks,
                plan_reason: plan.reason,
            },
            output: output.data,
        })
    }

    async fn resolve_metadata(
        &self,
        attempt: &Attempt,
        request: &ConversionRequest,
        known: &VideoMetadata,
        mandatory: bool,
    ) -> ConvoyResult<VideoMetadata> {
        self.say(attempt, "Reading video metadata");
        let resolved = self
            .backends
            .metadata
            .resolve(&request.file, known, &attempt.token)
            .await;
        self.checkpoint(attempt, request)?;
        match resolved {
            Ok(fresh) => {
                let merged = known.refined_with(&fresh);
                let codec = merged.codec_or_unknown();
                if mandatory && is_complex(codec) && !merged.has_duration() {
                    return Err(ConvoyError::metadata_missing(
                        codec,
                        "resolver returned no duration",
                    ));
                }
                Ok(merged)
            }
            Err(e @ (ConvoyError::Cancelled | ConvoyError::MandatoryMetadataMissing { .. })) => {
                Err(e)
            }
            Err(e) if mandatory => Err(ConvoyError::metadata_missing(
                known.codec_or_unknown(),
                e.to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Paths to try in order. mp4 has no fallback; hardware-only codecs never reach software.
    fn fallback_chain(&self, plan: &ExecutionPlan) -> Vec<ConversionPath> {
        if plan.format.requires_native_fast() {
            return vec![ConversionPath::NativeFast];
        }
        const CASCADE: [ConversionPath; 3] = [
            ConversionPath::NativeFast,
            ConversionPath::Hardware,
            ConversionPath::Software,
        ];
        let Some(start) = CASCADE.iter().position(|p| *p == plan.path) else {
            return Vec::new();
        };
        let cap = capability(plan.codec);
        let hardware_decode = self.probe.cached().hardware_decode;
        let mut chain = vec![plan.path];
        chain.extend(CASCADE[start + 1..].iter().copied().filter(|p| match p {
            ConversionPath::Hardware => {
                cap.allows_hardware()
                    && (hardware_decode || cap == DecodeCapability::HardwareOnly)
            }
            ConversionPath::Software => cap.allows_software(),
            _ => false,
        }));
        if plan.disable_fallback {
            chain.truncate(1);
        }
        chain
    }

    async fn execute(
        &self,
        attempt: &Attempt,
        trace: &mut Trace,
        request: &ConversionRequest,
        plan: &ExecutionPlan,
        metadata: &VideoMetadata,
    ) -> ConvoyResult<(BackendOutput, ConversionPath, u32)> {
        let chain = self.fallback_chain(plan);
        if chain.is_empty() {
            return Err(ConvoyError::unsupported_format(format!(
                "no conversion path for {} to {}",
                plan.codec, request.format
            )));
        }

        let mut last: Option<(ConversionPath, String)> = None;
        for (i, path) in chain.iter().copied().enumerate() {
            self.checkpoint(attempt, request)?;
            if let Some((from, trigger)) = &last {
                tracing::warn!(attempt = %attempt.id, %from, to = %path, %trigger, "falling back");
                self.say(attempt, &format!("Retrying with {path} path"));
            }
            trace.executed_path = Some(path);
            trace.encoder = planned_encoder(path, request.format, plan);

            self.set_running_backend(attempt.id, Some(path));
            let outcome = tokio::select! {
                outcome = self.run_backend(path, attempt, request, plan, metadata) => outcome,
                () = cancel_requested(request) => {
                    self.propagate_cancel(attempt.id, &attempt.token, Some(path));
                    Err(ConvoyError::Cancelled)
                }
            };
            self.set_running_backend(attempt.id, None);
            self.checkpoint(attempt, request)?;

            match outcome {
                Ok(Some(output)) => return Ok((output, path, i as u32)),
                Ok(None) => last = Some((path, format!("{path} backend could not proceed"))),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => last = Some((path, e.to_string())),
            }
        }

        let (path, message) = last.unwrap_or((plan.path, "no backend attempted".to_string()));
        let reason = if plan.disable_fallback {
            "fallback disabled by override"
        } else if chain.len() == 1 {
            "no fallback available"
        } else {
            "all fallbacks exhausted"
        };
        tracing::warn!(attempt = %attempt.id, %path, reason, %message, "conversion failed");
        Err(ConvoyError::backend_execution(path, reason, message))
    }

    async fn run_backend(
        &self,
        path: ConversionPath,
        attempt: &Attempt,
        request: &ConversionRequest,
        plan: &ExecutionPlan,
        metadata: &VideoMetadata,
    ) -> ConvoyResult<Option<BackendOutput>> {
        let progress = |fraction: f64| self.report(attempt, ProgressPhase::Converting, fraction);
        match path {
            ConversionPath::NativeFast => {
                let native = &self.backends.native;
                if !native.is_available().await {
                    return Err(ConvoyError::backend_unavailable(
                        "native-fast",
                        "native encoder not available",
                    ));
                }
                self.checkpoint(attempt, request)?;
                native
                    .convert(&request.file, &request.options, &progress)
                    .await
                    .map(Some)
            }
            ConversionPath::Hardware => {
                let encoder = match request.format {
                    OutputFormat::Gif => Some(plan.encoder.unwrap_or(GifEncoder::Palette)),
                    _ => None,
                };
                self.backends
                    .hardware
                    .convert(HardwareJob {
                        file: &request.file,
                        format: request.format,
                        options: &request.options,
                        metadata,
                        encoder,
                        capture_mode: plan.capture_mode,
                        use_demuxer: plan.use_demuxer,
                        cancel: &attempt.token,
                        progress: &progress,
                    })
                    .await
            }
            ConversionPath::Software => {
                let software = &self.backends.software;
                if !software.is_loaded() {
                    self.say(attempt, "Loading transcoder");
                    software.initialize().await?;
                    self.checkpoint(attempt, request)?;
                }
                match request.format {
                    OutputFormat::Gif => software
                        .convert_to_gif(&request.file, &request.options, metadata, &progress)
                        .await
                        .map(Some),
                    OutputFormat::Webp => software
                        .convert_to_webp(&request.file, &request.options, metadata, &progress)
                        .await
                        .map(Some),
                    OutputFormat::Mp4 => Err(ConvoyError::unsupported_format(
                        "software path does not produce mp4",
                    )),
                }
            }
            ConversionPath::Unsupported => Err(ConvoyError::unsupported_format(format!(
                "{} cannot be converted to {}",
                plan.codec, request.format
            ))),
        }
    }

    fn finish(
        &self,
        attempt: &Attempt,
        trace: &Trace,
        request: &ConversionRequest,
        result: ConvoyResult<ConversionResult>,
    ) -> ConvoyResult<ConversionResult> {
        let superseded = !self.is_active(attempt.id);
        let cancelled =
            superseded || attempt.token.is_cancelled() || request.cancel_requested();
        let result = if cancelled {
            Err(ConvoyError::Cancelled)
        } else {
            result
        };

        if superseded {
            tracing::debug!(attempt = %attempt.id, "superseded; telemetry suppressed");
            return result;
        }

        let (outcome, phase, message) = match &result {
            Ok(_) => (
                Outcome::Success,
                ConversionPhase::Complete,
                "Conversion complete".to_string(),
            ),
            Err(ConvoyError::Cancelled) => (
                Outcome::Cancelled,
                ConversionPhase::Cancelled,
                "Conversion cancelled".to_string(),
            ),
            Err(e) => (
                Outcome::Error,
                ConversionPhase::Error,
                format!("Conversion failed: {e}"),
            ),
        };
        if outcome == Outcome::Success {
            self.report(attempt, ProgressPhase::Finalizing, 1.0);
        }
        self.record_outcome(attempt, trace, request, outcome, &result);
        self.release(attempt, phase, &message);
        result
    }

    fn record_outcome(
        &self,
        attempt: &Attempt,
        trace: &Trace,
        request: &ConversionRequest,
        outcome: Outcome,
        result: &ConvoyResult<ConversionResult>,
    ) {
        let now = Instant::now();
        let span = |from: Option<Instant>, to: Option<Instant>| match (from, to) {
            (Some(a), Some(b)) => b.saturating_duration_since(a).as_millis() as u64,
            _ => 0,
        };
        let timings = PhaseTimings {
            init_ms: span(Some(attempt.started), trace.analysis_started.or(Some(now))),
            analysis_ms: span(
                trace.analysis_started,
                trace.conversion_started.or(Some(now)),
            ),
            conversion_ms: span(
                trace.conversion_started,
                trace.conversion_finished.or(Some(now)),
            ),
            total_ms: span(Some(attempt.started), Some(now)),
        };
        let planned_path = trace.planned_path.unwrap_or(ConversionPath::Unsupported);
        let entry = OutcomeRecord {
            timestamp_ms: unix_millis(),
            codec: trace.codec,
            format: request.format,
            planned_path,
            executed_path: trace.executed_path.unwrap_or(planned_path),
            encoder: trace.encoder,
            capture_mode: trace.capture_mode,
            timings,
            output_bytes: trace.output_bytes,
            outcome,
            error: result.as_ref().err().map(|e| e.to_string()),
        };

        let history = &self.history;
        if std::panic::catch_unwind(AssertUnwindSafe(|| history.record(entry))).is_err() {
            tracing::warn!(attempt = %attempt.id, "outcome recording panicked; result unaffected");
        }
    }

    fn release(&self, attempt: &Attempt, phase: ConversionPhase, message: &str) {
        let released = {
            let mut slot = self.active.lock();
            if slot.as_ref().is_some_and(|s| s.id == attempt.id) {
                *slot = None;
                self.status.lock().enter(phase, message);
                true
            } else {
                false
            }
        };
        if released {
            attempt.progress.status(message);
        }
    }

    fn warm_capabilities(&self) {
        if self.probe.is_detected() {
            return;
        }
        let probe = self.probe.clone();
        // Detached; planning awaits the same memoized detection.
        drop(tokio::spawn(async move {
            probe.detect().await;
        }));
    }

    fn is_active(&self, id: OperationId) -> bool {
        self.active.lock().as_ref().is_some_and(|s| s.id == id)
    }

    fn is_cancelled(&self, attempt: &Attempt, request: &ConversionRequest) -> bool {
        if attempt.token.is_cancelled() || !self.is_active(attempt.id) {
            return true;
        }
        if request.cancel_requested() {
            attempt.token.cancel();
            return true;
        }
        false
    }

    fn checkpoint(&self, attempt: &Attempt, request: &ConversionRequest) -> ConvoyResult<()> {
        if self.is_cancelled(attempt, request) {
            Err(ConvoyError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Apply `f` to the status if `id` still owns the slot.
    fn update_status(&self, id: OperationId, f: impl FnOnce(&mut ConversionStatus)) -> bool {
        let slot = self.active.lock();
        if slot.as_ref().is_some_and(|s| s.id == id) {
            f(&mut self.status.lock());
            true
        } else {
            false
        }
    }

    fn enter(&self, attempt: &Attempt, phase: ConversionPhase, message: &str) {
        if self.update_status(attempt.id, |s| s.enter(phase, message)) {
            attempt.progress.status(message);
        }
    }

    fn say(&self, attempt: &Attempt, message: &str) {
        if self.update_status(attempt.id, |s| s.status_message = message.to_string()) {
            attempt.progress.status(message);
        }
    }

    fn report(&self, attempt: &Attempt, phase: ProgressPhase, fraction: f64) {
        if !self.is_active(attempt.id) {
            return;
        }
        let value = attempt.progress.advance(phase, fraction);
        self.update_status(attempt.id, |s| s.progress = value);
    }

    fn set_running_backend(&self, id: OperationId, backend: Option<ConversionPath>) {
        if let Some(slot) = self.active.lock().as_mut().filter(|s| s.id == id) {
            slot.backend = backend;
        }
    }
}

/// Resolves once the caller's cancel predicate turns true; never without one.
async fn cancel_requested(request: &ConversionRequest) {
    if request.should_cancel.is_none() {
        return std::future::pending().await;
    }
    let mut tick = tokio::time::interval(CANCEL_POLL);
    loop {
        tick.tick().await;
        if request.cancel_requested() {
            return;
        }
    }
}

/// Encoder the path would use, recorded when the backend fails before reporting its own.
fn planned_encoder(
    path: ConversionPath,
    format: OutputFormat,
    plan: &ExecutionPlan,
) -> Option<EncoderBackend> {
    match path {
        ConversionPath::NativeFast => Some(EncoderBackend::Native),
        ConversionPath::Software => Some(EncoderBackend::Transcoder),
        ConversionPath::Hardware if format == OutputFormat::Gif => {
            Some(plan.encoder.unwrap_or(GifEncoder::Palette).into())
        }
        _ => None,
    }
}
