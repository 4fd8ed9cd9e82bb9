use super::*;
use crate::backend::TrackInfo;
use crate::backend::fixed::{StaticNative, StaticPipeline};
use crate::foundation::core::EncoderBackend;
use crate::history::store::{HistoryConfig, Outcome, OutcomeRecord, PhaseTimings};
use crate::storage::kv::MemoryStore;

fn full_caps() -> Capabilities {
    Capabilities {
        hardware_decode: true,
        shared_memory: true,
        workers: true,
        cross_origin_isolated: true,
        device_memory_gb: Some(8.0),
        heap_limit_bytes: Some(4 << 30),
        is_mobile: false,
        logical_cores: 8,
    }
}

struct Fixture {
    caps: Capabilities,
    native: bool,
    pipeline: StaticPipeline,
    overrides: Option<Arc<OverrideStore>>,
    history: Arc<OutcomeHistory>,
}

impl Fixture {
    fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            native: true,
            pipeline: StaticPipeline::unavailable(),
            overrides: None,
            history: Arc::new(OutcomeHistory::in_memory(HistoryConfig::default())),
        }
    }

    fn with_overrides(mut self, set: OverrideSet) -> Self {
        let store = OverrideStore::new(Arc::new(MemoryStore::new()));
        store.set(&set);
        self.overrides = Some(Arc::new(store));
        self
    }

    fn planner(&self) -> PathPlanner {
        PathPlanner::new(
            Arc::new(CapabilityProbe::fixed(self.caps.clone())),
            Arc::new(self.pipeline.clone()),
            Arc::new(StaticNative::new(self.native)),
            self.history.clone(),
            self.overrides.clone(),
            PlannerBudgets::default(),
        )
    }
}

fn meta(codec: CodecFamily, duration: Option<f64>) -> VideoMetadata {
    VideoMetadata {
        width: Some(320),
        height: Some(240),
        duration_secs: duration,
        codec: Some(codec),
        framerate: Some(30.0),
        bitrate: None,
    }
}

async fn plan_with(
    fx: &Fixture,
    format: OutputFormat,
    options: &ConversionOptions,
    metadata: &VideoMetadata,
) -> ConvoyResult<ExecutionPlan> {
    let file = InputFile::named("clip.mp4", 4096);
    fx.planner()
        .plan(
            &PlanRequest {
                file: &file,
                format,
                options,
                metadata,
            },
            &CancellationToken::new(),
        )
        .await
}

#[tokio::test]
async fn mp4_without_native_backend_is_unavailable() {
    let mut fx = Fixture::new(full_caps());
    fx.native = false;
    let err = plan_with(
        &fx,
        OutputFormat::Mp4,
        &ConversionOptions::default(),
        &meta(CodecFamily::H264, Some(10.0)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ConvoyError::BackendUnavailable { .. }));
}

#[tokio::test]
async fn mp4_with_native_backend_plans_native_fast() {
    let fx = Fixture::new(Capabilities::conservative());
    let plan = plan_with(
        &fx,
        OutputFormat::Mp4,
        &ConversionOptions::default(),
        &meta(CodecFamily::Av1, None),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::NativeFast);
    assert!(!plan.reason.is_empty());
}

#[tokio::test]
async fn h264_gif_short_clip_plans_software_with_reason() {
    let fx = Fixture::new(full_caps());
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::H264, Some(10.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Software);
    assert!(!plan.reason.is_empty());
    assert_eq!(plan.encoder, None);
    assert!(!plan.forced_by_override);
}

#[tokio::test]
async fn av1_gif_plans_hardware_regardless_of_capabilities() {
    for caps in [Capabilities::conservative(), full_caps()] {
        let fx = Fixture::new(caps);
        let plan = plan_with(
            &fx,
            OutputFormat::Gif,
            &ConversionOptions::default(),
            &meta(CodecFamily::Av1, Some(6.0)),
        )
        .await
        .unwrap();
        assert_eq!(plan.path, ConversionPath::Hardware);
        assert!(plan.encoder.is_some());
    }
}

#[tokio::test]
async fn complex_codec_without_duration_fails_fast() {
    let fx = Fixture::new(full_caps());
    let err = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Vp9, None),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ConvoyError::MandatoryMetadataMissing {
            codec: CodecFamily::Vp9,
            ..
        }
    ));
}

#[tokio::test]
async fn pipeline_track_can_supply_the_missing_duration() {
    let mut fx = Fixture::new(full_caps());
    fx.pipeline = StaticPipeline::new(PipelineInfo {
        decode_path: ConversionPath::Hardware,
        container: ContainerKind::Mp4,
        track: Some(TrackInfo {
            codec: "av01.0.05M.08".to_string(),
            width: Some(1280),
            height: Some(720),
            duration_secs: Some(4.0),
            framerate: Some(24.0),
        }),
        demuxer_present: true,
    });
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &VideoMetadata::default(),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Hardware);
    assert_eq!(plan.codec, CodecFamily::Av1);
    assert_eq!(plan.container, Some(ContainerKind::Mp4));
    assert!(plan.use_demuxer);
    assert_eq!(plan.capture_mode, Some(CaptureMode::Demuxer));
}

#[tokio::test]
async fn override_is_honored_unconditionally() {
    let fx = Fixture::new(full_caps()).with_overrides(OverrideSet {
        forced_path: Some(ConversionPath::Software),
        disable_fallback: true,
        ..Default::default()
    });
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Hevc, Some(3.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Software);
    assert!(plan.forced_by_override);
    assert!(plan.disable_fallback);
    assert!(plan.reason.contains("override"));
}

#[tokio::test]
async fn forced_encoder_alone_pins_hardware_path() {
    let fx = Fixture::new(Capabilities::conservative()).with_overrides(OverrideSet {
        forced_encoder: Some(GifEncoder::Worker),
        ..Default::default()
    });
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::H264, Some(3.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Hardware);
    assert_eq!(plan.encoder, Some(GifEncoder::Worker));
    assert!(plan.encoder_pinned);
    assert!(!plan.disable_fallback);
}

#[tokio::test]
async fn user_hint_substitutes_unreliable_combination() {
    let fx = Fixture::new(full_caps());
    let options = ConversionOptions {
        gif_encoder: Some(GifEncoder::Worker),
        ..Default::default()
    };
    let plan = plan_with(&fx, OutputFormat::Gif, &options, &meta(CodecFamily::Av1, Some(5.0)))
        .await
        .unwrap();
    assert_eq!(plan.path, ConversionPath::Hardware);
    assert_eq!(plan.encoder, Some(GifEncoder::Palette));
    assert!(plan.encoder_pinned);
    assert!(plan.reason.contains("substituted"));
}

#[tokio::test]
async fn user_hint_is_dropped_without_hardware_decode() {
    let fx = Fixture::new(Capabilities::conservative());
    let options = ConversionOptions {
        gif_encoder: Some(GifEncoder::Worker),
        ..Default::default()
    };
    let plan = plan_with(&fx, OutputFormat::Gif, &options, &meta(CodecFamily::H264, Some(5.0)))
        .await
        .unwrap();
    assert_eq!(plan.path, ConversionPath::Software);
    assert_eq!(plan.encoder, None);
}

#[tokio::test]
async fn user_capture_hint_on_webp_uses_hardware() {
    let fx = Fixture::new(full_caps());
    let options = ConversionOptions {
        capture_mode: Some(CaptureMode::Seek),
        gif_encoder: Some(GifEncoder::Worker),
        ..Default::default()
    };
    let plan = plan_with(&fx, OutputFormat::Webp, &options, &meta(CodecFamily::Vp8, Some(5.0)))
        .await
        .unwrap();
    assert_eq!(plan.path, ConversionPath::Hardware);
    assert_eq!(plan.capture_mode, Some(CaptureMode::Seek));
    assert_eq!(plan.encoder, None);
}

#[tokio::test]
async fn worker_encoder_when_every_condition_holds() {
    let fx = Fixture::new(full_caps());
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Hevc, Some(5.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Hardware);
    assert_eq!(plan.encoder, Some(GifEncoder::Worker));
    assert!(!plan.encoder_pinned);
}

#[tokio::test]
async fn mobile_or_long_clips_fall_back_to_palette() {
    let fx = Fixture::new(Capabilities {
        is_mobile: true,
        ..full_caps()
    });
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Hevc, Some(5.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.encoder, Some(GifEncoder::Palette));
    assert!(plan.reason.contains("mobile"));

    let fx = Fixture::new(full_caps());
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Hevc, Some(90.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.encoder, Some(GifEncoder::Palette));
    assert!(plan.reason.contains("budget"));
}

#[tokio::test]
async fn single_core_device_gets_palette() {
    let fx = Fixture::new(Capabilities {
        logical_cores: 1,
        ..full_caps()
    });
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Hevc, Some(5.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.encoder, Some(GifEncoder::Palette));
    assert!(plan.reason.contains("logical core"));
}

#[tokio::test]
async fn pipeline_without_hardware_decoder_moves_plan_to_software() {
    let mut fx = Fixture::new(full_caps());
    fx.pipeline = StaticPipeline::new(PipelineInfo {
        decode_path: ConversionPath::Software,
        container: ContainerKind::Webm,
        track: None,
        demuxer_present: false,
    });
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Vp9, Some(5.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Software);
    assert_eq!(plan.encoder, None);
    assert!(plan.reason.contains("no hardware decoder"));

    // av1 has nowhere else to go.
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::Av1, Some(5.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Hardware);
}

fn worker_success(codec: CodecFamily) -> OutcomeRecord {
    OutcomeRecord {
        timestamp_ms: 1,
        codec,
        format: OutputFormat::Gif,
        planned_path: ConversionPath::Hardware,
        executed_path: ConversionPath::Hardware,
        encoder: Some(EncoderBackend::Worker),
        capture_mode: None,
        timings: PhaseTimings {
            total_ms: 1200,
            ..Default::default()
        },
        output_bytes: Some(1024),
        outcome: Outcome::Success,
        error: None,
    }
}

#[tokio::test]
async fn av1_worker_requires_history_backing() {
    let fx = Fixture::new(full_caps());
    let metadata = meta(CodecFamily::Av1, Some(4.0));
    let plan = plan_with(&fx, OutputFormat::Gif, &ConversionOptions::default(), &metadata)
        .await
        .unwrap();
    assert_eq!(plan.encoder, Some(GifEncoder::Palette));
    assert!(plan.reason.contains("history"));

    for _ in 0..3 {
        fx.history.record(worker_success(CodecFamily::Av1));
    }
    let plan = plan_with(&fx, OutputFormat::Gif, &ConversionOptions::default(), &metadata)
        .await
        .unwrap();
    assert_eq!(plan.encoder, Some(GifEncoder::Worker));
}

#[tokio::test]
async fn forced_strategy_codec_changes_strategy_only() {
    let fx = Fixture::new(Capabilities::conservative()).with_overrides(OverrideSet {
        forced_strategy_codec: Some(CodecFamily::Av1),
        ..Default::default()
    });
    let plan = plan_with(
        &fx,
        OutputFormat::Gif,
        &ConversionOptions::default(),
        &meta(CodecFamily::H264, Some(4.0)),
    )
    .await
    .unwrap();
    assert_eq!(plan.path, ConversionPath::Hardware);
    assert_eq!(plan.codec, CodecFamily::H264);
    assert!(!plan.forced_by_override);
}

#[tokio::test]
async fn cancelled_token_stops_planning() {
    let fx = Fixture::new(full_caps());
    let token = CancellationToken::new();
    token.cancel();
    let file = InputFile::named("clip.mp4", 1);
    let options = ConversionOptions::default();
    let metadata = meta(CodecFamily::H264, Some(2.0));
    let err = fx
        .planner()
        .plan(
            &PlanRequest {
                file: &file,
                format: OutputFormat::Gif,
                options: &options,
                metadata: &metadata,
            },
            &token,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn resolve_encoder_upgrades_with_final_metadata() {
    let fx = Fixture::new(full_caps());
    let options = ConversionOptions::default();
    let partial = VideoMetadata {
        codec: Some(CodecFamily::Hevc),
        duration_secs: Some(5.0),
        ..Default::default()
    };
    let planner = fx.planner();
    let file = InputFile::named("clip.mov", 1);
    let plan = planner
        .plan(
            &PlanRequest {
                file: &file,
                format: OutputFormat::Gif,
                options: &options,
                metadata: &partial,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(plan.encoder, Some(GifEncoder::Palette));

    let resolved = planner.resolve_encoder(
        plan,
        &meta(CodecFamily::Hevc, Some(5.0)),
        &options,
        &full_caps(),
    );
    assert_eq!(resolved.encoder, Some(GifEncoder::Worker));
    assert!(resolved.reason.contains("re-resolved"));
}

#[tokio::test]
async fn resolve_encoder_keeps_pinned_choice() {
    let fx = Fixture::new(full_caps());
    let mut plan = ExecutionPlan::new(
        ConversionPath::Hardware,
        OutputFormat::Gif,
        CodecFamily::Hevc,
        "pinned",
    );
    plan.encoder = Some(GifEncoder::Palette);
    plan.encoder_pinned = true;
    let resolved = fx.planner().resolve_encoder(
        plan.clone(),
        &meta(CodecFamily::Hevc, Some(5.0)),
        &ConversionOptions::default(),
        &full_caps(),
    );
    assert_eq!(resolved, plan);
}
