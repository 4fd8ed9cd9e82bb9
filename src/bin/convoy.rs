use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use convoy::backend::fixed::{StaticNative, StaticPipeline};
use convoy::{
    Capabilities, CapabilityProbe, CaptureMode, CodecFamily, ContainerKind, ConversionOptions,
    ConversionPath, EngineConfig, GifEncoder, InputFile, OutcomeHistory, OutputFormat,
    OverrideSet, OverrideStore, PathPlanner, PipelineInfo, PlanRequest, QualityTier,
    SessionStore, StrategyQuery, StrategyRegistry, VideoMetadata,
};

#[derive(Parser, Debug)]
#[command(name = "convoy", version)]
struct Cli {
    /// Session store (JSON file) holding outcome history and developer overrides.
    #[arg(long, global = true, default_value = "convoy-session.json")]
    store: PathBuf,

    /// Engine config JSON; tuned defaults when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a conversion and print the execution plan as JSON.
    Plan(PlanArgs),
    /// Print the strategy table's reasoning for a request as JSON.
    Explain(RequestArgs),
    /// Inspect or clear the session outcome history.
    #[command(subcommand)]
    History(HistoryCommand),
    /// Manage developer overrides.
    #[command(subcommand)]
    Overrides(OverridesCommand),
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// Grouped success rates and latencies.
    Summary,
    /// Palette vs worker recommendation for one codec.
    Recommend {
        #[arg(long)]
        codec: String,
    },
    /// Raw records, oldest first.
    Export,
    Clear,
}

#[derive(Subcommand, Debug)]
enum OverridesCommand {
    Show,
    Set(OverrideArgs),
    Clear,
}

#[derive(Args, Debug)]
struct OverrideArgs {
    #[arg(long, value_enum)]
    path: Option<PathArg>,
    #[arg(long, value_enum)]
    encoder: Option<EncoderArg>,
    #[arg(long, value_enum)]
    capture_mode: Option<CaptureArg>,
    /// Plan as if the input had this codec.
    #[arg(long, value_enum)]
    strategy_codec: Option<CodecArg>,
    #[arg(long, default_value_t = false)]
    disable_fallback: bool,
}

#[derive(Args, Debug)]
struct RequestArgs {
    #[arg(long, value_enum, default_value_t = FormatArg::Gif)]
    format: FormatArg,
    /// Raw codec string (e.g. `avc1.64001f`, `av01.0.05M.08`).
    #[arg(long)]
    codec: Option<String>,
    /// Source duration in seconds.
    #[arg(long)]
    duration: Option<f64>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Container reported by the pipeline probe; omit to plan from metadata only.
    #[arg(long, value_enum)]
    container: Option<ContainerArg>,
    #[command(flatten)]
    caps: CapsArgs,
}

#[derive(Args, Debug)]
struct CapsArgs {
    #[arg(long, default_value_t = false)]
    hardware_decode: bool,
    /// Shared memory, workers and cross-origin isolation all available.
    #[arg(long, default_value_t = false)]
    threading: bool,
    #[arg(long, default_value_t = false)]
    mobile: bool,
    #[arg(long)]
    device_memory_gb: Option<f64>,
    #[arg(long)]
    heap_limit_mb: Option<u64>,
    #[arg(long, default_value_t = 4)]
    cores: u32,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    request: RequestArgs,
    #[arg(long, value_enum, default_value_t = QualityArg::Medium)]
    quality: QualityArg,
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
    #[arg(long)]
    fps: Option<f64>,
    /// Requested GIF encoder.
    #[arg(long, value_enum)]
    encoder: Option<EncoderArg>,
    /// Requested capture mode.
    #[arg(long, value_enum)]
    capture_mode: Option<CaptureArg>,
    /// The native mp4 encoder is available.
    #[arg(long, default_value_t = false)]
    native: bool,
    /// The container has a demuxer.
    #[arg(long, default_value_t = false)]
    demuxer: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Gif,
    Webp,
    Mp4,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Gif => Self::Gif,
            FormatArg::Webp => Self::Webp,
            FormatArg::Mp4 => Self::Mp4,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityArg {
    Low,
    Medium,
    High,
}

impl From<QualityArg> for QualityTier {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Low => Self::Low,
            QualityArg::Medium => Self::Medium,
            QualityArg::High => Self::High,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderArg {
    Palette,
    Worker,
}

impl From<EncoderArg> for GifEncoder {
    fn from(v: EncoderArg) -> Self {
        match v {
            EncoderArg::Palette => Self::Palette,
            EncoderArg::Worker => Self::Worker,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CaptureArg {
    Demuxer,
    Track,
    FrameCallback,
    Seek,
}

impl From<CaptureArg> for CaptureMode {
    fn from(v: CaptureArg) -> Self {
        match v {
            CaptureArg::Demuxer => Self::Demuxer,
            CaptureArg::Track => Self::Track,
            CaptureArg::FrameCallback => Self::FrameCallback,
            CaptureArg::Seek => Self::Seek,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ContainerArg {
    Mp4,
    Mov,
    Webm,
    Mkv,
    Unknown,
}

impl From<ContainerArg> for ContainerKind {
    fn from(v: ContainerArg) -> Self {
        match v {
            ContainerArg::Mp4 => Self::Mp4,
            ContainerArg::Mov => Self::Mov,
            ContainerArg::Webm => Self::Webm,
            ContainerArg::Mkv => Self::Mkv,
            ContainerArg::Unknown => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PathArg {
    Hardware,
    Software,
    NativeFast,
}

impl From<PathArg> for ConversionPath {
    fn from(v: PathArg) -> Self {
        match v {
            PathArg::Hardware => Self::Hardware,
            PathArg::Software => Self::Software,
            PathArg::NativeFast => Self::NativeFast,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecArg {
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
}

impl From<CodecArg> for CodecFamily {
    fn from(v: CodecArg) -> Self {
        match v {
            CodecArg::H264 => Self::H264,
            CodecArg::Hevc => Self::Hevc,
            CodecArg::Vp8 => Self::Vp8,
            CodecArg::Vp9 => Self::Vp9,
            CodecArg::Av1 => Self::Av1,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(p) => EngineConfig::from_path(p)?,
        None => EngineConfig::default(),
    };
    let store: Arc<dyn SessionStore> = Arc::new(convoy::JsonFileStore::new(cli.store.clone()));
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args, store, &config),
        Command::Explain(args) => cmd_explain(args),
        Command::History(cmd) => cmd_history(cmd, store, &config),
        Command::Overrides(cmd) => cmd_overrides(cmd, store),
    }
}

impl CapsArgs {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            hardware_decode: self.hardware_decode,
            shared_memory: self.threading,
            workers: self.threading,
            cross_origin_isolated: self.threading,
            device_memory_gb: self.device_memory_gb,
            heap_limit_bytes: self.heap_limit_mb.map(|mb| mb << 20),
            is_mobile: self.mobile,
            logical_cores: self.cores,
        }
    }
}

impl RequestArgs {
    fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            width: self.width,
            height: self.height,
            duration_secs: self.duration,
            codec: self.codec.as_deref().map(convoy::normalize),
            framerate: None,
            bitrate: None,
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("encode JSON output")?;
    println!("{text}");
    Ok(())
}

fn cmd_plan(
    args: PlanArgs,
    store: Arc<dyn SessionStore>,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let req = &args.request;
    let format = req.format.into();
    let metadata = req.metadata();
    let options = ConversionOptions {
        quality: args.quality.into(),
        scale: args.scale,
        max_duration_secs: None,
        fps: args.fps,
        gif_encoder: args.encoder.map(Into::into),
        capture_mode: args.capture_mode.map(Into::into),
    };
    options.validate()?;

    let pipeline = match req.container {
        Some(container) => StaticPipeline::new(PipelineInfo {
            decode_path: ConversionPath::Hardware,
            container: container.into(),
            track: None,
            demuxer_present: args.demuxer,
        }),
        None => StaticPipeline::unavailable(),
    };
    let planner = PathPlanner::new(
        Arc::new(CapabilityProbe::fixed(req.caps.capabilities())),
        Arc::new(pipeline),
        Arc::new(StaticNative::new(args.native)),
        Arc::new(OutcomeHistory::load(store.clone(), config.history)),
        Some(Arc::new(OverrideStore::new(store))),
        config.planner.clone(),
    );

    let file = InputFile::named("cli-input", 0);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("start async runtime")?;
    let plan = runtime.block_on(planner.plan(
        &PlanRequest {
            file: &file,
            format,
            options: &options,
            metadata: &metadata,
        },
        &CancellationToken::new(),
    ))?;
    print_json(&plan)
}

fn cmd_explain(args: RequestArgs) -> anyhow::Result<()> {
    let caps = args.caps.capabilities();
    let metadata = args.metadata();
    let query = StrategyQuery {
        codec: metadata.codec_or_unknown(),
        format: args.format.into(),
        container: args.container.map(Into::into),
        capabilities: &caps,
        duration_secs: metadata.duration(),
    };
    print_json(&StrategyRegistry::new().get_strategy_reasoning(&query))
}

fn cmd_history(
    cmd: HistoryCommand,
    store: Arc<dyn SessionStore>,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let history = OutcomeHistory::load(store, config.history);
    match cmd {
        HistoryCommand::Summary => print_json(&history.summary()),
        HistoryCommand::Recommend { codec } => {
            print_json(&history.encoder_recommendation(convoy::normalize(&codec)))
        }
        HistoryCommand::Export => {
            println!("{}", history.export_json()?);
            Ok(())
        }
        HistoryCommand::Clear => {
            history.clear();
            eprintln!("cleared outcome history");
            Ok(())
        }
    }
}

fn cmd_overrides(cmd: OverridesCommand, store: Arc<dyn SessionStore>) -> anyhow::Result<()> {
    let overrides = OverrideStore::new(store);
    match cmd {
        OverridesCommand::Show => print_json(&overrides.get()),
        OverridesCommand::Set(args) => {
            let set = OverrideSet {
                forced_path: args.path.map(Into::into),
                forced_encoder: args.encoder.map(Into::into),
                forced_capture_mode: args.capture_mode.map(Into::into),
                forced_strategy_codec: args.strategy_codec.map(Into::into),
                disable_fallback: args.disable_fallback,
            };
            overrides.set(&set);
            print_json(&overrides.get())
        }
        OverridesCommand::Clear => {
            overrides.clear();
            eprintln!("cleared developer overrides");
            Ok(())
        }
    }
}
