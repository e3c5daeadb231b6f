use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use headingcam::{
    Alliance, FrameSource, ImageFileSource, JsonLinesSink, LatestFrameSource, LogSink,
    PipelineVariant, TelemetrySink, Tracker, VisionConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SinkKind {
    /// Log every published value
    Log,
    /// One JSON object per frame on stdout
    Json,
}

#[derive(Parser)]
#[command(name = "headingcam")]
#[command(about = "Turn camera frames into a left/center/right heading")]
struct Cli {
    /// Image files to process as consecutive frames
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// TOML configuration file (defaults to the tuned preset for the variant)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the pipeline variant from the configuration
    #[arg(long, value_enum)]
    variant: Option<PipelineVariant>,

    /// Use the hue preset for this alliance
    #[arg(long, value_enum)]
    alliance: Option<Alliance>,

    /// Where decisions are published
    #[arg(long, value_enum, default_value = "log")]
    sink: SinkKind,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    max_frames: Option<usize>,

    /// Capture on a background thread and skip frames that arrive while busy
    #[arg(long)]
    latest_only: bool,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration: {}", path.display());
            VisionConfig::load(path)?
        }
        None => VisionConfig::preset(args.variant.unwrap_or_default()),
    };
    if let Some(variant) = args.variant {
        config.variant = variant;
    }
    if let Some(alliance) = args.alliance {
        config.threshold.alliance = Some(alliance);
    }
    config.validate()?;

    let tracker = Tracker::from_config(&config, args.debug_out)?;
    log::info!(
        "Running {:?} pipeline on {} image(s)",
        config.variant,
        args.images.len()
    );

    let files = ImageFileSource::new(args.images);
    let mut source: Box<dyn FrameSource> = if args.latest_only {
        Box::new(LatestFrameSource::spawn(files))
    } else {
        Box::new(files)
    };
    let mut sink: Box<dyn TelemetrySink> = match args.sink {
        SinkKind::Log => Box::new(LogSink),
        SinkKind::Json => Box::new(JsonLinesSink::new(std::io::stdout().lock())),
    };

    let stats = tracker.run(source.as_mut(), sink.as_mut(), args.max_frames)?;

    if stats.failed > 0 {
        log::warn!("{} of {} frames failed to process", stats.failed, stats.frames);
    }

    Ok(())
}
