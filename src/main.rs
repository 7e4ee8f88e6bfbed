use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bottletrack_rs::{
    Config, FrameSource, ImageSequenceSink, ImageSequenceSource, MultiTracker, Pipeline,
    ReplayDetector, Renderer, SqliteEventLog, StopSignal,
};

/// Track objects through a frame sequence, log confirmed tracks to SQLite
/// and write annotated frames.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory of input frames
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Directory for annotated frames
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// JSON Lines detection export
    #[arg(short, long)]
    detections: Option<PathBuf>,
    /// SQLite event log
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long)]
    min_confidence: Option<f32>,
    /// Font used for track labels
    #[arg(long)]
    font: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(input) = self.input {
            config.source.path = input;
        }
        if let Some(output) = self.output {
            config.output.path = output;
        }
        if let Some(detections) = self.detections {
            config.detector.detections = detections;
        }
        if let Some(db) = self.db {
            config.store.database = db;
        }
        if let Some(min_confidence) = self.min_confidence {
            config.detector.min_confidence = min_confidence;
        }
        if let Some(font) = self.font {
            config.render.font = Some(font);
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(config: Config) -> Result<()> {
    let detector = ReplayDetector::open(&config.detector.detections)
        .context("failed to load detector")?;
    let tracker = MultiTracker::new(config.tracker.clone()).context("failed to build tracker")?;
    let renderer = match &config.render.font {
        Some(font) => Renderer::with_font_file(config.render.style(), font)?,
        None => Renderer::with_default_font(config.render.style())?,
    };

    let source = ImageSequenceSource::open(&config.source.path, config.source.fps)
        .context("failed to open frame source")?;
    let sink = ImageSequenceSink::create(&config.output.path, source.info())
        .context("failed to open output")?;

    let stop = StopSignal::new();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, stop.flag())
            .context("failed to install signal handler")?;
    }

    let mut pipeline = Pipeline::new(
        source,
        sink,
        detector,
        tracker,
        SqliteEventLog::new(&config.store.database),
        renderer,
    )?
    .with_min_confidence(config.detector.min_confidence)
    .with_timestamp_format(config.store.timestamp_format.clone())
    .with_stop_signal(stop);

    info!(output = %config.output.path.display(), "processing frames, send SIGINT to stop");
    let summary = pipeline.run()?;
    info!(
        frames = summary.frames,
        records = summary.records_logged,
        log_failures = summary.log_failures,
        "processing finished, resources released"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bottletrack=info,bottletrack_rs=info")),
        )
        .init();

    let result = Args::parse().into_config().and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
