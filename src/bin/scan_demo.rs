//! scan_demo - end-to-end synthetic scanning session
//!
//! 1. Loads pipeline configuration (file + environment)
//! 2. Starts a synthetic source feeding the backpressured pipeline
//! 3. Logs novelty as it happens and health once per second
//! 4. Stops on Ctrl-C or after `--seconds`, source first, then the pipeline

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sensor_pipeline::config::PipelineConfig;
use sensor_pipeline::{
    DisplayFrame, EntityTracker, FrameIngestPipeline, LogLauncher, NoveltyEvent, ObservationLog,
    ScanSession, StubAnalyzer, SyntheticSource, UiConsumer,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Run time in seconds (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Source frame rate; overrides configuration.
    #[arg(long)]
    fps: Option<u32>,
    /// Configuration file (JSON, or TOML by extension).
    #[arg(long, env = "SCAN_CONFIG")]
    config: Option<PathBuf>,
    /// Start with metadata detection active (no preview rendering).
    #[arg(long)]
    metadata: bool,
    /// Report an unavailable frame buffer every N frames.
    #[arg(long, default_value_t = 0)]
    unavailable_every: u64,
}

/// Stands in for the preview widget: counts frames and prints novelty.
#[derive(Default)]
struct ConsoleUi {
    displayed: u64,
}

impl UiConsumer for ConsoleUi {
    fn on_display(&mut self, frame: DisplayFrame) {
        self.displayed += 1;
        if self.displayed % 50 == 0 {
            log::debug!(
                "preview: {} frames shown, latest {}x{} at {}",
                self.displayed,
                frame.width,
                frame.height,
                frame.captured_at
            );
        }
    }

    fn on_novelty(&mut self, event: &NoveltyEvent) {
        match event {
            NoveltyEvent::Person(p) => eprintln!("+ person track {}", p.track_id),
            NoveltyEvent::Code(c) if c.payload.is_empty() => eprintln!("+ {} code", c.symbol),
            NoveltyEvent::Code(c) => eprintln!("+ {} code {}", c.symbol, c.payload),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = PipelineConfig::load_from(args.config.as_deref())?;
    if let Some(fps) = args.fps {
        if fps == 0 {
            return Err(anyhow!("fps must be >= 1"));
        }
        cfg.source.fps = fps;
    }
    if args.metadata {
        cfg.render_enabled = false;
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    }

    let mut tracker = EntityTracker::new().with_launcher(LogLauncher);
    tracker.subscribe(ObservationLog::new());
    let pipeline = FrameIngestPipeline::start(
        cfg.pipeline_options(),
        Box::new(StubAnalyzer::new()),
        tracker,
        Box::new(ConsoleUi::default()),
    )?;

    let mut source_cfg = cfg.synthetic_source();
    source_cfg.unavailable_every = args.unavailable_every;
    let source = SyntheticSource::new(source_cfg)?;
    let session = ScanSession::start(Box::new(source), pipeline, &cfg.capabilities)?;

    let started = Instant::now();
    let mut last_health_log = Instant::now();
    let run_for = (args.seconds > 0).then(|| Duration::from_secs(args.seconds));

    while !stop.load(Ordering::SeqCst) && run_for.map_or(true, |d| started.elapsed() < d) {
        std::thread::sleep(Duration::from_millis(100));

        if last_health_log.elapsed() >= Duration::from_secs(1) {
            let stats = session.pipeline().stats();
            let source = session.source_stats();
            log::info!(
                "frames={} dispatched={} dropped={} renders={} novel={} failures={}/{} src={}",
                stats.frames_received,
                stats.frames_dispatched,
                stats.frames_dropped_busy,
                stats.renders,
                stats.novelty_events,
                stats.acquisition_failures,
                stats.classification_failures,
                source.name
            );
            last_health_log = Instant::now();
        }
    }

    let snapshot = session.snapshot();
    let stats = session.stop()?;
    log::info!(
        "observed {} people and {} codes",
        snapshot.persons.len(),
        snapshot.barcodes.len()
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
