//! Backpressured frame ingest.
//!
//! The sensor thread calls `on_frame` / `on_detections`. Neither call ever blocks:
//!
//! 1. The frame buffer is acquired; failure skips the tick.
//! 2. Unless metadata detection is active, the render throttle may promote the frame to a
//!    `DisplayFrame`, which is sent to the UI thread.
//! 3. The frame gate is try-acquired. If a classification pass is already in flight the
//!    frame is dropped; otherwise the frame and the gate permit move to the worker thread.
//!
//! The worker runs analyzer → junk filter → classifier → tracker and releases the permit
//! when the pass ends, however it ends. Novelty events are forwarded to the UI thread.

mod gate;
mod throttle;

pub use gate::{BusyGate, GatePermit};
pub use throttle::{RenderThrottle, DEFAULT_RENDER_INTERVAL};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::detect::{classify, is_junk, Entity, FrameAnalyzer, RawDetection};
use crate::frame::{DisplayFrame, Frame, SensorSample};
use crate::track::{EntityTracker, NoveltyEvent, NoveltySink, ObservedSnapshot};

/// Default threshold after which a held frame gate is reported as stalled.
pub const DEFAULT_STALL_WARNING: Duration = Duration::from_secs(1);

/// Runtime knobs for a pipeline instance.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub render_interval: Duration,
    pub stall_warning: Duration,
    /// Metadata-style detection starts active: no preview rendering.
    pub metadata_detection: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            render_interval: DEFAULT_RENDER_INTERVAL,
            stall_warning: DEFAULT_STALL_WARNING,
            metadata_detection: false,
        }
    }
}

/// Display side of the pipeline. Runs on its own thread; everything it receives has
/// already been published and is immutable.
pub trait UiConsumer: Send {
    fn on_display(&mut self, frame: DisplayFrame);

    fn on_novelty(&mut self, _event: &NoveltyEvent) {}
}

/// Counters for health logging.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames_received: u64,
    pub frames_dropped_busy: u64,
    pub frames_dispatched: u64,
    pub acquisition_failures: u64,
    pub classification_failures: u64,
    pub renders: u64,
    pub novelty_events: u64,
    pub stalls: u64,
    pub metadata_batches: u64,
    pub metadata_dropped_busy: u64,
}

#[derive(Default)]
struct StatsCounters {
    frames_received: AtomicU64,
    frames_dropped_busy: AtomicU64,
    frames_dispatched: AtomicU64,
    acquisition_failures: AtomicU64,
    classification_failures: AtomicU64,
    renders: AtomicU64,
    novelty_events: AtomicU64,
    stalls: AtomicU64,
    metadata_batches: AtomicU64,
    metadata_dropped_busy: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl StatsCounters {
    fn snapshot(&self) -> PipelineStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PipelineStats {
            frames_received: get(&self.frames_received),
            frames_dropped_busy: get(&self.frames_dropped_busy),
            frames_dispatched: get(&self.frames_dispatched),
            acquisition_failures: get(&self.acquisition_failures),
            classification_failures: get(&self.classification_failures),
            renders: get(&self.renders),
            novelty_events: get(&self.novelty_events),
            stalls: get(&self.stalls),
            metadata_batches: get(&self.metadata_batches),
            metadata_dropped_busy: get(&self.metadata_dropped_busy),
        }
    }

    /// Drop counter for work of this job's kind.
    fn busy_counter(&self, job: &Job) -> &AtomicU64 {
        match job {
            Job::Frame { .. } => &self.frames_dropped_busy,
            Job::Detections { .. } => &self.metadata_dropped_busy,
        }
    }
}

enum Job {
    Frame { frame: Frame, permit: GatePermit },
    Detections {
        detections: Vec<RawDetection>,
        permit: GatePermit,
    },
}

enum UiEvent {
    Display(DisplayFrame),
    Novelty(NoveltyEvent),
}

/// Forwards tracker novelty onto the UI thread.
struct UiForwarder {
    ui: Sender<UiEvent>,
}

impl NoveltySink for UiForwarder {
    fn on_novelty(&mut self, event: &NoveltyEvent) {
        let _ = self.ui.send(UiEvent::Novelty(event.clone()));
    }
}

/// The backpressure core. One instance per session.
pub struct FrameIngestPipeline {
    frame_gate: Arc<BusyGate>,
    metadata_gate: Arc<BusyGate>,
    throttle: Mutex<RenderThrottle>,
    metadata_active: AtomicBool,
    stall_warning: Duration,
    jobs: Option<SyncSender<Job>>,
    ui: Option<Sender<UiEvent>>,
    worker: Option<JoinHandle<()>>,
    ui_thread: Option<JoinHandle<()>>,
    stats: Arc<StatsCounters>,
    snapshot: Arc<Mutex<Arc<ObservedSnapshot>>>,
}

impl FrameIngestPipeline {
    /// Spawn the worker and UI threads. The tracker moves onto the worker thread, which
    /// becomes the only place the observed set is mutated.
    pub fn start(
        options: PipelineOptions,
        mut analyzer: Box<dyn FrameAnalyzer>,
        mut tracker: EntityTracker,
        consumer: Box<dyn UiConsumer>,
    ) -> Result<Self> {
        analyzer
            .warm_up()
            .with_context(|| format!("warm up analyzer {}", analyzer.name()))?;

        let (ui_tx, ui_rx) = mpsc::channel();
        let ui_thread = std::thread::Builder::new()
            .name("pipeline-ui".into())
            .spawn(move || run_ui(ui_rx, consumer))
            .context("spawn pipeline ui thread")?;

        tracker.subscribe(UiForwarder { ui: ui_tx.clone() });

        // One slot per gate; the gates already bound what can be in flight.
        let (job_tx, job_rx) = mpsc::sync_channel(2);
        let stats = Arc::new(StatsCounters::default());
        let snapshot = Arc::new(Mutex::new(tracker.observed().snapshot()));
        let worker = Worker {
            analyzer,
            tracker,
            stats: Arc::clone(&stats),
            snapshot: Arc::clone(&snapshot),
        };
        let worker = std::thread::Builder::new()
            .name("pipeline-worker".into())
            .spawn(move || worker.run(job_rx))
            .context("spawn pipeline worker thread")?;

        log::info!(
            "pipeline started: render every {:?}, stall warning after {:?}, metadata detection {}",
            options.render_interval,
            options.stall_warning,
            if options.metadata_detection { "on" } else { "off" }
        );

        Ok(Self {
            frame_gate: BusyGate::new(),
            metadata_gate: BusyGate::new(),
            throttle: Mutex::new(RenderThrottle::new(options.render_interval)),
            metadata_active: AtomicBool::new(options.metadata_detection),
            stall_warning: options.stall_warning,
            jobs: Some(job_tx),
            ui: Some(ui_tx),
            worker: Some(worker),
            ui_thread: Some(ui_thread),
            stats,
            snapshot,
        })
    }

    /// Sensor tick entry point.
    pub fn on_frame(&self, sample: SensorSample) {
        bump(&self.stats.frames_received);
        let captured_at = sample.captured_at();
        let frame = match sample.acquire() {
            Ok(frame) => frame,
            Err(e) => {
                bump(&self.stats.acquisition_failures);
                log::warn!("skipping tick: {:#}", e);
                return;
            }
        };

        if !self.metadata_active.load(Ordering::Acquire) {
            self.render(&frame);
        }

        match self.frame_gate.try_acquire() {
            Some(permit) => {
                if self.dispatch(Job::Frame { frame, permit }) {
                    bump(&self.stats.frames_dispatched);
                }
            }
            None => {
                bump(&self.stats.frames_dropped_busy);
                log::trace!("frame at {} dropped: classification in flight", captured_at);
                self.check_stall();
            }
        }
    }

    /// Metadata detection entry point. Same drop-on-busy policy as frames.
    pub fn on_detections(&self, detections: Vec<RawDetection>) {
        bump(&self.stats.metadata_batches);
        if detections.is_empty() {
            return;
        }
        match self.metadata_gate.try_acquire() {
            Some(permit) => {
                self.dispatch(Job::Detections { detections, permit });
            }
            None => {
                bump(&self.stats.metadata_dropped_busy);
                log::trace!("{} detections dropped: batch in flight", detections.len());
            }
        }
    }

    /// While metadata-style detection is active the preview is not rendered here.
    pub fn set_metadata_detection(&self, active: bool) {
        self.metadata_active.store(active, Ordering::Release);
    }

    pub fn metadata_detection(&self) -> bool {
        self.metadata_active.load(Ordering::Acquire)
    }

    /// True when no classification pass of either kind is in flight.
    pub fn is_idle(&self) -> bool {
        !self.frame_gate.is_busy() && !self.metadata_gate.is_busy()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    /// Latest published copy of the observed set.
    pub fn snapshot(&self) -> Arc<ObservedSnapshot> {
        lock(&self.snapshot).clone()
    }

    fn render(&self, frame: &Frame) {
        let display = lock(&self.throttle).maybe_render(frame);
        let (Some(display), Some(ui)) = (display, self.ui.as_ref()) else {
            return;
        };
        bump(&self.stats.renders);
        let _ = ui.send(UiEvent::Display(display));
    }

    /// Hand a job to the worker. Returns false if it could not be queued; the job and
    /// its permit are dropped in that case, which releases the gate.
    fn dispatch(&self, job: Job) -> bool {
        let Some(jobs) = self.jobs.as_ref() else {
            return false;
        };
        match jobs.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                bump(self.stats.busy_counter(&job));
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("pipeline worker is gone; dropping work");
                false
            }
        }
    }

    fn check_stall(&self) {
        let Some(held) = self.frame_gate.held_for() else {
            return;
        };
        if held >= self.stall_warning && self.frame_gate.claim_stall_report() {
            bump(&self.stats.stalls);
            log::warn!(
                "classification pass in flight for {:?}; new frames are being dropped",
                held
            );
        }
    }
}

impl Drop for FrameIngestPipeline {
    fn drop(&mut self) {
        // Closing the job channel ends the worker, whose tracker holds the last
        // novelty forwarder; closing ours then ends the UI thread.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("pipeline worker exited by panic");
            }
        }
        self.ui.take();
        if let Some(ui_thread) = self.ui_thread.take() {
            if ui_thread.join().is_err() {
                log::warn!("pipeline ui thread exited by panic");
            }
        }
        log::info!("pipeline stopped: {:?}", self.stats.snapshot());
    }
}

struct Worker {
    analyzer: Box<dyn FrameAnalyzer>,
    tracker: EntityTracker,
    stats: Arc<StatsCounters>,
    snapshot: Arc<Mutex<Arc<ObservedSnapshot>>>,
}

impl Worker {
    fn run(mut self, jobs: Receiver<Job>) {
        for job in jobs {
            let mark = self.tracker.checkpoint();
            let (outcome, permit) = match job {
                Job::Frame { frame, permit } => {
                    let captured_at = frame.captured_at;
                    let outcome = self
                        .guarded_pass(|w| {
                            let detections = w.analyzer.analyze(&frame)?;
                            drop(frame);
                            Ok(w.observe_all(&detections))
                        })
                        .with_context(|| format!("frame at {}", captured_at));
                    (outcome, permit)
                }
                Job::Detections {
                    detections,
                    permit,
                } => {
                    let outcome = self
                        .guarded_pass(|w| Ok(w.observe_all(&detections)))
                        .context("metadata batch");
                    (outcome, permit)
                }
            };

            match outcome {
                Ok(0) => {}
                Ok(novel) => {
                    self.stats.novelty_events.fetch_add(novel, Ordering::Relaxed);
                    *lock(&self.snapshot) = self.tracker.observed().snapshot();
                }
                Err(e) => {
                    bump(&self.stats.classification_failures);
                    log::warn!("classification failed: {:#}", e);
                    // A failed pass leaves no observations behind.
                    self.tracker.rollback(mark);
                    *lock(&self.snapshot) = self.tracker.observed().snapshot();
                }
            }
            // Reopen the gate only once the pass is fully accounted for.
            drop(permit);
        }
    }

    fn guarded_pass<F>(&mut self, pass: F) -> Result<u64>
    where
        F: FnOnce(&mut Self) -> Result<u64>,
    {
        panic::catch_unwind(AssertUnwindSafe(|| pass(self)))
            .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))))
    }

    /// Filter and classify the whole batch before touching the tracker. A failure while
    /// observing is undone by the caller.
    fn observe_all(&mut self, detections: &[RawDetection]) -> u64 {
        let entities: Vec<Entity> = detections
            .iter()
            .filter(|d| !is_junk(d))
            .map(classify)
            .filter(|e| !e.is_discarded())
            .collect();
        let mut novel = 0;
        for entity in entities {
            if self.tracker.observe(entity) {
                novel += 1;
            }
        }
        novel
    }
}

fn run_ui(events: Receiver<UiEvent>, mut consumer: Box<dyn UiConsumer>) {
    for event in events {
        match event {
            UiEvent::Display(frame) => consumer.on_display(frame),
            UiEvent::Novelty(event) => consumer.on_novelty(&event),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
