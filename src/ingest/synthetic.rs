//! Synthetic frame source.
//!
//! Generates frames at a target rate on its own thread and, every few frames, a scripted
//! metadata detection batch. Detections of kinds the session did not enable are filtered
//! here, at the source, the way a real provider would never emit them.

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{FrameSource, SensorSink, SourceStats};
use crate::detect::{
    BoundingBox, CodeReadout, DetectionCapability, FaceReadout, RawDetection, SymbolType,
    NO_IDENTITY,
};
use crate::frame::{SensorSample, Timestamp};

/// Script producing the metadata batch for a given frame index.
pub type DetectionScript = Box<dyn FnMut(u64) -> Vec<RawDetection> + Send>;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Emit a metadata batch every N frames. Zero disables metadata.
    pub metadata_every: u64,
    /// Report an unavailable buffer every N frames. Zero never does.
    pub unavailable_every: u64,
    /// Stop by itself after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            fps: 60,
            width: 640,
            height: 480,
            metadata_every: 3,
            unavailable_every: 0,
            max_frames: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    frames: AtomicU64,
    unavailable: AtomicU64,
    batches: AtomicU64,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    script: Option<DetectionScript>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    handle: Option<JoinHandle<DetectionScript>>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.fps == 0 {
            return Err(anyhow!("synthetic source fps must be > 0"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source dimensions must be non-zero"));
        }
        Ok(Self {
            config,
            script: Some(Box::new(default_script)),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            handle: None,
        })
    }

    pub fn with_script<F>(mut self, script: F) -> Self
    where
        F: FnMut(u64) -> Vec<RawDetection> + Send + 'static,
    {
        self.script = Some(Box::new(script));
        self
    }

    /// True while the producer thread is delivering.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Block until the source stops by itself (`max_frames`) or `timeout` passes.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn available_capabilities(&self) -> Vec<DetectionCapability> {
        vec![
            DetectionCapability::Faces,
            DetectionCapability::Codes,
            DetectionCapability::SalientRegions,
            DetectionCapability::HumanBody,
            DetectionCapability::CatBody,
            DetectionCapability::DogBody,
        ]
    }

    fn start(&mut self, enabled: &[DetectionCapability], sink: Arc<dyn SensorSink>) -> Result<()> {
        if self.handle.is_some() {
            return Err(anyhow!("source {} already started", self.config.name));
        }
        let script = self
            .script
            .take()
            .ok_or_else(|| anyhow!("source {} has no detection script", self.config.name))?;

        self.running.store(true, Ordering::Release);
        let producer = Producer {
            config: self.config.clone(),
            enabled: enabled.to_vec(),
            script,
            sink,
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
        };
        let handle = std::thread::Builder::new()
            .name("synthetic-source".into())
            .spawn(move || producer.run())
            .context("spawn synthetic source thread")?;
        self.handle = Some(handle);

        log::info!(
            "SyntheticSource: started {} at {} fps ({}x{})",
            self.config.name,
            self.config.fps,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let script = handle
                .join()
                .map_err(|_| anyhow!("source {} thread panicked", self.config.name))?;
            self.script = Some(script);
            log::info!("SyntheticSource: stopped {}", self.config.name);
        }
        Ok(())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_emitted: self.counters.frames.load(Ordering::Relaxed),
            buffers_unavailable: self.counters.unavailable.load(Ordering::Relaxed),
            detection_batches: self.counters.batches.load(Ordering::Relaxed),
            name: self.config.name.clone(),
        }
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{:#}", e);
        }
    }
}

struct Producer {
    config: SyntheticConfig,
    enabled: Vec<DetectionCapability>,
    script: DetectionScript,
    sink: Arc<dyn SensorSink>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Producer {
    /// Returns the script so a restarted source keeps its state.
    fn run(mut self) -> DetectionScript {
        let period = Duration::from_secs(1) / self.config.fps;
        let started = Instant::now();
        let mut scene_state = 0u8;
        let mut index = 0u64;

        while self.running.load(Ordering::Acquire) {
            if self.config.max_frames.is_some_and(|max| index >= max) {
                break;
            }
            let due = started + period * (index as u32);
            if let Some(wait) = due.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
            let captured_at = Timestamp::from_duration(started.elapsed());

            if index % 50 == 0 {
                scene_state = scene_state.wrapping_add(1);
            }

            let sample = if self.config.unavailable_every > 0
                && index > 0
                && index % self.config.unavailable_every == 0
            {
                self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
                SensorSample::unavailable(captured_at, "synthetic buffer drop")
            } else {
                SensorSample::new(
                    captured_at,
                    self.config.width,
                    self.config.height,
                    synthetic_pixels(&self.config, scene_state),
                )
            };
            self.counters.frames.fetch_add(1, Ordering::Relaxed);
            self.sink.on_frame(sample);

            if self.config.metadata_every > 0 && index % self.config.metadata_every == 0 {
                let batch: Vec<RawDetection> = (self.script)(index)
                    .into_iter()
                    .filter(|det| {
                        DetectionCapability::of(det).is_some_and(|cap| self.enabled.contains(&cap))
                    })
                    .collect();
                if !batch.is_empty() {
                    self.counters.batches.fetch_add(1, Ordering::Relaxed);
                    self.sink.on_detections(batch);
                }
            }
            index += 1;
        }

        self.running.store(false, Ordering::Release);
        self.script
    }
}

/// Static background that shifts whenever the scene state changes.
fn synthetic_pixels(config: &SyntheticConfig, scene_state: u8) -> Vec<u8> {
    let pixel_count = (config.width as usize) * (config.height as usize) * 3; // RGB
    let mut pixels = vec![0u8; pixel_count];
    for (i, pixel) in pixels.iter_mut().enumerate() {
        *pixel = ((i as u64 + scene_state as u64 * 37) % 256) as u8;
    }
    pixels
}

/// A small scene: a few face tracks drifting in and out, a rotating set of item QR
/// codes, an EAN label, a pet and the classifier's whole-frame fallback region.
pub fn default_script(index: u64) -> Vec<RawDetection> {
    let mut rng = rand::thread_rng();
    let mut batch = vec![RawDetection::salient_region(
        BoundingBox::FULL_FRAME,
        NO_IDENTITY,
    )];

    let track_id = (index / 120 % 3) as i64 + 1;
    batch.push(RawDetection::face(
        BoundingBox::new(0.35, 0.2, 0.2, 0.25),
        FaceReadout {
            track_id,
            roll: Some(rng.gen_range(-0.3..0.3)),
            yaw: Some(rng.gen_range(-0.6..0.6)),
            pitch: None,
        },
    ));

    let item = index / 90 % 4;
    batch.push(RawDetection::code(
        BoundingBox::new(0.6, 0.6, 0.15, 0.15),
        CodeReadout::new(SymbolType::Qr)
            .with_decoded(format!("https://example.org/items/{}", item))
            .with_version(2),
    ));

    if index % 30 == 0 {
        batch.push(RawDetection::code(
            BoundingBox::new(0.1, 0.7, 0.3, 0.1),
            CodeReadout::new(SymbolType::from_provider("org.gs1.EAN-13")),
        ));
    }
    batch.push(RawDetection::code(
        BoundingBox::new(0.0, 0.5, 0.4, 0.5),
        CodeReadout::new(SymbolType::from_provider("catBody")),
    ));
    batch
}
