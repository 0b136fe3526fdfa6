//! Frame sources and session lifecycle.
//!
//! A `FrameSource` is the producer: it owns its own thread and pushes sensor ticks and
//! metadata detections into a `SensorSink` (the pipeline). Sources never wait on the
//! sink; the sink never blocks.
//!
//! - `SyntheticSource`: scripted source for demos and tests (`stub://`-style).
//! - `ScanSession`: negotiates detection kinds, starts the source, tears down in order.

mod session;
pub mod synthetic;

pub use session::ScanSession;
pub use synthetic::{SyntheticConfig, SyntheticSource};

use anyhow::Result;
use std::sync::Arc;

use crate::detect::{DetectionCapability, RawDetection};
use crate::frame::SensorSample;
use crate::pipeline::FrameIngestPipeline;

/// Receiver of source callbacks. Implementations must return promptly.
pub trait SensorSink: Send + Sync {
    /// Invoked once per sensor tick, in capture order.
    fn on_frame(&self, sample: SensorSample);

    /// Invoked when metadata-style detection reports, on its own cadence.
    fn on_detections(&self, detections: Vec<RawDetection>);
}

impl SensorSink for FrameIngestPipeline {
    fn on_frame(&self, sample: SensorSample) {
        FrameIngestPipeline::on_frame(self, sample)
    }

    fn on_detections(&self, detections: Vec<RawDetection>) {
        FrameIngestPipeline::on_detections(self, detections)
    }
}

/// Producer of frames and detections.
pub trait FrameSource: Send {
    /// Source identifier.
    fn name(&self) -> &str;

    /// Detection kinds this source can produce.
    fn available_capabilities(&self) -> Vec<DetectionCapability>;

    /// Start delivering callbacks with only `enabled` detection kinds switched on.
    fn start(&mut self, enabled: &[DetectionCapability], sink: Arc<dyn SensorSink>) -> Result<()>;

    /// Stop delivering. No callback happens after this returns.
    fn stop(&mut self) -> Result<()>;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_emitted: u64,
    pub buffers_unavailable: u64,
    pub detection_batches: u64,
    pub name: String,
}
