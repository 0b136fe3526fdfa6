use anyhow::Result;

use super::capability::DetectionCapability;
use super::raw::RawDetection;
use crate::frame::Frame;

/// Per-frame classifier whose results the pipeline consumes.
///
/// Model inference lives behind this trait. Implementations run on the pipeline's
/// worker thread, one frame at a time, and must not keep the frame past the call.
pub trait FrameAnalyzer: Send {
    /// Analyzer identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the analyzer can report detections of this kind.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on one frame.
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
