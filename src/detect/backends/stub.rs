use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::FrameAnalyzer;
use crate::detect::capability::DetectionCapability;
use crate::detect::raw::{BoundingBox, RawDetection, NO_IDENTITY};
use crate::frame::Frame;

/// Stub analyzer for demos and tests. Uses pixel hashing to spot scene changes.
///
/// Every frame gets the whole-frame salient region real classifiers fall back to. A
/// frame whose pixels differ from the previous one also gets an identified region.
pub struct StubAnalyzer {
    last_hash: Option<[u8; 32]>,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self { last_hash: None }
    }
}

impl Default for StubAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAnalyzer for StubAnalyzer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::SalientRegions)
    }

    fn analyze(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let current_hash: [u8; 32] = Sha256::digest(frame.pixels()).into();

        let changed = match self.last_hash {
            Some(prev) => prev != current_hash,
            None => false,
        };
        self.last_hash = Some(current_hash);

        let mut detections = vec![RawDetection::salient_region(
            BoundingBox::FULL_FRAME,
            NO_IDENTITY,
        )];
        if changed {
            let mut id_bytes = [0u8; 8];
            id_bytes.copy_from_slice(&current_hash[..8]);
            let identity = u64::from_le_bytes(id_bytes).max(1);
            detections.push(RawDetection::salient_region(
                BoundingBox::new(0.25, 0.25, 0.5, 0.5),
                identity,
            ));
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::junk::is_junk;
    use crate::frame::{SensorSample, Timestamp};

    fn frame(pixels: &[u8]) -> Frame {
        SensorSample::new(Timestamp::ZERO, 2, 2, pixels.to_vec())
            .acquire()
            .expect("frame")
    }

    #[test]
    fn stub_analyzer_reports_scene_changes() -> Result<()> {
        let mut analyzer = StubAnalyzer::new();

        // First frame: nothing to compare against, only the fallback region.
        let r1 = analyzer.analyze(&frame(b"frame1"))?;
        assert_eq!(r1.len(), 1);
        assert!(is_junk(&r1[0]));

        // Different content: an identified region appears.
        let r2 = analyzer.analyze(&frame(b"frame2"))?;
        assert_eq!(r2.len(), 2);
        assert!(!is_junk(&r2[1]));

        // Same content again: back to the fallback only.
        let r3 = analyzer.analyze(&frame(b"frame2"))?;
        assert_eq!(r3.len(), 1);
        Ok(())
    }
}
