use super::raw::{DetectionPayload, RawDetection, NO_IDENTITY};

/// True when a detection is a sensor artifact rather than a real entity.
///
/// Frame classifiers emit a whole-frame salient region with no identity when they have
/// nothing better to report. Only salient regions can be junk.
pub fn is_junk(detection: &RawDetection) -> bool {
    match detection.payload {
        DetectionPayload::SalientRegion { identity } => {
            detection.bounds.is_full_frame() || identity == NO_IDENTITY
        }
        _ => false,
    }
}
