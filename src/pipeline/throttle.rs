use std::time::Duration;

use crate::frame::{DisplayFrame, Frame, Timestamp};

/// 50 display updates per second.
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(20);

/// Bounds how often a sensor frame is promoted to a `DisplayFrame`.
///
/// Frames captured before the deadline are dropped outright, never queued. Time is the
/// frame's capture timestamp, so the bound holds whatever the delivery jitter.
#[derive(Debug)]
pub struct RenderThrottle {
    interval: Duration,
    next_deadline: Timestamp,
}

impl RenderThrottle {
    /// Deadline starts at session start, so the first frame always renders.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: Timestamp::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_deadline(&self) -> Timestamp {
        self.next_deadline
    }

    pub fn maybe_render(&mut self, frame: &Frame) -> Option<DisplayFrame> {
        if frame.captured_at < self.next_deadline {
            return None;
        }
        self.next_deadline = frame.captured_at.saturating_add(self.interval);
        Some(frame.to_display())
    }
}

impl Default for RenderThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_INTERVAL)
    }
}
