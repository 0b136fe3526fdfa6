//! Frame ownership layer.
//!
//! - `SensorSample`: what the frame source hands over each tick. Its pixel buffer may be
//!   unavailable; acquiring it is the first thing the pipeline does.
//! - `Frame`: an acquired sample. Owned by the pipeline for exactly one tick. Pixels are
//!   zeroized when the frame is dropped.
//! - `DisplayFrame`: a frame promoted for UI presentation. Immutable and shared; a newer
//!   display frame replaces an older one wholesale.

use anyhow::{anyhow, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroize;

// ----------------------------------------------------------------------------
// Timestamp: monotonic capture time
// ----------------------------------------------------------------------------

/// Monotonic capture time, measured from the start of the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn from_duration(since_start: Duration) -> Self {
        Self(since_start)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_millis(self) -> u128 {
        self.0.as_millis()
    }

    pub fn saturating_add(self, interval: Duration) -> Self {
        Self(self.0.saturating_add(interval))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ms", self.0.as_secs_f64() * 1000.0)
    }
}

// ----------------------------------------------------------------------------
// SensorSample: frame as delivered by the source
// ----------------------------------------------------------------------------

/// One sensor tick as delivered by a `FrameSource`.
///
/// The pixel buffer is only reachable through `acquire`, which fails when the source
/// could not lock a buffer for this tick.
pub struct SensorSample {
    captured_at: Timestamp,
    width: u32,
    height: u32,
    buffer: SampleBuffer,
}

enum SampleBuffer {
    Ready(Vec<u8>),
    Unavailable(String),
}

impl SensorSample {
    pub fn new(captured_at: Timestamp, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            captured_at,
            width,
            height,
            buffer: SampleBuffer::Ready(pixels),
        }
    }

    /// A tick whose image buffer could not be obtained.
    pub fn unavailable(captured_at: Timestamp, reason: impl Into<String>) -> Self {
        Self {
            captured_at,
            width: 0,
            height: 0,
            buffer: SampleBuffer::Unavailable(reason.into()),
        }
    }

    pub fn captured_at(&self) -> Timestamp {
        self.captured_at
    }

    /// Take ownership of the pixel buffer for one processing tick.
    pub fn acquire(self) -> Result<Frame> {
        match self.buffer {
            SampleBuffer::Ready(pixels) if pixels.is_empty() => Err(anyhow!(
                "frame buffer at {} is empty",
                self.captured_at
            )),
            SampleBuffer::Ready(pixels) => Ok(Frame {
                pixels,
                width: self.width,
                height: self.height,
                captured_at: self.captured_at,
            }),
            SampleBuffer::Unavailable(reason) => Err(anyhow!(
                "frame buffer at {} unavailable: {}",
                self.captured_at,
                reason
            )),
        }
    }
}

// ----------------------------------------------------------------------------
// Frame: exclusively owned for one tick
// ----------------------------------------------------------------------------

/// An acquired frame. Not `Clone`; the only way to keep pixels past the tick is
/// `to_display`.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Timestamp,
}

impl Frame {
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Promote this frame to a UI-presentable artifact. Copies the pixels once.
    pub fn to_display(&self) -> DisplayFrame {
        DisplayFrame {
            image: Arc::from(self.pixels.as_slice()),
            width: self.width,
            height: self.height,
            captured_at: self.captured_at,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.pixels.zeroize();
    }
}

// ----------------------------------------------------------------------------
// DisplayFrame: shared with the UI consumer
// ----------------------------------------------------------------------------

/// Frame selected for presentation. Cloning shares the same image.
#[derive(Clone)]
pub struct DisplayFrame {
    image: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Timestamp,
}

impl DisplayFrame {
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// True when both handles share one image allocation.
    pub fn shares_image_with(&self, other: &DisplayFrame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl fmt::Debug for DisplayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_yields_frame_with_metadata() -> Result<()> {
        let sample = SensorSample::new(Timestamp::from_millis(40), 4, 2, vec![7u8; 24]);
        let frame = sample.acquire()?;
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.captured_at, Timestamp::from_millis(40));
        assert_eq!(frame.byte_len(), 24);
        Ok(())
    }

    #[test]
    fn unavailable_buffer_fails_acquire() {
        let sample = SensorSample::unavailable(Timestamp::from_millis(5), "buffer pool exhausted");
        let err = sample.acquire().unwrap_err();
        assert!(err.to_string().contains("buffer pool exhausted"));
    }

    #[test]
    fn empty_buffer_fails_acquire() {
        let sample = SensorSample::new(Timestamp::ZERO, 0, 0, Vec::new());
        assert!(sample.acquire().is_err());
    }

    #[test]
    fn display_frame_copies_pixels_and_clones_share() -> Result<()> {
        let frame = SensorSample::new(Timestamp::from_millis(1), 2, 1, vec![1, 2, 3, 4, 5, 6])
            .acquire()?;
        let display = frame.to_display();
        drop(frame);

        assert_eq!(display.image(), &[1, 2, 3, 4, 5, 6]);
        let shared = display.clone();
        assert!(shared.shares_image_with(&display));
        Ok(())
    }

    #[test]
    fn timestamp_arithmetic_saturates() {
        let a = Timestamp::from_millis(10);
        let b = Timestamp::from_millis(25);
        assert_eq!(b.saturating_since(a), Duration::from_millis(15));
        assert_eq!(a.saturating_since(b), Duration::ZERO);
        assert_eq!(a.saturating_add(Duration::from_millis(20)), Timestamp::from_millis(30));
    }
}
