//! Frame source seam and the latest-frame slot
//!
//! Capture backends publish each arriving frame into a `LatestFrameSlot`; the
//! synchronizer only ever reads the most recent one.

use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frame data from a capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Packed RGB8 pixel data
    pub data: Vec<u8>,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,
}

impl CapturedFrame {
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    /// Convert a BGRA buffer (rows may carry padding) into packed RGB.
    pub fn from_bgra(raw: &[u8], width: u32, height: u32, bytes_per_row: u32) -> Option<Self> {
        let (w, h, stride) = (width as usize, height as usize, bytes_per_row as usize);
        if stride < w * 4 || raw.len() < stride * h {
            return None;
        }

        let mut data = Vec::with_capacity(w * h * 3);
        for row in raw.chunks(stride).take(h) {
            for px in row[..w * 4].chunks_exact(4) {
                data.extend_from_slice(&[px[2], px[1], px[0]]);
            }
        }
        Some(Self {
            data,
            width,
            height,
        })
    }
}

/// A frame plus its capture timestamp (seconds since the UNIX epoch)
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub frame: Arc<CapturedFrame>,
    pub timestamp: f64,
}

/// External producer of screen frames.
///
/// Pollable with no freshness guarantee; `None` means nothing has arrived yet.
pub trait FrameSource: Send + Sync {
    fn latest_frame(&self) -> Option<TimedFrame>;

    fn frame_count(&self) -> u64;
}

/// Lock-guarded slot holding the most recently published frame
#[derive(Debug, Default)]
pub struct LatestFrameSlot {
    latest: ParkingMutex<Option<TimedFrame>>,
    frame_count: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called from the capture backend's frame-arrival callback.
    pub fn publish(&self, frame: CapturedFrame, timestamp: f64) {
        *self.latest.lock() = Some(TimedFrame {
            frame: Arc::new(frame),
            timestamp,
        });
        let count = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % 600 == 0 {
            tracing::debug!("Frame slot received {} frames", count);
        }
    }
}

impl FrameSource for LatestFrameSlot {
    fn latest_frame(&self) -> Option<TimedFrame> {
        self.latest.lock().clone()
    }

    fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_conversion_skips_padding() {
        // 2x1 image, 12 bytes per row (4 bytes of padding)
        let raw = [1, 2, 3, 255, 4, 5, 6, 255, 0, 0, 0, 0];
        let frame = CapturedFrame::from_bgra(&raw, 2, 1, 12).expect("frame");
        assert_eq!(frame.data, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_bgra_rejects_short_buffer() {
        assert!(CapturedFrame::from_bgra(&[0; 7], 2, 1, 8).is_none());
    }

    #[test]
    fn test_slot_keeps_latest() {
        let slot = LatestFrameSlot::new();
        assert!(slot.latest_frame().is_none());
        assert_eq!(slot.frame_count(), 0);

        slot.publish(CapturedFrame::from_rgb(vec![0; 3], 1, 1).unwrap(), 10.0);
        slot.publish(CapturedFrame::from_rgb(vec![9; 3], 1, 1).unwrap(), 10.5);

        let latest = slot.latest_frame().expect("latest");
        assert_eq!(latest.timestamp, 10.5);
        assert_eq!(latest.frame.data, vec![9; 3]);
        assert_eq!(slot.frame_count(), 2);
    }
}
