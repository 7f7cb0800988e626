use crate::capture::input::types::InputEvent;
use crate::config::ImageFormat;
use serde::{Deserialize, Serialize};

/// One line of the session's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_id: u64,
    pub tick_number: u64,
    pub frame_number: u32,
    /// Wall-clock time the slot was issued (seconds since the UNIX epoch)
    pub abs_timestamp: f64,
    /// Slot time relative to session start
    pub timestamp: f64,
    /// Capture time of the attached frame, relative to session start
    pub frame_timestamp: f64,
    /// Input events in this frame's window, ending with a held snapshot
    pub inputs: Vec<InputEvent>,
    /// Image file name within the session directory
    pub image: String,
}

/// Fixed-width image file name for a frame id
pub fn frame_file_name(frame_id: u64, format: ImageFormat) -> String {
    format!("frame_{:06}.{}", frame_id, format.extension())
}
