//! Capture configuration
//!
//! A plain serde value handed to each component at construction. Loading it
//! from files or the environment is left to the host application.

use crate::capture::window::CropBox;
use crate::recorder::channel::{RecordingError, RecordingResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Image container written for each captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Title fragment of the window to capture
    pub capture_window: String,
    /// Seconds per game tick
    pub tick_rate: f64,
    /// Frame slots sampled per tick
    pub frames_per_tick: u32,
    pub image_format: ImageFormat,
    pub crop_box: Option<CropBox>,
    pub session_tags: Vec<String>,
    pub notes: String,
    /// Decimal places kept on event timestamps and positions
    pub round_precision: u32,
    pub scroll_stop_timeout_secs: f64,
    pub scroll_poll_interval_ms: u64,
    /// Subtracted from a frame's timestamp before windowing input events
    pub frame_epsilon_secs: f64,
    /// Concurrent persistence workers
    pub max_workers: usize,
    pub save_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_window: "RuneLite".to_string(),
            tick_rate: 0.6,
            frames_per_tick: 3,
            image_format: ImageFormat::Jpg,
            crop_box: None,
            session_tags: Vec::new(),
            notes: String::new(),
            round_precision: 4,
            scroll_stop_timeout_secs: 0.15,
            scroll_poll_interval_ms: 10,
            frame_epsilon_secs: 0.001,
            max_workers: 8,
            save_dir: PathBuf::from("data/raw"),
        }
    }
}

impl CaptureConfig {
    /// Seconds between scheduled frame slots
    pub fn frame_interval(&self) -> f64 {
        self.tick_rate / self.frames_per_tick as f64
    }

    pub fn scroll_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_poll_interval_ms)
    }

    pub fn validate(&self) -> RecordingResult<()> {
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            return Err(RecordingError::ConfigurationError(format!(
                "tick_rate must be positive, got {}",
                self.tick_rate
            )));
        }
        if self.frames_per_tick == 0 {
            return Err(RecordingError::ConfigurationError(
                "frames_per_tick must be at least 1".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(RecordingError::ConfigurationError(
                "max_workers must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("scroll_stop_timeout_secs", self.scroll_stop_timeout_secs),
            ("frame_epsilon_secs", self.frame_epsilon_secs),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RecordingError::ConfigurationError(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.scroll_poll_interval_ms == 0 {
            return Err(RecordingError::ConfigurationError(
                "scroll_poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.round_precision > 9 {
            return Err(RecordingError::ConfigurationError(format!(
                "round_precision must be at most 9, got {}",
                self.round_precision
            )));
        }
        Ok(())
    }
}
