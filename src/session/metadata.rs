use crate::capture::window::{CropBox, WindowBounds};
use crate::clock::round_to;
use crate::config::{CaptureConfig, ImageFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session description written once, at session start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: Uuid,
    pub capture_window: String,
    pub tick_rate: f64,
    pub frames_per_tick: u32,
    pub frame_interval: f64,
    pub resolution: (u32, u32),
    pub aspect_ratio: f64,
    pub capture_region: WindowBounds,
    pub crop_box: Option<CropBox>,
    pub tags: Vec<String>,
    pub notes: String,
    pub image_format: ImageFormat,
    pub round_precision: u32,
    pub started_at: DateTime<Utc>,
}

impl SessionMetadata {
    pub fn new(config: &CaptureConfig, region: WindowBounds) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            capture_window: config.capture_window.clone(),
            tick_rate: config.tick_rate,
            frames_per_tick: config.frames_per_tick,
            frame_interval: config.frame_interval(),
            resolution: (region.width, region.height),
            aspect_ratio: round_to(region.aspect_ratio(), 4),
            capture_region: region,
            crop_box: config.crop_box,
            tags: config.session_tags.clone(),
            notes: config.notes.clone(),
            image_format: config.image_format,
            round_precision: config.round_precision,
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_config() {
        let config = CaptureConfig {
            session_tags: vec!["woodcutting".to_string()],
            notes: "first run".to_string(),
            ..Default::default()
        };
        let region = WindowBounds {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
        };
        let meta = SessionMetadata::new(&config, region);

        assert_eq!(meta.resolution, (1280, 720));
        assert_eq!(meta.aspect_ratio, 1.7778);
        assert_eq!(meta.tags, vec!["woodcutting"]);
        assert!((meta.frame_interval - 0.2).abs() < 1e-12);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["image_format"], "jpg");
        assert!(json["started_at"].is_string());
    }
}
