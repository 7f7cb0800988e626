//! Capture target resolution
//!
//! Finds the target window through a platform `WindowLocator` and applies the
//! configured crop box to get the region input positions are normalized to.

use crate::recorder::channel::{RecordingError, RecordingResult};
use serde::{Deserialize, Serialize};

/// Window rectangle in global screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowBounds {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Crop region relative to the window's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CropBox {
    pub fn apply(&self, window: WindowBounds) -> RecordingResult<WindowBounds> {
        let invalid = || RecordingError::InvalidCropBox {
            left: self.left,
            top: self.top,
            right: self.right,
            bottom: self.bottom,
        };
        if self.right <= self.left || self.bottom <= self.top {
            return Err(invalid());
        }
        let width = self.right.checked_sub(self.left).ok_or_else(invalid)?;
        let height = self.bottom.checked_sub(self.top).ok_or_else(invalid)?;
        Ok(WindowBounds {
            x: window.x.checked_add(self.left).ok_or_else(invalid)?,
            y: window.y.checked_add(self.top).ok_or_else(invalid)?,
            width: width as u32,
            height: height as u32,
        })
    }
}

/// Platform lookup of a visible window by title fragment
pub trait WindowLocator: Send + Sync {
    fn find_window(&self, title: &str) -> Option<WindowBounds>;
}

/// Locator that always reports the same bounds, for headless use.
#[derive(Debug, Clone, Copy)]
pub struct FixedWindow(pub WindowBounds);

impl WindowLocator for FixedWindow {
    fn find_window(&self, _title: &str) -> Option<WindowBounds> {
        Some(self.0)
    }
}

/// Resolve the capture region for `title`, cropped if `crop` is set.
pub fn resolve_capture_region(
    locator: &dyn WindowLocator,
    title: &str,
    crop: Option<CropBox>,
) -> RecordingResult<WindowBounds> {
    let window = locator
        .find_window(title)
        .ok_or_else(|| RecordingError::WindowNotFound(title.to_string()))?;

    let region = match crop {
        Some(crop) => crop.apply(window)?,
        None => window,
    };

    if region.width == 0 || region.height == 0 {
        return Err(RecordingError::ConfigurationError(format!(
            "Capture region for \"{}\" is empty ({}x{})",
            title, region.width, region.height
        )));
    }

    tracing::info!(
        "Capture region for \"{}\": {}x{} at ({}, {})",
        title,
        region.width,
        region.height,
        region.x,
        region.y
    );
    Ok(region)
}
