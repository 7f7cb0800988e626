//! Frame image encoding

use crate::capture::frame::CapturedFrame;
use crate::config::ImageFormat;
use crate::recorder::channel::{RecordingError, RecordingResult};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder as _};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one frame to an image file
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, frame: &CapturedFrame, format: ImageFormat, path: &Path) -> RecordingResult<()>;
}

/// Encoder backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateEncoder {
    pub jpeg_quality: u8,
}

impl Default for ImageCrateEncoder {
    fn default() -> Self {
        Self { jpeg_quality: 95 }
    }
}

impl ImageEncoder for ImageCrateEncoder {
    fn encode(&self, frame: &CapturedFrame, format: ImageFormat, path: &Path) -> RecordingResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        let result = match format {
            ImageFormat::Jpg => JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
                .write_image(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8),
            ImageFormat::Png => PngEncoder::new(&mut writer).write_image(
                &frame.data,
                frame.width,
                frame.height,
                ExtendedColorType::Rgb8,
            ),
        };
        result.map_err(|e| {
            RecordingError::EncodingError(format!("{}: {}", path.display(), e))
        })?;
        writer.flush()?;
        Ok(())
    }
}
