use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResizeError {
    #[error("Failed to load image: {0}")]
    Decode(String),

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Resize task failed: {0}")]
    Join(String),

    #[error("Resize produced an empty file")]
    Empty,
}

impl From<std::io::Error> for ResizeError {
    fn from(error: std::io::Error) -> Self {
        ResizeError::Io(error.to_string())
    }
}

/// Produces a width-bound variant of an image file. Runs on the blocking
/// pool, so implementations may do synchronous I/O.
pub trait Resizer: Send + Sync {
    fn resize(&self, source: &Path, destination: &Path, width: u32) -> Result<(), ResizeError>;
}

/// Decodes any format the `image` crate knows, scales to the requested width
/// and writes a JPEG.
pub struct JpegResizer {
    quality: u8,
}

impl JpegResizer {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegResizer {
    fn default() -> Self {
        Self::new(85)
    }
}

impl Resizer for JpegResizer {
    fn resize(&self, source: &Path, destination: &Path, width: u32) -> Result<(), ResizeError> {
        let data = std::fs::read(source)?;
        let img = image::load_from_memory(&data).map_err(|e| ResizeError::Decode(e.to_string()))?;
        let resized = resize_to_width(img, width);
        let output = encode_jpeg(&resized, self.quality)?;
        std::fs::write(destination, output)?;
        Ok(())
    }
}

/// Scales down to `width`, keeping the aspect ratio. Never enlarges.
pub fn resize_to_width(img: DynamicImage, width: u32) -> DynamicImage {
    let (current_width, current_height) = img.dimensions();
    if current_width == 0 || width >= current_width {
        return img;
    }
    let aspect_ratio = current_height as f64 / current_width as f64;
    let height = ((width as f64 * aspect_ratio).round() as u32).max(1);
    img.resize_exact(width, height, FilterType::Lanczos3)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ResizeError> {
    let mut output = Vec::new();
    {
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
        // JPEG has no alpha channel
        encoder
            .encode_image(&img.to_rgb8())
            .map_err(|e| ResizeError::Encode(e.to_string()))?;
    }
    Ok(output)
}

/// Content type from the file signature, defaulting to JPEG like the
/// rasterizer output.
pub fn detect_image_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if data.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
        "image/gif"
    } else if data.starts_with(&[0x52, 0x49, 0x46, 0x46]) && data.get(8..12) == Some(&b"WEBP"[..]) {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
