//! Image decoding helpers.
//!
//! Everything is converted to plain RGB pixels on load, which also drops
//! EXIF and other embedded metadata.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageReader};

use crate::error::FeatureError;

/// File extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "heic"];

/// Decode an in-memory image (format sniffed from content) into RGB.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, FeatureError> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Load an image from disk into RGB.
///
/// The format is sniffed from content, so temp files without a meaningful
/// extension decode fine.
pub fn load_image(path: &Path) -> Result<DynamicImage, FeatureError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Whether a path has a known image extension (case-insensitive).
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
