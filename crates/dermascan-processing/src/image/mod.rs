//! Image decoding, format detection and the upload transform.

pub mod format;
pub mod transformer;

pub use format::{detect_format, CaptureFormat};
pub use transformer::{prepare_for_upload, CompressOptions, PreparedImage};

use dermascan_core::{AppError, AppResult};
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Decode raw bytes, guessing the format from content.
pub fn decode(data: &[u8]) -> AppResult<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| AppError::Decode(e.to_string()))?;
    reader.decode().map_err(|e| AppError::Decode(e.to_string()))
}
