//! Capture format detection.
//!
//! Captures arrive as opaque bytes with an optional reported MIME type. The
//! byte signature wins over the reported type; unknown inputs are stored as
//! JPEG.

use image::ImageFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Jpeg,
    Png,
    WebP,
}

impl CaptureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CaptureFormat::Jpeg => "jpg",
            CaptureFormat::Png => "png",
            CaptureFormat::WebP => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            CaptureFormat::Jpeg => "image/jpeg",
            CaptureFormat::Png => "image/png",
            CaptureFormat::WebP => "image/webp",
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(CaptureFormat::Jpeg),
            "image/png" => Some(CaptureFormat::Png),
            "image/webp" => Some(CaptureFormat::WebP),
            _ => None,
        }
    }
}

/// Detect the storage format of a capture.
pub fn detect_format(data: &[u8], reported_content_type: Option<&str>) -> CaptureFormat {
    let sniffed = match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => Some(CaptureFormat::Jpeg),
        Ok(ImageFormat::Png) => Some(CaptureFormat::Png),
        Ok(ImageFormat::WebP) => Some(CaptureFormat::WebP),
        _ => None,
    };

    sniffed
        .or_else(|| reported_content_type.and_then(CaptureFormat::from_content_type))
        .unwrap_or(CaptureFormat::Jpeg)
}
