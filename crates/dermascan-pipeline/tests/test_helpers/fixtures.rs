//! Capture fixtures

use dermascan_core::RawCapture;
use image::{ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;

/// Checkerboard PNG with enough texture and mid-range brightness.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgb([200u8, 170, 150])
        } else {
            Rgb([60u8, 40, 30])
        }
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn png_capture() -> RawCapture {
    RawCapture::with_content_type(create_test_png(64, 64), "image/png")
}

pub fn png_captures(count: usize) -> Vec<RawCapture> {
    (0..count).map(|_| png_capture()).collect()
}
