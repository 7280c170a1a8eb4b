//! Upload transform
//!
//! Builds the compact JPEG variant of a capture: optional quality gate,
//! downscale to a maximum width, re-encode.

use super::decode;
use crate::quality::{QualityAssessor, QualityOptions};
use bytes::Bytes;
use dermascan_core::{AppError, AppResult};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";
pub const OUTPUT_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    pub max_width: u32,
    /// JPEG quality in `(0, 1]`.
    pub quality: f32,
    /// When set, captures that are not `is_good` under these options are rejected.
    pub quality_gate: Option<QualityOptions>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            quality: 0.85,
            quality_gate: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub fn content_type(&self) -> &'static str {
        OUTPUT_CONTENT_TYPE
    }

    pub fn extension(&self) -> &'static str {
        OUTPUT_EXTENSION
    }
}

/// Decode, gate, downscale (never upscale) and re-encode as JPEG.
pub fn prepare_for_upload(data: &[u8], options: &CompressOptions) -> AppResult<PreparedImage> {
    let img = decode(data)?;

    if let Some(gate) = options.quality_gate {
        let report = QualityAssessor::new(gate).assess_image(&img);
        if !report.is_good {
            let reason = if report.issues.is_empty() {
                format!(
                    "score {} below {}",
                    report.overall_score, gate.min_acceptable_score
                )
            } else {
                report.issues.join(", ")
            };
            return Err(AppError::QualityGate(reason));
        }
    }

    let resized = downscale_to_width(img, options.max_width);
    let (width, height) = resized.dimensions();

    let data = encode_jpeg(&resized, options.quality)?;

    tracing::debug!(
        width,
        height,
        size_bytes = data.len(),
        "Prepared capture for upload"
    );

    Ok(PreparedImage {
        data,
        width,
        height,
    })
}

fn downscale_to_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if max_width == 0 || width <= max_width {
        return img;
    }
    let target_height = ((height as f64 * max_width as f64 / width as f64).round() as u32).max(1);
    img.resize_exact(max_width, target_height, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: f32) -> AppResult<Bytes> {
    let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let rgb = img.to_rgb8();

    let mut buffer = Vec::with_capacity((rgb.width() * rgb.height()) as usize / 4);
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| AppError::Internal(format!("JPEG encoding failed: {}", e)))?;

    Ok(Bytes::from(buffer))
}
