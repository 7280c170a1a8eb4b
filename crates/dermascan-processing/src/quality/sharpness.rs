//! Laplacian focus measure.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Longest side the focus measure runs at.
pub const MAX_ANALYSIS_SIDE: u32 = 512;

/// Mean absolute response that maps to a full score.
const FULL_SCALE_RESPONSE: f64 = 100.0;

/// Sharpness score in `0..=100`, or `None` when the image has no interior
/// pixels to filter.
pub fn sharpness_score(img: &DynamicImage) -> Option<f64> {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return None;
    }

    let analysed = downscale_for_analysis(img);
    let (width, height) = analysed.dimensions();
    if width < 3 || height < 3 {
        return None;
    }

    let gray = grayscale_grid(&analysed);
    let response = mean_abs_laplacian(&gray, width as usize, height as usize);

    Some((response / FULL_SCALE_RESPONSE).clamp(0.0, 1.0) * 100.0)
}

fn downscale_for_analysis(img: &DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= MAX_ANALYSIS_SIDE && height <= MAX_ANALYSIS_SIDE {
        return img.clone();
    }

    let scale = f64::min(
        MAX_ANALYSIS_SIDE as f64 / width as f64,
        MAX_ANALYSIS_SIDE as f64 / height as f64,
    );
    let target_w = ((width as f64 * scale).round() as u32).max(1);
    let target_h = ((height as f64 * scale).round() as u32).max(1);

    img.resize_exact(target_w, target_h, FilterType::Triangle)
}

/// Row-major grid of `(r + g + b) / 3`.
pub(crate) fn grayscale_grid(img: &DynamicImage) -> Vec<f64> {
    img.to_rgb8()
        .pixels()
        .map(|p| (p[0] as f64 + p[1] as f64 + p[2] as f64) / 3.0)
        .collect()
}

/// Kernel `[[0,-1,0],[-1,4,-1],[0,-1,0]]` over interior pixels only.
fn mean_abs_laplacian(gray: &[f64], width: usize, height: usize) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let idx = y * width + x;
            let response = 4.0 * gray[idx]
                - gray[idx - 1]
                - gray[idx + 1]
                - gray[idx - width]
                - gray[idx + width];
            sum += response.abs();
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
