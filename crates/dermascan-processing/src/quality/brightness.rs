//! Exposure score from mean luminance.

use super::sharpness::grayscale_grid;
use image::DynamicImage;

/// Mean `(r + g + b) / 3` at full resolution, or `None` for an empty image.
pub fn mean_luminance(img: &DynamicImage) -> Option<f64> {
    let gray = grayscale_grid(img);
    if gray.is_empty() {
        return None;
    }
    Some(gray.iter().sum::<f64>() / gray.len() as f64)
}

/// Piecewise-linear mapping of mean luminance `v` in `0..=255` to `0..=100`.
///
/// Dark captures are penalized steeply, the 150-200 band scores highest
/// before the overexposure ramp tops out at 100.
pub fn brightness_score(v: f64) -> f64 {
    let score = if v < 80.0 {
        (v / 80.0) * 40.0
    } else if v <= 150.0 {
        40.0 + ((v - 80.0) / 70.0) * 20.0
    } else if v <= 200.0 {
        60.0 + ((v - 150.0) / 50.0) * 20.0
    } else {
        80.0 + ((v - 200.0) / 55.0) * 20.0
    };
    score.clamp(0.0, 100.0)
}
