//! Framing proxy from the aspect ratio.
//!
//! This is not pose estimation: near-square captures are assumed to hold a
//! centered face.

const WELL_FRAMED: f64 = 80.0;
const OFF_FRAME: f64 = 60.0;
/// Score when the ratio cannot be computed.
pub const FALLBACK: f64 = 75.0;

pub fn framing_score(width: u32, height: u32) -> f64 {
    if width == 0 || height == 0 {
        return FALLBACK;
    }
    let ratio = width as f64 / height as f64;
    if !ratio.is_finite() {
        return FALLBACK;
    }
    if (0.7..=1.3).contains(&ratio) {
        WELL_FRAMED
    } else {
        OFF_FRAME
    }
}
