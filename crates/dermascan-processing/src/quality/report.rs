//! Composite score and user guidance.

pub const SHARPNESS_WEIGHT: f64 = 0.4;
pub const BRIGHTNESS_WEIGHT: f64 = 0.35;
pub const FRAMING_WEIGHT: f64 = 0.25;

/// `round(s * 0.4 + b * 0.35 + a * 0.25)` clamped to `0..=100`.
pub fn composite_score(sharpness: f64, brightness: f64, angle: f64) -> u8 {
    let weighted =
        sharpness * SHARPNESS_WEIGHT + brightness * BRIGHTNESS_WEIGHT + angle * FRAMING_WEIGHT;
    weighted.round().clamp(0.0, 100.0) as u8
}

/// Outcome of one axis before it is folded into the report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisOutcome {
    Scored(f64),
    /// The check ran but could not produce a value.
    Failed,
    /// The check was switched off.
    Skipped,
}

/// Issues block acceptance, recommendations are advisory.
#[derive(Debug, Default)]
pub struct Findings {
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Findings {
    fn issue(&mut self, issue: &str, recommendation: &str) {
        self.issues.push(issue.to_string());
        self.recommendations.push(recommendation.to_string());
    }

    fn recommend(&mut self, recommendation: &str) {
        self.recommendations.push(recommendation.to_string());
    }

    pub fn sharpness(&mut self, outcome: AxisOutcome) {
        match outcome {
            AxisOutcome::Scored(s) if s < 50.0 => self.issue(
                "Image is blurry",
                "Hold the camera steady and tap to focus before capturing",
            ),
            AxisOutcome::Scored(s) if s < 70.0 => {
                self.recommend("Hold the camera a little steadier for a sharper photo")
            }
            AxisOutcome::Failed => self.issue(
                "Sharpness could not be evaluated",
                "Retake the photo at a higher resolution",
            ),
            _ => {}
        }
    }

    pub fn brightness(&mut self, outcome: AxisOutcome) {
        match outcome {
            AxisOutcome::Scored(b) if b < 40.0 => self.issue(
                "Image is too dark",
                "Move to a brighter place or face a window",
            ),
            AxisOutcome::Scored(b) if b < 60.0 => {
                self.recommend("Slightly more light would improve the photo")
            }
            AxisOutcome::Scored(b) if b > 90.0 => self.issue(
                "Image is overexposed",
                "Avoid direct sunlight and turn off the flash",
            ),
            AxisOutcome::Failed => self.issue(
                "Brightness could not be evaluated",
                "Retake the photo in even lighting",
            ),
            _ => {}
        }
    }

    pub fn framing(&mut self, outcome: AxisOutcome) {
        match outcome {
            AxisOutcome::Scored(a) if a < 60.0 => self.issue(
                "Face is not well framed",
                "Center your face inside the guide",
            ),
            AxisOutcome::Scored(a) if a < 80.0 => {
                self.recommend("Align your face with the guide for better framing")
            }
            _ => {}
        }
    }
}
