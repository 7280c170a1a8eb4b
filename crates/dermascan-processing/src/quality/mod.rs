//! Image-quality assessment
//!
//! Scores one capture on three independent axes and folds them into a
//! [`QualityReport`]. A failing axis yields its sentinel value without
//! affecting the others; only undecodable input is an error.

pub mod brightness;
pub mod framing;
pub mod report;
pub mod sharpness;

use crate::image::decode;
use dermascan_core::{AppResult, QualityReport};
use image::{DynamicImage, GenericImageView};
use report::{composite_score, AxisOutcome, Findings};

/// Sentinel when sharpness cannot be evaluated.
pub const SHARPNESS_SENTINEL: f64 = 0.0;
/// Sentinel when brightness cannot be evaluated.
pub const BRIGHTNESS_SENTINEL: f64 = 50.0;
/// Value reported for an axis that was switched off.
pub const NEUTRAL_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityOptions {
    pub min_acceptable_score: u8,
    pub evaluate_sharpness: bool,
    pub evaluate_brightness: bool,
    pub evaluate_framing: bool,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            min_acceptable_score: 60,
            evaluate_sharpness: true,
            evaluate_brightness: true,
            evaluate_framing: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityAssessor {
    options: QualityOptions,
}

impl QualityAssessor {
    pub fn new(options: QualityOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &QualityOptions {
        &self.options
    }

    /// Decode and assess raw capture bytes.
    pub fn assess(&self, data: &[u8]) -> AppResult<QualityReport> {
        let img = decode(data)?;
        Ok(self.assess_image(&img))
    }

    /// Assess an already decoded image. Never fails.
    pub fn assess_image(&self, img: &DynamicImage) -> QualityReport {
        let opts = &self.options;

        let sharpness = if opts.evaluate_sharpness {
            sharpness::sharpness_score(img).map_or(AxisOutcome::Failed, AxisOutcome::Scored)
        } else {
            AxisOutcome::Skipped
        };

        let brightness = if opts.evaluate_brightness {
            brightness::mean_luminance(img)
                .map(brightness::brightness_score)
                .map_or(AxisOutcome::Failed, AxisOutcome::Scored)
        } else {
            AxisOutcome::Skipped
        };

        let angle = if opts.evaluate_framing {
            let (width, height) = img.dimensions();
            AxisOutcome::Scored(framing::framing_score(width, height))
        } else {
            AxisOutcome::Skipped
        };

        let mut findings = Findings::default();
        findings.sharpness(sharpness);
        findings.brightness(brightness);
        findings.framing(angle);

        let sharpness = axis_value(sharpness, SHARPNESS_SENTINEL);
        let brightness = axis_value(brightness, BRIGHTNESS_SENTINEL);
        let angle = axis_value(angle, framing::FALLBACK);

        let overall_score = composite_score(sharpness, brightness, angle);
        let is_good =
            overall_score >= opts.min_acceptable_score && findings.issues.is_empty();

        tracing::debug!(
            overall_score,
            sharpness,
            brightness,
            angle,
            issues = findings.issues.len(),
            is_good,
            "Capture quality assessed"
        );

        QualityReport {
            overall_score,
            sharpness,
            brightness,
            angle,
            issues: findings.issues,
            recommendations: findings.recommendations,
            is_good,
        }
    }
}

fn axis_value(outcome: AxisOutcome, sentinel: f64) -> f64 {
    match outcome {
        AxisOutcome::Scored(value) => value,
        AxisOutcome::Failed => sentinel,
        AxisOutcome::Skipped => NEUTRAL_SCORE,
    }
}
