use serde::{Deserialize, Serialize};

/// Technical quality of one capture. Ephemeral, never persisted.
///
/// All scores are in `0..=100`. `issues` block acceptance, `recommendations`
/// are advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub overall_score: u8,
    pub sharpness: f64,
    pub brightness: f64,
    pub angle: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub is_good: bool,
}
