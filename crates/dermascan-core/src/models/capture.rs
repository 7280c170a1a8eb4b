//! Capture and upload models

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Viewing angle of a capture, assigned positionally by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleLabel {
    Front,
    Left,
    Right,
}

impl AngleLabel {
    /// Labels in capture order.
    pub const POSITIONAL: [AngleLabel; 3] = [AngleLabel::Front, AngleLabel::Left, AngleLabel::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            AngleLabel::Front => "front",
            AngleLabel::Left => "left",
            AngleLabel::Right => "right",
        }
    }
}

impl Display for AngleLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for AngleLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "front" => Ok(AngleLabel::Front),
            "left" => Ok(AngleLabel::Left),
            "right" => Ok(AngleLabel::Right),
            _ => Err(anyhow::anyhow!("Invalid angle label: {}", s)),
        }
    }
}

/// Raw capture handed over by the caller, before labeling.
#[derive(Clone, Debug)]
pub struct RawCapture {
    pub data: Vec<u8>,
    /// MIME type reported by the capture source, if any.
    pub content_type: Option<String>,
}

impl RawCapture {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            content_type: None,
        }
    }

    pub fn with_content_type(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: Some(content_type.into()),
        }
    }
}

/// Labeled capture bound to its owner, consumed once by the transfer gateway.
#[derive(Clone, Debug)]
pub struct CaptureAsset {
    pub data: Vec<u8>,
    pub angle_label: AngleLabel,
    pub owner_id: String,
    pub extension: String,
    pub content_type: String,
}

/// Result of transferring one capture to durable storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub public_url: String,
    pub storage_path: String,
    pub owner_id: String,
    pub angle_label: AngleLabel,
}

/// Ordered transfer results, one per input capture.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBatch {
    pub owner_id: String,
    pub results: Vec<UploadedAsset>,
}

impl UploadBatch {
    pub fn urls(&self) -> Vec<String> {
        self.results.iter().map(|r| r.public_url.clone()).collect()
    }
}
