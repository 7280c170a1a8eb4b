//! Flow progress and event types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStage {
    Upload,
    Analyze,
    Save,
    Complete,
    Retry,
}

/// Snapshot of a running flow. Owned by one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowProgress {
    pub stage: FlowStage,
    pub percent: u8,
    pub message: String,
    pub estimated_seconds_remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// Update emitted by a single stage component.
///
/// `percent` is local to the stage (0-100); the orchestrator projects it
/// onto the overall band of that stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate {
    Progress { percent: f64, message: String },
    Retry {
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
    },
}

impl StageUpdate {
    pub fn progress(percent: f64, message: impl Into<String>) -> Self {
        StageUpdate::Progress {
            percent,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FlowTerminal {
    Completed { saved_id: String },
    Failed { error_code: String, message: String },
}

/// Event stream of one flow invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlowEvent {
    Progress(FlowProgress),
    Retry {
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
    },
    Terminal { outcome: FlowTerminal },
}
