//! Diagnosis service and record persistence models
//!
//! Wire types use camelCase field names to match the diagnosis and record
//! services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capture::AngleLabel;

/// Status field carried by every collaborator response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Request sent to the diagnosis service.
///
/// The credential travels in the `Authorization` header, never in the body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest {
    pub asset_urls: Vec<String>,
    pub angle_labels: Vec<AngleLabel>,
    pub owner_id: String,
    #[serde(skip)]
    pub credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default)]
    pub analysis_payload: Option<Value>,
    #[serde(default)]
    pub mapping_payload: Option<Value>,
    #[serde(default)]
    pub nlg_payload: Option<Value>,
    #[serde(default)]
    pub review_needed: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Successful diagnosis. `result_id` may still be empty here; the
/// orchestrator rejects that before anything is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub result_id: String,
    pub analysis_payload: Value,
    pub mapping_payload: Value,
    pub nlg_payload: Value,
    pub review_needed: bool,
}

impl DiagnosisResult {
    /// Build from a success response. Missing payloads become `null`.
    pub fn from_response(response: DiagnosisResponse) -> Self {
        Self {
            result_id: response.result_id.unwrap_or_default(),
            analysis_payload: response.analysis_payload.unwrap_or(Value::Null),
            mapping_payload: response.mapping_payload.unwrap_or(Value::Null),
            nlg_payload: response.nlg_payload.unwrap_or(Value::Null),
            review_needed: response.review_needed.unwrap_or(false),
        }
    }

    pub fn has_result_id(&self) -> bool {
        !self.result_id.trim().is_empty()
    }

    /// Model confidence reported inside the analysis payload, if any.
    pub fn confidence(&self) -> Option<f64> {
        self.analysis_payload.get("confidence").and_then(Value::as_f64)
    }

    pub fn uncertainty(&self) -> Option<f64> {
        self.analysis_payload
            .get("uncertainty")
            .and_then(Value::as_f64)
    }
}

/// Request sent to the record service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecordRequest {
    pub owner_id: String,
    pub asset_urls: Vec<String>,
    pub angle_labels: Vec<AngleLabel>,
    pub result_id: String,
    pub analysis_payload: Value,
    pub mapping_payload: Value,
    pub nlg_payload: Value,
    pub confidence: Option<f64>,
    pub uncertainty: Option<f64>,
    pub review_needed: bool,
    #[serde(skip)]
    pub credential: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecordResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub saved_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of the persistence stage.
///
/// `derived_asset_urls[i]` is either the compact variant of original `i` or,
/// when deriving it failed, the original URL itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub saved_id: String,
    pub derived_asset_urls: Vec<String>,
    pub angle_labels: Vec<AngleLabel>,
}

/// Composite result of a full upload, analyze and save run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisFlowOutput {
    pub result_id: String,
    pub analysis_payload: Value,
    pub mapping_payload: Value,
    pub nlg_payload: Value,
    pub review_needed: bool,
    pub saved_id: String,
    pub asset_urls: Vec<String>,
    pub angle_labels: Vec<AngleLabel>,
}
