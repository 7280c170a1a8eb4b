//! Recording doubles for the session, diagnosis and record collaborators

use async_trait::async_trait;
use dermascan_core::{
    AngleLabel, AppResult, CaptureAsset, DiagnosisRequest, DiagnosisResponse, ResponseStatus,
    SaveRecordRequest, SaveRecordResponse, UploadBatch,
};
use dermascan_pipeline::{
    AssetTransfer, AssetTransferGateway, DiagnosisService, ProgressFn, RecordStore,
    ServiceCallError, Session, SessionProvider,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Session provider that counts lookups.
pub struct CountingSessionProvider {
    session: Option<Session>,
    calls: AtomicUsize,
}

impl CountingSessionProvider {
    pub fn signed_in(owner_id: &str, token: &str) -> Self {
        Self {
            session: Some(Session::new(owner_id, token)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            session: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for CountingSessionProvider {
    async fn current_session(&self) -> AppResult<Option<Session>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.session.clone())
    }
}

/// Real gateway whose batch loses every result past `keep`.
pub struct TruncatingTransfer {
    inner: AssetTransferGateway,
    keep: usize,
}

impl TruncatingTransfer {
    pub fn new(inner: AssetTransferGateway, keep: usize) -> Self {
        Self { inner, keep }
    }
}

#[async_trait]
impl AssetTransfer for TruncatingTransfer {
    async fn upload(
        &self,
        session: &Session,
        assets: &[CaptureAsset],
        angle_labels: &[AngleLabel],
        progress: ProgressFn<'_>,
    ) -> AppResult<UploadBatch> {
        let mut batch = self
            .inner
            .upload(session, assets, angle_labels, progress)
            .await?;
        batch.results.truncate(self.keep);
        Ok(batch)
    }
}

/// One scripted answer of the diagnosis double.
#[derive(Clone)]
pub enum DiagnosisReply {
    Success { result_id: String },
    ErrorStatus(String),
    HttpStatus(u16),
}

impl DiagnosisReply {
    fn into_result(self) -> Result<DiagnosisResponse, ServiceCallError> {
        match self {
            DiagnosisReply::Success { result_id } => Ok(DiagnosisResponse {
                status: ResponseStatus::Success,
                result_id: Some(result_id),
                analysis_payload: Some(json!({ "confidence": 0.91, "uncertainty": 0.05 })),
                mapping_payload: Some(json!({ "regions": [] })),
                nlg_payload: Some(json!({ "summary": "No concerns found" })),
                review_needed: Some(false),
                error: None,
            }),
            DiagnosisReply::ErrorStatus(message) => Ok(DiagnosisResponse {
                status: ResponseStatus::Error,
                result_id: None,
                analysis_payload: None,
                mapping_payload: None,
                nlg_payload: None,
                review_needed: None,
                error: Some(message),
            }),
            DiagnosisReply::HttpStatus(status) => Err(ServiceCallError::Http {
                status,
                body: "unavailable".to_string(),
            }),
        }
    }
}

/// Diagnosis double: plays scripted replies, then repeats the fallback.
pub struct MockDiagnosisService {
    script: Mutex<VecDeque<DiagnosisReply>>,
    fallback: DiagnosisReply,
    delay: Duration,
    requests: Mutex<Vec<DiagnosisRequest>>,
}

impl MockDiagnosisService {
    pub fn succeeding(result_id: &str) -> Self {
        Self::with_fallback(DiagnosisReply::Success {
            result_id: result_id.to_string(),
        })
    }

    pub fn with_fallback(fallback: DiagnosisReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, reply: DiagnosisReply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    /// Hold every call for `delay` before answering.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<DiagnosisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosisService for MockDiagnosisService {
    async fn diagnose(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<DiagnosisResponse, ServiceCallError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        reply.into_result()
    }
}

/// Record double: answers with a fixed saved id or error message.
pub struct MockRecordStore {
    saved_id: Option<String>,
    requests: Mutex<Vec<SaveRecordRequest>>,
}

impl MockRecordStore {
    pub fn succeeding(saved_id: &str) -> Self {
        Self {
            saved_id: Some(saved_id.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            saved_id: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<SaveRecordRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn save(
        &self,
        request: &SaveRecordRequest,
    ) -> Result<SaveRecordResponse, ServiceCallError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(match self.saved_id {
            Some(ref saved_id) => SaveRecordResponse {
                status: ResponseStatus::Success,
                saved_id: Some(saved_id.clone()),
                error: None,
            },
            None => SaveRecordResponse {
                status: ResponseStatus::Error,
                saved_id: None,
                error: Some("record store unavailable".to_string()),
            },
        })
    }
}
