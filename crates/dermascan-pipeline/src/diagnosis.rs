//! Diagnosis invocation
//!
//! One network call to the external diagnosis service, wrapped in staged
//! progress milestones and exponential-backoff retry for transient failures.

use crate::ProgressFn;
use anyhow::Context;
use async_trait::async_trait;
use dermascan_core::{
    AppError, AppResult, DiagnosisRequest, DiagnosisResponse, DiagnosisResult, ResponseStatus,
    StageUpdate,
};
use std::time::Duration;
use thiserror::Error;

/// Errors of a single collaborator call, before retry classification.
#[derive(Debug, Error)]
pub enum ServiceCallError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceCallError {
    /// Network failures, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceCallError::Transport(_) => true,
            ServiceCallError::Http { status, .. } => *status >= 500 || *status == 429,
            ServiceCallError::Rejected(_) | ServiceCallError::InvalidResponse(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceCallError::InvalidResponse(err.to_string())
        } else {
            ServiceCallError::Transport(err.to_string())
        }
    }

    /// Classify a non-success HTTP answer. A 4xx body carrying an `error`
    /// message is a rejection.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if (400..500).contains(&status) && status != 429 {
            if let Some(message) = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            {
                return ServiceCallError::Rejected(message);
            }
        }

        ServiceCallError::Http { status, body }
    }
}

#[async_trait]
pub trait DiagnosisService: Send + Sync {
    async fn diagnose(&self, request: &DiagnosisRequest)
        -> Result<DiagnosisResponse, ServiceCallError>;
}

/// Diagnosis service over HTTP: `POST {base_url}/diagnose` with a bearer credential.
pub struct HttpDiagnosisService {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpDiagnosisService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for diagnosis service")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DiagnosisService for HttpDiagnosisService {
    async fn diagnose(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<DiagnosisResponse, ServiceCallError> {
        let response = self
            .http_client
            .post(format!("{}/diagnose", self.base_url))
            .bearer_auth(&request.credential)
            .json(request)
            .send()
            .await
            .map_err(ServiceCallError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ServiceCallError::from_response(response).await);
        }

        response
            .json::<DiagnosisResponse>()
            .await
            .map_err(|e| ServiceCallError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `failed_attempt + 1`: `base * 2^(failed_attempt - 1)`.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2_u32.pow(exponent))
    }
}

/// Analysis milestones shown while the call is in flight: (start percent, message).
const MILESTONES: [(f64, &str); 3] = [
    (0.0, "Analyzing skin texture"),
    (33.0, "Analyzing pigmentation"),
    (66.0, "Checking for lesions"),
];

pub struct DiagnosisInvoker {
    service: std::sync::Arc<dyn DiagnosisService>,
    retry: RetryPolicy,
    stage_pacing: Duration,
}

impl DiagnosisInvoker {
    pub fn new(
        service: std::sync::Arc<dyn DiagnosisService>,
        retry: RetryPolicy,
        stage_pacing: Duration,
    ) -> Self {
        Self {
            service,
            retry,
            stage_pacing,
        }
    }

    /// Run the diagnosis. The returned `result_id` is not validated here.
    pub async fn invoke(
        &self,
        request: &DiagnosisRequest,
        progress: ProgressFn<'_>,
    ) -> AppResult<DiagnosisResult> {
        let call = self.call_with_retry(request, progress);
        tokio::pin!(call);

        let pacing = tokio::time::sleep(self.stage_pacing);
        tokio::pin!(pacing);

        let mut milestone = 0;
        progress(StageUpdate::progress(MILESTONES[0].0, MILESTONES[0].1));

        let outcome = loop {
            tokio::select! {
                outcome = &mut call => break outcome,
                _ = &mut pacing, if milestone + 1 < MILESTONES.len() => {
                    milestone += 1;
                    let (percent, message) = MILESTONES[milestone];
                    progress(StageUpdate::progress(percent, message));
                    pacing
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.stage_pacing);
                }
            }
        };

        let result = outcome?;
        progress(StageUpdate::progress(100.0, "Analysis complete"));

        tracing::info!(
            owner_id = %request.owner_id,
            result_id = %result.result_id,
            review_needed = result.review_needed,
            "Diagnosis received"
        );

        Ok(result)
    }

    async fn call_with_retry(
        &self,
        request: &DiagnosisRequest,
        progress: ProgressFn<'_>,
    ) -> AppResult<DiagnosisResult> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.service.diagnose(request).await {
                Ok(response) => return Self::into_result(response),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        owner_id = %request.owner_id,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Diagnosis call failed, retrying"
                    );
                    progress(StageUpdate::Retry {
                        attempt: attempt + 1,
                        max_attempts,
                        delay_ms: delay.as_millis() as u64,
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(
                        owner_id = %request.owner_id,
                        attempts = attempt,
                        error = %e,
                        "Diagnosis service unavailable"
                    );
                    return Err(AppError::TransientService {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(ServiceCallError::Rejected(message)) => {
                    return Err(AppError::ServiceRejected(message))
                }
                Err(e) => return Err(AppError::ServiceRejected(e.to_string())),
            }
        }
    }

    fn into_result(response: DiagnosisResponse) -> AppResult<DiagnosisResult> {
        match response.status {
            ResponseStatus::Success => Ok(DiagnosisResult::from_response(response)),
            ResponseStatus::Error => Err(AppError::ServiceRejected(
                response
                    .error
                    .unwrap_or_else(|| "Diagnosis failed".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore_progress;
    use dermascan_core::AngleLabel;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn request() -> DiagnosisRequest {
        DiagnosisRequest {
            asset_urls: vec!["http://cdn.test/u1/original/front.jpg".to_string()],
            angle_labels: vec![AngleLabel::Front],
            owner_id: "u1".to_string(),
            credential: "token-1".to_string(),
            profile: None,
            meta: None,
        }
    }

    fn success(result_id: &str) -> DiagnosisResponse {
        serde_json::from_value(json!({ "status": "success", "resultId": result_id })).unwrap()
    }

    /// Replays scripted outcomes and counts calls.
    struct ScriptedService {
        outcomes: Mutex<VecDeque<Result<DiagnosisResponse, ServiceCallError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedService {
        fn new(outcomes: Vec<Result<DiagnosisResponse, ServiceCallError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DiagnosisService for ScriptedService {
        async fn diagnose(
            &self,
            _request: &DiagnosisRequest,
        ) -> Result<DiagnosisResponse, ServiceCallError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ServiceCallError::Transport("script exhausted".into())))
        }
    }

    fn invoker(service: Arc<ScriptedService>) -> DiagnosisInvoker {
        DiagnosisInvoker::new(
            service,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
            Duration::from_millis(1),
        )
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn transient_classification() {
        assert!(ServiceCallError::Transport("reset".into()).is_transient());
        assert!(ServiceCallError::Http {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(ServiceCallError::Http {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!ServiceCallError::Http {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!ServiceCallError::Rejected("no".into()).is_transient());
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let service = ScriptedService::new(vec![
            Err(ServiceCallError::Transport("timeout".into())),
            Err(ServiceCallError::Http {
                status: 502,
                body: "bad gateway".into(),
            }),
            Ok(success("r1")),
        ]);
        let updates = Mutex::new(Vec::new());
        let record = |u: StageUpdate| updates.lock().unwrap().push(u);

        let result = invoker(service.clone())
            .invoke(&request(), &record)
            .await
            .unwrap();

        assert_eq!(result.result_id, "r1");
        assert_eq!(service.calls(), 3);

        let updates = updates.into_inner().unwrap();
        let retries: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                StageUpdate::Retry {
                    attempt,
                    max_attempts,
                    delay_ms,
                } => Some((*attempt, *max_attempts, *delay_ms)),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![(2, 3, 1), (3, 3, 2)]);
        assert_eq!(updates.first(), Some(&StageUpdate::progress(0.0, "Analyzing skin texture")));
        assert_eq!(
            updates.last(),
            Some(&StageUpdate::progress(100.0, "Analysis complete"))
        );
    }

    #[tokio::test]
    async fn gives_up_after_ceiling() {
        let service = ScriptedService::new(vec![]);
        let result = invoker(service.clone())
            .invoke(&request(), &ignore_progress)
            .await;

        assert!(matches!(
            result,
            Err(AppError::TransientService { attempts: 3, .. })
        ));
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn error_status_is_not_retried() {
        let rejected: DiagnosisResponse =
            serde_json::from_value(json!({ "status": "error", "error": "image unreadable" }))
                .unwrap();
        let service = ScriptedService::new(vec![Ok(rejected)]);

        let result = invoker(service.clone())
            .invoke(&request(), &ignore_progress)
            .await;

        match result {
            Err(AppError::ServiceRejected(message)) => assert_eq!(message, "image unreadable"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn milestones_advance_while_call_is_in_flight() {
        struct SlowService;

        #[async_trait]
        impl DiagnosisService for SlowService {
            async fn diagnose(
                &self,
                _request: &DiagnosisRequest,
            ) -> Result<DiagnosisResponse, ServiceCallError> {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(success("slow"))
            }
        }

        let invoker = DiagnosisInvoker::new(
            Arc::new(SlowService),
            RetryPolicy::default(),
            Duration::from_millis(10),
        );
        let updates = Mutex::new(Vec::new());
        let record = |u: StageUpdate| updates.lock().unwrap().push(u);

        invoker.invoke(&request(), &record).await.unwrap();

        let percents: Vec<f64> = updates
            .into_inner()
            .unwrap()
            .into_iter()
            .filter_map(|u| match u {
                StageUpdate::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0.0, 33.0, 66.0, 100.0]);
    }

    #[tokio::test]
    async fn http_service_sends_bearer_and_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/diagnose")
            .match_header("authorization", "Bearer token-1")
            .match_body(mockito::Matcher::PartialJson(json!({
                "assetUrls": ["http://cdn.test/u1/original/front.jpg"],
                "angleLabels": ["front"],
                "ownerId": "u1"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": "success",
                    "resultId": "r-42",
                    "analysisPayload": { "confidence": 0.9 },
                    "reviewNeeded": false
                })
                .to_string(),
            )
            .create_async()
            .await;

        let service = HttpDiagnosisService::new(server.url(), Duration::from_secs(5)).unwrap();
        let response = service.diagnose(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.result_id.as_deref(), Some("r-42"));
    }

    #[tokio::test]
    async fn http_service_classifies_failures() {
        let mut server = mockito::Server::new_async().await;
        let _unavailable = server
            .mock("POST", "/diagnose")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let service = HttpDiagnosisService::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = service.diagnose(&request()).await.unwrap_err();
        assert!(err.is_transient());

        server.reset();
        let _bad_request = server
            .mock("POST", "/diagnose")
            .with_status(422)
            .with_body(json!({ "status": "error", "error": "too few images" }).to_string())
            .create_async()
            .await;

        let err = service.diagnose(&request()).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "too few images");
    }
}
