//! Diagnosis flow orchestration
//!
//! Runs upload, analyze and save in strict sequence for one set of captures:
//!
//! ```text
//! Idle -> Uploading -> Analyzing (-> Retrying -> Analyzing) -> Saving -> Complete
//!              \______________\_____________________________\____-> Failed
//! ```
//!
//! Progress belongs to the [`FlowContext`] of one invocation. It is published
//! on a watch channel (`None` while idle or after a failure) and, when
//! requested, as a [`FlowEvent`] stream.

use crate::diagnosis::{DiagnosisInvoker, HttpDiagnosisService, RetryPolicy};
use crate::persister::{
    HttpAssetFetcher, HttpRecordStore, PersistInput, ResultPersister, StorageAssetFetcher,
};
use crate::session::{authenticated_session, SessionProvider};
use crate::transfer::{AssetTransfer, AssetTransferGateway};
use dermascan_core::{
    AngleLabel, AppError, AppResult, CaptureAsset, Config, DiagnosisFlowOutput, DiagnosisRequest,
    ErrorMetadata, FlowEvent, FlowProgress, FlowStage, FlowTerminal, LogLevel, RawCapture,
    StageUpdate,
};
use dermascan_processing::{detect_format, CompressOptions};
use dermascan_storage::Storage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Most captures a single diagnosis engages.
pub const MAX_CAPTURES: usize = 3;

/// Overall percent range of each stage.
const UPLOAD_BAND: (f64, f64) = (0.0, 25.0);
const ANALYZE_BAND: (f64, f64) = (25.0, 75.0);
const SAVE_BAND: (f64, f64) = (75.0, 100.0);

/// Positional angle labels for `count` captures.
///
/// 1 -> `[front]`, 2 -> `[front, left]`, 3 or more -> `[front, left, right]`.
/// The result always has `min(count, 3)` entries.
pub fn derive_angle_labels(count: usize) -> Vec<AngleLabel> {
    use AngleLabel::*;

    let mut labels = match count {
        1 => vec![Front],
        2 => vec![Front, Left],
        n if n >= 3 => vec![Front, Left, Right],
        // Not reachable for non-empty input
        _ => vec![Front; count],
    };

    labels.resize(count.min(MAX_CAPTURES), Front);
    labels
}

/// Static per-stage durations behind the remaining-time estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageEstimates {
    pub upload_secs_per_asset: f64,
    pub analyze_secs: f64,
    pub save_secs_per_asset: f64,
    pub save_fixed_secs: f64,
}

impl Default for StageEstimates {
    fn default() -> Self {
        Self {
            upload_secs_per_asset: 1.5,
            analyze_secs: 15.0,
            save_secs_per_asset: 2.0,
            save_fixed_secs: 2.0,
        }
    }
}

impl StageEstimates {
    pub fn total_secs(&self, asset_count: usize) -> f64 {
        let n = asset_count as f64;
        self.upload_secs_per_asset * n
            + self.analyze_secs
            + self.save_secs_per_asset * n
            + self.save_fixed_secs
    }

    /// Whole seconds left after `elapsed`, never negative.
    pub fn remaining_secs(&self, asset_count: usize, elapsed: Duration) -> u64 {
        (self.total_secs(asset_count) - elapsed.as_secs_f64())
            .max(0.0)
            .round() as u64
    }
}

/// Progress state of one flow invocation.
pub struct FlowContext {
    progress: watch::Sender<Option<FlowProgress>>,
    events: Option<mpsc::UnboundedSender<FlowEvent>>,
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowContext {
    pub fn new() -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            progress,
            events: None,
        }
    }

    /// Context that also streams every progress, retry and terminal event.
    pub fn with_events() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut ctx = Self::new();
        ctx.events = Some(tx);
        (ctx, rx)
    }

    /// Read-only progress observable.
    pub fn subscribe(&self) -> watch::Receiver<Option<FlowProgress>> {
        self.progress.subscribe()
    }

    pub fn current(&self) -> Option<FlowProgress> {
        self.progress.borrow().clone()
    }

    fn emit(&self, event: FlowEvent) {
        if let Some(ref events) = self.events {
            // A dropped receiver only means nobody is listening anymore
            let _ = events.send(event);
        }
    }

    fn publish(&self, progress: FlowProgress) {
        self.progress.send_replace(Some(progress.clone()));
        self.emit(FlowEvent::Progress(progress));
    }

    fn reset(&self) {
        self.progress.send_replace(None);
    }
}

/// Projects stage-local updates onto the overall progress of one run.
struct ProgressTracker<'a> {
    ctx: &'a FlowContext,
    estimates: StageEstimates,
    asset_count: usize,
    started: Instant,
}

impl ProgressTracker<'_> {
    fn remaining(&self) -> u64 {
        self.estimates
            .remaining_secs(self.asset_count, self.started.elapsed())
    }

    fn stage(&self, stage: FlowStage, band: (f64, f64), update: StageUpdate) {
        match update {
            StageUpdate::Progress { percent, message } => {
                let local = percent.clamp(0.0, 100.0);
                let overall = band.0 + (band.1 - band.0) * local / 100.0;
                self.ctx.publish(FlowProgress {
                    stage,
                    percent: overall.round() as u8,
                    message,
                    estimated_seconds_remaining: self.remaining(),
                    retry_attempt: None,
                    max_retries: None,
                });
            }
            StageUpdate::Retry {
                attempt,
                max_attempts,
                delay_ms,
            } => {
                let percent = self
                    .ctx
                    .current()
                    .map(|p| p.percent)
                    .unwrap_or(band.0.round() as u8);
                self.ctx.emit(FlowEvent::Retry {
                    attempt,
                    max_attempts,
                    delay_ms,
                });
                self.ctx.publish(FlowProgress {
                    stage: FlowStage::Retry,
                    percent,
                    message: format!(
                        "Diagnosis service busy, retrying in {}s (attempt {} of {})",
                        (delay_ms as f64 / 1000.0).ceil() as u64,
                        attempt,
                        max_attempts
                    ),
                    estimated_seconds_remaining: self.remaining() + delay_ms / 1000,
                    retry_attempt: Some(attempt),
                    max_retries: Some(max_attempts),
                });
            }
        }
    }
}

/// Clears the in-flight flag when the run ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FlowOrchestrator {
    sessions: Arc<dyn SessionProvider>,
    gateway: Arc<dyn AssetTransfer>,
    invoker: DiagnosisInvoker,
    persister: ResultPersister,
    estimates: StageEstimates,
    in_flight: AtomicBool,
}

impl FlowOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        gateway: Arc<dyn AssetTransfer>,
        invoker: DiagnosisInvoker,
        persister: ResultPersister,
    ) -> Self {
        Self {
            sessions,
            gateway,
            invoker,
            persister,
            estimates: StageEstimates::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Wire the HTTP collaborators and the given storage from configuration.
    ///
    /// Originals are read back through `storage`; only URLs it does not serve
    /// are fetched over HTTP.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        sessions: Arc<dyn SessionProvider>,
    ) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.diagnosis_timeout_secs);

        let invoker = DiagnosisInvoker::new(
            Arc::new(HttpDiagnosisService::new(&config.diagnosis_api_url, timeout)?),
            RetryPolicy {
                max_attempts: config.diagnosis_max_attempts,
                base_delay: Duration::from_millis(config.diagnosis_retry_base_ms),
            },
            Duration::from_millis(config.analysis_stage_pacing_ms),
        );

        let fetcher = StorageAssetFetcher::new(storage.clone())
            .with_http_fallback(HttpAssetFetcher::new(timeout)?);
        let persister = ResultPersister::new(
            Arc::new(fetcher),
            storage.clone(),
            Arc::new(HttpRecordStore::new(&config.record_api_url, timeout)?),
            CompressOptions {
                max_width: config.resize_max_width,
                quality: config.resize_quality,
                quality_gate: None,
            },
        );

        Ok(Self::new(
            sessions,
            Arc::new(AssetTransferGateway::new(storage)),
            invoker,
            persister,
        ))
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Upload, analyze and save one set of captures.
    ///
    /// Concurrent calls on the same orchestrator fail with `Busy`.
    pub async fn run(
        &self,
        captures: Vec<RawCapture>,
        ctx: &FlowContext,
    ) -> AppResult<DiagnosisFlowOutput> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::Busy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.execute(captures, ctx).await {
            Ok(output) => {
                ctx.emit(FlowEvent::Terminal {
                    outcome: FlowTerminal::Completed {
                        saved_id: output.saved_id.clone(),
                    },
                });
                Ok(output)
            }
            Err(e) => {
                ctx.reset();
                log_failure(&e);
                ctx.emit(FlowEvent::Terminal {
                    outcome: FlowTerminal::Failed {
                        error_code: e.error_code().to_string(),
                        message: e.client_message(),
                    },
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        mut captures: Vec<RawCapture>,
        ctx: &FlowContext,
    ) -> AppResult<DiagnosisFlowOutput> {
        if captures.is_empty() {
            return Err(AppError::EmptyInput);
        }
        if captures.len() > MAX_CAPTURES {
            tracing::warn!(
                received = captures.len(),
                engaged = MAX_CAPTURES,
                "Extra captures ignored"
            );
            captures.truncate(MAX_CAPTURES);
        }

        let angle_labels = derive_angle_labels(captures.len());
        let tracker = ProgressTracker {
            ctx,
            estimates: self.estimates,
            asset_count: captures.len(),
            started: Instant::now(),
        };

        // Uploading
        let session = authenticated_session(self.sessions.as_ref()).await?;
        let assets: Vec<CaptureAsset> = captures
            .into_iter()
            .zip(angle_labels.iter().copied())
            .map(|(capture, angle_label)| {
                let format = detect_format(&capture.data, capture.content_type.as_deref());
                CaptureAsset {
                    data: capture.data,
                    angle_label,
                    owner_id: session.owner_id.clone(),
                    extension: format.extension().to_string(),
                    content_type: format.content_type().to_string(),
                }
            })
            .collect();

        tracing::info!(
            owner_id = %session.owner_id,
            assets = assets.len(),
            "Diagnosis flow started"
        );

        let on_upload = |u: StageUpdate| tracker.stage(FlowStage::Upload, UPLOAD_BAND, u);
        let batch = self
            .gateway
            .upload(&session, &assets, &angle_labels, &on_upload)
            .await?;

        let asset_urls = batch.urls();
        if asset_urls.len() != angle_labels.len() {
            return Err(AppError::CountMismatch {
                uploaded: asset_urls.len(),
                labels: angle_labels.len(),
            });
        }

        // Analyzing
        let credential = session.require_credential()?.to_string();
        let request = DiagnosisRequest {
            asset_urls: asset_urls.clone(),
            angle_labels: angle_labels.clone(),
            owner_id: batch.owner_id.clone(),
            credential: credential.clone(),
            profile: None,
            meta: None,
        };

        let on_analyze = |u: StageUpdate| tracker.stage(FlowStage::Analyze, ANALYZE_BAND, u);
        let result = self.invoker.invoke(&request, &on_analyze).await?;
        if !result.has_result_id() {
            return Err(AppError::MissingResultId);
        }

        // Saving
        let on_save = |u: StageUpdate| tracker.stage(FlowStage::Save, SAVE_BAND, u);
        let record = self
            .persister
            .persist(
                PersistInput {
                    owner_id: batch.owner_id.clone(),
                    credential,
                    original_urls: asset_urls,
                    angle_labels,
                    result: result.clone(),
                },
                &on_save,
            )
            .await?;

        ctx.publish(FlowProgress {
            stage: FlowStage::Complete,
            percent: 100,
            message: "Diagnosis complete".to_string(),
            estimated_seconds_remaining: 0,
            retry_attempt: None,
            max_retries: None,
        });

        tracing::info!(
            owner_id = %batch.owner_id,
            result_id = %result.result_id,
            saved_id = %record.saved_id,
            duration_ms = tracker.started.elapsed().as_secs_f64() * 1000.0,
            "Diagnosis flow complete"
        );

        Ok(DiagnosisFlowOutput {
            result_id: result.result_id,
            analysis_payload: result.analysis_payload,
            mapping_payload: result.mapping_payload,
            nlg_payload: result.nlg_payload,
            review_needed: result.review_needed,
            saved_id: record.saved_id,
            asset_urls: record.derived_asset_urls,
            angle_labels: record.angle_labels,
        })
    }
}

fn log_failure(err: &AppError) {
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            error_code = err.error_code(),
            error = %err,
            "Diagnosis flow rejected"
        ),
        LogLevel::Warn => tracing::warn!(
            error_code = err.error_code(),
            error = %err,
            recoverable = err.is_recoverable(),
            "Diagnosis flow failed"
        ),
        LogLevel::Error => tracing::error!(
            error_code = err.error_code(),
            error = %err.detailed_message(),
            recoverable = err.is_recoverable(),
            "Diagnosis flow failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_capture_position() {
        use AngleLabel::*;
        assert_eq!(derive_angle_labels(1), vec![Front]);
        assert_eq!(derive_angle_labels(2), vec![Front, Left]);
        assert_eq!(derive_angle_labels(3), vec![Front, Left, Right]);
        assert_eq!(derive_angle_labels(5), vec![Front, Left, Right]);
        assert!(derive_angle_labels(0).is_empty());
    }

    #[test]
    fn estimate_counts_down_and_floors_at_zero() {
        let estimates = StageEstimates::default();
        // 3 * 1.5 + 15 + 3 * 2 + 2
        assert_eq!(estimates.total_secs(3), 27.5);
        assert_eq!(estimates.remaining_secs(3, Duration::from_secs(10)), 18);
        assert_eq!(estimates.remaining_secs(1, Duration::from_secs(600)), 0);
    }

    #[test]
    fn stage_updates_project_onto_bands() {
        let ctx = FlowContext::new();
        let tracker = ProgressTracker {
            ctx: &ctx,
            estimates: StageEstimates::default(),
            asset_count: 1,
            started: Instant::now(),
        };

        tracker.stage(
            FlowStage::Analyze,
            ANALYZE_BAND,
            StageUpdate::progress(50.0, "half"),
        );
        let current = ctx.current().unwrap();
        assert_eq!(current.stage, FlowStage::Analyze);
        assert_eq!(current.percent, 50);

        tracker.stage(
            FlowStage::Analyze,
            ANALYZE_BAND,
            StageUpdate::Retry {
                attempt: 2,
                max_attempts: 3,
                delay_ms: 1000,
            },
        );
        let current = ctx.current().unwrap();
        assert_eq!(current.stage, FlowStage::Retry);
        assert_eq!(current.percent, 50);
        assert_eq!(current.retry_attempt, Some(2));
        assert_eq!(current.max_retries, Some(3));

        ctx.reset();
        assert!(ctx.current().is_none());
    }

    #[tokio::test]
    async fn events_are_streamed_when_requested() {
        let (ctx, mut events) = FlowContext::with_events();
        let mut observer = ctx.subscribe();

        ctx.publish(FlowProgress {
            stage: FlowStage::Upload,
            percent: 10,
            message: "Uploading".to_string(),
            estimated_seconds_remaining: 5,
            retry_attempt: None,
            max_retries: None,
        });

        assert!(observer.has_changed().unwrap());
        let seen = observer.borrow_and_update().clone();
        assert_eq!(seen.map(|p| p.percent), Some(10));
        match events.recv().await {
            Some(FlowEvent::Progress(p)) => assert_eq!(p.stage, FlowStage::Upload),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
