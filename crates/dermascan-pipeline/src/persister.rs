//! Result persistence
//!
//! Builds a compact variant of every original, then saves the diagnosis
//! record. Variants are produced one at a time; a failure anywhere in the
//! fetch, transform, upload chain falls back to the original URL for that
//! position so the record always carries one URL per original.

use crate::diagnosis::ServiceCallError;
use crate::ProgressFn;
use anyhow::Context;
use async_trait::async_trait;
use dermascan_core::{
    AngleLabel, AppError, AppResult, DiagnosisResult, PersistedRecord, ResponseStatus,
    SaveRecordRequest, SaveRecordResponse, StageUpdate,
};
use dermascan_processing::{prepare_for_upload, CompressOptions};
use dermascan_storage::{resized_key, Storage};
use std::sync::Arc;
use std::time::Duration;

/// Share of the stage spent on derived assets; the record call takes the rest.
const DERIVE_BAND: (f64, f64) = (10.0, 80.0);

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>>;
}

/// Fetch originals over HTTP.
pub struct HttpAssetFetcher {
    http_client: reqwest::Client,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for asset downloads")?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Storage(format!(
                "Failed to fetch {}: HTTP {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Fetch originals straight from the storage backend that served them.
///
/// URLs the backend does not recognize go to the HTTP fallback, if any.
pub struct StorageAssetFetcher {
    storage: Arc<dyn Storage>,
    http_fallback: Option<HttpAssetFetcher>,
}

impl StorageAssetFetcher {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            http_fallback: None,
        }
    }

    pub fn with_http_fallback(mut self, fetcher: HttpAssetFetcher) -> Self {
        self.http_fallback = Some(fetcher);
        self
    }
}

#[async_trait]
impl AssetFetcher for StorageAssetFetcher {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        match (self.storage.key_from_url(url), &self.http_fallback) {
            (Some(key), _) => self
                .storage
                .download(&key)
                .await
                .map_err(|e| AppError::Storage(e.to_string())),
            (None, Some(http)) => http.fetch(url).await,
            (None, None) => Err(AppError::Storage(format!(
                "URL {} is not served by storage",
                url
            ))),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, request: &SaveRecordRequest)
        -> Result<SaveRecordResponse, ServiceCallError>;
}

/// Record service over HTTP: `POST {base_url}/records` with a bearer credential.
pub struct HttpRecordStore {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for record service")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn save(
        &self,
        request: &SaveRecordRequest,
    ) -> Result<SaveRecordResponse, ServiceCallError> {
        let response = self
            .http_client
            .post(format!("{}/records", self.base_url))
            .bearer_auth(&request.credential)
            .json(request)
            .send()
            .await
            .map_err(ServiceCallError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ServiceCallError::from_response(response).await);
        }

        response
            .json::<SaveRecordResponse>()
            .await
            .map_err(|e| ServiceCallError::InvalidResponse(e.to_string()))
    }
}

/// Everything the persister needs from the earlier stages.
#[derive(Debug, Clone)]
pub struct PersistInput {
    pub owner_id: String,
    pub credential: String,
    pub original_urls: Vec<String>,
    pub angle_labels: Vec<AngleLabel>,
    pub result: DiagnosisResult,
}

pub struct ResultPersister {
    fetcher: Arc<dyn AssetFetcher>,
    storage: Arc<dyn Storage>,
    records: Arc<dyn RecordStore>,
    compress: CompressOptions,
}

impl ResultPersister {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        storage: Arc<dyn Storage>,
        records: Arc<dyn RecordStore>,
        compress: CompressOptions,
    ) -> Self {
        // Derived assets are never gated
        let compress = CompressOptions {
            quality_gate: None,
            ..compress
        };
        Self {
            fetcher,
            storage,
            records,
            compress,
        }
    }

    pub async fn persist(
        &self,
        input: PersistInput,
        progress: ProgressFn<'_>,
    ) -> AppResult<PersistedRecord> {
        if !input.result.has_result_id() {
            return Err(AppError::MissingResultId);
        }
        if input.original_urls.len() != input.angle_labels.len() {
            return Err(AppError::CountMismatch {
                uploaded: input.original_urls.len(),
                labels: input.angle_labels.len(),
            });
        }

        let total = input.original_urls.len();
        let (band_start, band_end) = DERIVE_BAND;
        progress(StageUpdate::progress(band_start, "Optimizing photos"));

        let mut derived_urls = Vec::with_capacity(total);
        for (index, (url, angle)) in input
            .original_urls
            .iter()
            .zip(input.angle_labels.iter().copied())
            .enumerate()
        {
            let derived = match self.derive(&input.owner_id, index, angle, url).await {
                Ok(derived) => derived,
                Err(e) => {
                    tracing::warn!(
                        owner_id = %input.owner_id,
                        index,
                        angle = %angle,
                        error = %e,
                        "Derived asset failed, keeping original URL"
                    );
                    url.clone()
                }
            };
            derived_urls.push(derived);

            let done = index + 1;
            progress(StageUpdate::progress(
                band_start + (band_end - band_start) * done as f64 / total.max(1) as f64,
                format!("Optimized {} of {}", done, total),
            ));
        }

        progress(StageUpdate::progress(band_end, "Saving diagnosis"));

        let request = SaveRecordRequest {
            owner_id: input.owner_id.clone(),
            asset_urls: derived_urls.clone(),
            angle_labels: input.angle_labels.clone(),
            result_id: input.result.result_id.clone(),
            analysis_payload: input.result.analysis_payload.clone(),
            mapping_payload: input.result.mapping_payload.clone(),
            nlg_payload: input.result.nlg_payload.clone(),
            confidence: input.result.confidence(),
            uncertainty: input.result.uncertainty(),
            review_needed: input.result.review_needed,
            credential: input.credential.clone(),
        };

        let response = self
            .records
            .save(&request)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        let saved_id = match response.status {
            ResponseStatus::Success => response
                .saved_id
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| {
                    AppError::Persistence("Record service returned no saved id".to_string())
                })?,
            ResponseStatus::Error => {
                return Err(AppError::Persistence(
                    response
                        .error
                        .unwrap_or_else(|| "Record service rejected the diagnosis".to_string()),
                ))
            }
        };

        progress(StageUpdate::progress(100.0, "Diagnosis saved"));

        tracing::info!(
            owner_id = %input.owner_id,
            result_id = %input.result.result_id,
            saved_id = %saved_id,
            assets = total,
            "Diagnosis record saved"
        );

        Ok(PersistedRecord {
            saved_id,
            derived_asset_urls: derived_urls,
            angle_labels: input.angle_labels,
        })
    }

    /// Fetch, shrink and upload one original; returns the variant URL.
    async fn derive(
        &self,
        owner_id: &str,
        index: usize,
        angle: AngleLabel,
        url: &str,
    ) -> AppResult<String> {
        let original = self.fetcher.fetch(url).await?;

        let options = self.compress;
        let prepared = tokio::task::spawn_blocking(move || prepare_for_upload(&original, &options))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to process image: {}", e)))??;

        let key = resized_key(owner_id, index, angle, prepared.extension());
        self.storage
            .upload_with_key(&key, prepared.data.to_vec(), prepared.content_type(), false)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }
}
