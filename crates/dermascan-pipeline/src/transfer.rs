//! Asset transfer gateway
//!
//! Uploads original captures to `{owner_id}/original/{angle}.{ext}`. Uploads
//! run concurrently; results are keyed by input index. A new diagnosis of the
//! same owner replaces the previous originals.

use crate::ProgressFn;
use async_trait::async_trait;
use dermascan_core::{
    AngleLabel, AppError, AppResult, CaptureAsset, StageUpdate, UploadBatch, UploadedAsset,
};
use dermascan_storage::{original_key, Storage};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::session::Session;

#[async_trait]
pub trait AssetTransfer: Send + Sync {
    /// Upload every asset, failing fast on the first transfer error.
    ///
    /// `angle_labels` must have one entry per asset; the label decides the
    /// storage path. Results come back in input order.
    async fn upload(
        &self,
        session: &Session,
        assets: &[CaptureAsset],
        angle_labels: &[AngleLabel],
        progress: ProgressFn<'_>,
    ) -> AppResult<UploadBatch>;
}

pub struct AssetTransferGateway {
    storage: Arc<dyn Storage>,
}

impl AssetTransferGateway {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl AssetTransfer for AssetTransferGateway {
    async fn upload(
        &self,
        session: &Session,
        assets: &[CaptureAsset],
        angle_labels: &[AngleLabel],
        progress: ProgressFn<'_>,
    ) -> AppResult<UploadBatch> {
        if assets.is_empty() {
            return Err(AppError::EmptyInput);
        }
        session.require_credential()?;
        if assets.len() != angle_labels.len() {
            return Err(AppError::CountMismatch {
                uploaded: assets.len(),
                labels: angle_labels.len(),
            });
        }

        let total = assets.len();
        let uploaded = AtomicUsize::new(0);
        let start = Instant::now();

        progress(StageUpdate::progress(0.0, format!("Uploading {} photo(s)", total)));

        let transfers = assets
            .iter()
            .zip(angle_labels.iter().copied())
            .map(|(asset, angle)| {
                let uploaded = &uploaded;
                async move {
                    let key = original_key(&asset.owner_id, angle, &asset.extension);
                    let public_url = self
                        .storage
                        .upload_with_key(&key, asset.data.clone(), &asset.content_type, true)
                        .await
                        .map_err(|e| {
                            tracing::error!(
                                owner_id = %asset.owner_id,
                                key = %key,
                                error = %e,
                                "Original upload failed"
                            );
                            AppError::Storage(e.to_string())
                        })?;

                    let done = uploaded.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(StageUpdate::progress(
                        done as f64 / total as f64 * 100.0,
                        format!("Uploaded {} of {}", done, total),
                    ));

                    Ok::<_, AppError>(UploadedAsset {
                        public_url,
                        storage_path: key,
                        owner_id: asset.owner_id.clone(),
                        angle_label: angle,
                    })
                }
            });

        // try_join_all keeps input order regardless of completion order
        let results = try_join_all(transfers).await?;

        tracing::info!(
            owner_id = %session.owner_id,
            count = results.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Originals uploaded"
        );

        Ok(UploadBatch {
            owner_id: session.owner_id.clone(),
            results,
        })
    }
}
