//! Upload orchestration.
//!
//! Order matters here: validate, reserve quota, check for duplicates,
//! then write bytes, then the registry row, then commit the quota.
//! Validation and quota failures abort before any network call; store
//! failures release the reservation so nothing leaks. The response
//! returns once the primary bytes are durable; variants and CDN
//! publication happen out of band.

use bytes::Bytes;
use chrono::Utc;
use greenroom_core::{
    AccessLevel, ContentItem, LifecycleStatus, MediaError, MediaResult, PipelineConfig,
    ProcessingStatus, StorageClass,
};
use greenroom_processing::{hash_bytes, UploadValidator};
use greenroom_registry::dedup::DedupOutcome;
use greenroom_registry::{ContentRegistry, DedupIndex, QuotaLedger};
use greenroom_storage::{keys, ObjectStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cdn::CdnDistributor;
use crate::worker::VariantWorker;

/// Metadata accompanying an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub owner_id: Uuid,
    pub title: String,
    pub access_level: AccessLevel,
    pub filename: String,
    pub declared_mime: String,
    /// Size the client announced, validated before any bytes are
    /// hashed or stored. `None` falls back to the payload length.
    pub declared_size: Option<u64>,
    /// Priority content is backed up opportunistically by the sweep.
    #[serde(default)]
    pub priority: bool,
}

/// What the caller gets back once the primary bytes are durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub content_id: Uuid,
    pub url: String,
    pub processing_status: ProcessingStatus,
    pub is_duplicate: bool,
}

pub struct MediaPipeline {
    store: Arc<dyn ObjectStore>,
    registry: ContentRegistry,
    dedup: DedupIndex,
    quota: Arc<QuotaLedger>,
    validator: UploadValidator,
    worker: Arc<VariantWorker>,
    cdn: Arc<CdnDistributor>,
}

impl MediaPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: ContentRegistry,
        dedup: DedupIndex,
        quota: Arc<QuotaLedger>,
        worker: Arc<VariantWorker>,
        cdn: Arc<CdnDistributor>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            registry,
            dedup,
            quota,
            validator: UploadValidator::new(config.limits.clone()),
            worker,
            cdn,
        }
    }

    /// Run the full upload flow for one payload.
    #[tracing::instrument(skip(self, data, request), fields(owner_id = %request.owner_id, filename = %request.filename))]
    pub async fn upload_content(
        &self,
        data: Bytes,
        request: UploadRequest,
    ) -> MediaResult<UploadOutcome> {
        let start = std::time::Instant::now();
        let size = request.declared_size.unwrap_or(data.len() as u64).max(data.len() as u64);

        // Validation first: an oversized declaration fails before any
        // hashing or store traffic.
        let report = self
            .validator
            .validate(&request.filename, &request.declared_mime, size)?;
        for warning in &report.warnings {
            tracing::warn!(
                owner_id = %request.owner_id,
                filename = %request.filename,
                warning = %warning,
                "Upload validation warning"
            );
        }

        let content_hash = hash_bytes(&data);

        self.quota.reserve(request.owner_id, size).await?;

        let outcome = match self.dedup.lookup(&content_hash, request.owner_id).await {
            Ok(DedupOutcome::Duplicate(canonical)) => {
                self.register_duplicate(&request, &canonical, size).await
            }
            Ok(DedupOutcome::Unique) => {
                self.store_new_item(data, &request, report.media_type, content_hash, size)
                    .await
            }
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(result) => {
                tracing::info!(
                    content_id = %result.content_id,
                    owner_id = %request.owner_id,
                    size_bytes = size,
                    is_duplicate = result.is_duplicate,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload finished"
                );
            }
            Err(e) => {
                // The reservation must not outlive a failed upload.
                if let Err(release_err) = self
                    .quota
                    .release_reservation(request.owner_id, size)
                    .await
                {
                    tracing::error!(
                        owner_id = %request.owner_id,
                        error = %release_err,
                        "Failed to release reservation after upload failure"
                    );
                }
                e.log();
            }
        }
        outcome
    }

    async fn register_duplicate(
        &self,
        request: &UploadRequest,
        canonical: &ContentItem,
        reserved: u64,
    ) -> MediaResult<UploadOutcome> {
        let copy = self.dedup.logical_copy(
            canonical,
            request.owner_id,
            request.title.clone(),
            request.filename.clone(),
        );
        self.registry.create(copy.clone()).await?;
        // Duplicates are never charged.
        self.quota
            .release_reservation(request.owner_id, reserved)
            .await?;
        Ok(UploadOutcome {
            content_id: copy.id,
            url: copy.url,
            processing_status: copy.processing_status,
            is_duplicate: true,
        })
    }

    async fn store_new_item(
        &self,
        data: Bytes,
        request: &UploadRequest,
        media_type: greenroom_core::MediaType,
        content_hash: String,
        reserved: u64,
    ) -> MediaResult<UploadOutcome> {
        let now = Utc::now();
        let storage_key = keys::primary_key(request.owner_id, now, &request.filename);
        let actual_size = data.len() as u64;

        let url = self
            .store
            .put(
                &storage_key,
                data,
                &request.declared_mime,
                StorageClass::Standard,
            )
            .await
            .map_err(|e| MediaError::StorageUnavailable(e.to_string()))?;

        let item = ContentItem {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            media_type,
            title: request.title.clone(),
            access_level: request.access_level,
            original_filename: request.filename.clone(),
            mime_type: request.declared_mime.clone(),
            storage_key: storage_key.clone(),
            storage_class: StorageClass::Standard,
            url: url.clone(),
            content_hash,
            size: actual_size,
            uploaded_at: now,
            updated_at: now,
            processing_status: ProcessingStatus::Pending,
            lifecycle_status: LifecycleStatus::Active,
            soft_deleted_at: None,
            purge_after: None,
            duplicate_of: None,
            priority: request.priority,
            variants: vec![],
            backups: vec![],
        };

        if let Err(e) = self.registry.create(item.clone()).await {
            // Orphaned bytes are worse than a failed request; clean up
            // best effort before surfacing the registry error.
            if let Err(del_err) = self.store.delete(&storage_key).await {
                tracing::error!(
                    key = %storage_key,
                    error = %del_err,
                    "Failed to remove orphaned object after registry failure"
                );
            }
            return Err(e);
        }

        self.quota
            .commit(request.owner_id, reserved, actual_size)
            .await?;

        // Bytes are durable and charged at this point; a queue hiccup
        // must not turn the upload into a failure.
        if let Err(e) = self.worker.submit(item.id).await {
            tracing::error!(content_id = %item.id, error = %e, "Failed to enqueue variant job");
        }
        self.cdn.publish(&item).await;

        Ok(UploadOutcome {
            content_id: item.id,
            url,
            processing_status: ProcessingStatus::Pending,
            is_duplicate: false,
        })
    }
}
