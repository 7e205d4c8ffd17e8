//! Background variant generation.
//!
//! [`VariantEngine`] does the actual work for one item: fetch the
//! source bytes, plan the ladder from the native properties, generate
//! and store each variant, and advance the item's processing status.
//! [`VariantWorker`] runs engines on a bounded pool, parallel across
//! items but never concurrent for the same item.
//!
//! A failed variant records its reason and leaves the item completed;
//! the item only fails when the source itself cannot be read or probed.

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use greenroom_core::{
    ContentItem, MediaError, MediaResult, MediaType, ProcessingStatus, StorageClass, Variant,
    VariantConfig, VariantKind, VariantStatus,
};
use greenroom_processing::variants;
use greenroom_processing::{MediaProber, Transcoder};
use greenroom_registry::{ContentRegistry, QuotaLedger};
use greenroom_storage::{keys, ObjectStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use uuid::Uuid;

/// Extension and content type for a variant kind.
fn output_format(kind: &VariantKind) -> (&'static str, &'static str) {
    match kind {
        VariantKind::Thumbnail { .. } | VariantKind::Poster => ("jpg", "image/jpeg"),
        VariantKind::VideoRendition { .. } => ("mp4", "video/mp4"),
        VariantKind::AudioRendition { .. } => ("mp3", "audio/mpeg"),
        VariantKind::Waveform => ("json", "application/json"),
    }
}

pub struct VariantEngine {
    store: Arc<dyn ObjectStore>,
    registry: ContentRegistry,
    quota: Arc<QuotaLedger>,
    prober: Arc<dyn MediaProber>,
    transcoder: Arc<dyn Transcoder>,
    config: VariantConfig,
}

impl VariantEngine {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: ContentRegistry,
        quota: Arc<QuotaLedger>,
        prober: Arc<dyn MediaProber>,
        transcoder: Arc<dyn Transcoder>,
        config: VariantConfig,
    ) -> Self {
        Self {
            store,
            registry,
            quota,
            prober,
            transcoder,
            config,
        }
    }

    /// Run the full variant pass for one item.
    pub async fn process_item(&self, content_id: Uuid) -> MediaResult<()> {
        let item = self.registry.get(content_id).await?;
        if item.duplicate_of.is_some() {
            // Logical copies serve the canonical item's variants.
            return Ok(());
        }
        let item = self
            .registry
            .set_processing_status(content_id, ProcessingStatus::Processing)
            .await?;
        let start = std::time::Instant::now();

        match self.run_plans(&item).await {
            Ok(generated) => {
                self.registry
                    .set_processing_status(content_id, ProcessingStatus::Completed)
                    .await?;
                tracing::info!(
                    content_id = %content_id,
                    media_type = item.media_type.as_str(),
                    variants = generated,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Variant generation finished"
                );
                Ok(())
            }
            Err(e) => {
                self.registry
                    .set_processing_status(content_id, ProcessingStatus::Failed)
                    .await?;
                tracing::error!(
                    content_id = %content_id,
                    error = %e,
                    "Variant generation failed"
                );
                Err(MediaError::ProcessingFailed {
                    content_id,
                    detail: format!("{:#}", e),
                })
            }
        }
    }

    /// Regenerate a single failed variant without re-running the ladder.
    pub async fn retry_variant(&self, content_id: Uuid, variant_id: Uuid) -> MediaResult<()> {
        let item = self.registry.get(content_id).await?;
        let variant = item
            .variant(variant_id)
            .cloned()
            .ok_or_else(|| MediaError::NotFound(format!("variant {}", variant_id)))?;
        if !variant.is_failed() {
            return Err(MediaError::InvalidTransition {
                from: format!("{:?}", variant.status),
                to: "Pending".to_string(),
            });
        }
        let data = self
            .store
            .get(&item.storage_key)
            .await
            .map_err(|e| MediaError::StorageUnavailable(e.to_string()))?;
        let (_, content_type) = output_format(&variant.kind);
        match self.generate(&variant.kind, &data).await {
            Ok(output) => {
                self.persist_variant(&item, variant, content_type, output)
                    .await
            }
            Err(e) => {
                self.registry
                    .set_variant_status(
                        content_id,
                        variant_id,
                        VariantStatus::Failed {
                            reason: format!("{:#}", e),
                        },
                    )
                    .await?;
                Err(MediaError::ProcessingFailed {
                    content_id,
                    detail: format!("{:#}", e),
                })
            }
        }
    }

    async fn run_plans(&self, item: &ContentItem) -> anyhow::Result<usize> {
        let data = self
            .store
            .get(&item.storage_key)
            .await
            .context("fetching source bytes")?;
        let plans = match item.media_type {
            MediaType::Image => {
                let (width, height) = variants::image::probe_dimensions(&data)
                    .context("probing image dimensions")?;
                variants::plan_image(width, height, &self.config)
            }
            MediaType::Video => {
                let probe = self
                    .prober
                    .probe_video(&data)
                    .await
                    .context("probing video")?;
                variants::plan_video(&probe, &self.config)
            }
            MediaType::Audio => {
                let probe = self
                    .prober
                    .probe_audio(&data)
                    .await
                    .context("probing audio")?;
                variants::plan_audio(&probe, &self.config)
            }
            MediaType::Document => Vec::new(),
        };

        let mut generated = 0;
        for plan in plans {
            let variant = Variant {
                id: Uuid::new_v4(),
                kind: plan.kind.clone(),
                storage_key: keys::variant_key(
                    &item.storage_key,
                    &plan.kind.path_segment(),
                    plan.ext,
                ),
                size: 0,
                status: VariantStatus::Pending,
                created_at: Utc::now(),
            };
            self.registry.upsert_variant(item.id, variant.clone()).await?;

            let result = match self.generate(&plan.kind, &data).await {
                Ok(output) => {
                    self.persist_variant(item, variant.clone(), plan.content_type, output)
                        .await
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(format!("{:#}", e)),
            };
            match result {
                Ok(()) => generated += 1,
                Err(reason) => {
                    // Retryable later; the item still completes.
                    tracing::warn!(
                        content_id = %item.id,
                        variant_kind = %plan.kind.path_segment(),
                        error = %reason,
                        "Variant failed, recorded for retry"
                    );
                    self.registry
                        .set_variant_status(
                            item.id,
                            variant.id,
                            VariantStatus::Failed { reason },
                        )
                        .await?;
                }
            }
        }
        Ok(generated)
    }

    async fn generate(&self, kind: &VariantKind, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        match kind {
            VariantKind::Thumbnail { width, .. } => {
                variants::image::generate_thumbnail(data, *width).map(|(bytes, _, _)| bytes)
            }
            VariantKind::VideoRendition { height } => {
                self.transcoder.transcode_video(data, *height).await
            }
            VariantKind::Poster => {
                let probe = self.prober.probe_video(data).await?;
                let at_secs = probe.duration_secs * self.config.poster_offset_ratio;
                self.transcoder.poster_frame(data, at_secs).await
            }
            VariantKind::AudioRendition { bitrate_kbps } => {
                self.transcoder.transcode_audio(data, *bitrate_kbps).await
            }
            VariantKind::Waveform => self.transcoder.waveform_peaks(data).await,
        }
    }

    async fn persist_variant(
        &self,
        item: &ContentItem,
        mut variant: Variant,
        content_type: &str,
        output: Vec<u8>,
    ) -> MediaResult<()> {
        let size = output.len() as u64;
        // Derived bytes count against the owner, so the ceiling is
        // checked before anything lands in the store.
        self.quota.charge(item.owner_id, size).await?;
        if let Err(e) = self
            .store
            .put(
                &variant.storage_key,
                Bytes::from(output),
                content_type,
                StorageClass::Standard,
            )
            .await
        {
            self.quota.release(item.owner_id, size).await?;
            return Err(MediaError::StorageUnavailable(e.to_string()));
        }
        variant.size = size;
        variant.status = VariantStatus::Completed;
        self.registry.upsert_variant(item.id, variant).await
    }
}

/// Background pool driving [`VariantEngine`] runs.
///
/// Shutdown signals the pool to stop claiming jobs; in-flight runs
/// finish on their own.
pub struct VariantWorker {
    job_tx: mpsc::Sender<Uuid>,
    shutdown_tx: mpsc::Sender<()>,
}

impl VariantWorker {
    pub fn new(engine: Arc<VariantEngine>, max_concurrent_jobs: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let requeue_tx = job_tx.clone();
        tokio::spawn(Self::worker_pool(
            engine,
            max_concurrent_jobs,
            job_rx,
            requeue_tx,
            shutdown_rx,
        ));
        Self {
            job_tx,
            shutdown_tx,
        }
    }

    /// Enqueue a variant pass for the item.
    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, content_id: Uuid) -> MediaResult<()> {
        self.job_tx
            .send(content_id)
            .await
            .map_err(|_| MediaError::Internal("variant worker is not running".to_string()))?;
        tracing::info!(content_id = %content_id, "Variant job submitted");
        Ok(())
    }

    pub async fn shutdown(&self) {
        tracing::info!("Initiating variant worker shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }

    async fn worker_pool(
        engine: Arc<VariantEngine>,
        max_concurrent_jobs: usize,
        mut job_rx: mpsc::Receiver<Uuid>,
        requeue_tx: mpsc::Sender<Uuid>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            max_workers = max_concurrent_jobs,
            "Variant worker pool started"
        );
        let semaphore = Arc::new(Semaphore::new(max_concurrent_jobs));
        let in_flight: Arc<Mutex<HashSet<Uuid>>> = Arc::new(Mutex::new(HashSet::new()));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Variant worker pool shutting down");
                    break;
                }
                job = job_rx.recv() => {
                    let Some(content_id) = job else { break };
                    // Per-item serialization: a job for an item already
                    // running goes back on the queue after a short delay.
                    if !in_flight.lock().await.insert(content_id) {
                        let tx = requeue_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            if tx.send(content_id).await.is_err() {
                                tracing::warn!(
                                    content_id = %content_id,
                                    "Requeue after in-flight collision dropped, queue closed"
                                );
                            }
                        });
                        continue;
                    }
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let engine = engine.clone();
                    let in_flight = in_flight.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = engine.process_item(content_id).await {
                            tracing::error!(
                                content_id = %content_id,
                                error = %e,
                                "Variant job failed"
                            );
                        }
                        in_flight.lock().await.remove(&content_id);
                    });
                }
            }
        }
        tracing::info!("Variant worker pool stopped");
    }
}
