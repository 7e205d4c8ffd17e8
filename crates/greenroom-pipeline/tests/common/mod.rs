//! Shared fixture assembling the whole pipeline on in-memory backends.

use bytes::Bytes;
use greenroom_core::{AccessLevel, PipelineConfig, ProcessingStatus};
use greenroom_pipeline::{
    CdnDistributor, LifecycleManager, MediaPipeline, MockEdgeCache, UploadRequest, VariantEngine,
    VariantWorker,
};
use greenroom_processing::{MediaProber, StaticProber, StubTranscoder};
use greenroom_registry::{
    ContentRegistry, DedupIndex, MemoryContentStore, MemoryQuotaStore, QuotaLedger,
};
use greenroom_storage::{InMemoryStore, ObjectStore, RetryingStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct Harness {
    pub raw_store: Arc<InMemoryStore>,
    pub raw_backup: Arc<InMemoryStore>,
    pub edge: Arc<MockEdgeCache>,
    pub content_store: Arc<MemoryContentStore>,
    pub registry: ContentRegistry,
    pub quota: Arc<QuotaLedger>,
    pub engine: Arc<VariantEngine>,
    pub pipeline: MediaPipeline,
    pub lifecycle: LifecycleManager,
}

pub fn harness(config: PipelineConfig) -> Harness {
    harness_with_prober(config, StaticProber::default())
}

pub fn harness_with_prober(config: PipelineConfig, prober: StaticProber) -> Harness {
    config.validate().expect("test config must be valid");

    let raw_store = Arc::new(InMemoryStore::new());
    let store: Arc<dyn ObjectStore> =
        Arc::new(RetryingStore::new(raw_store.clone(), config.retry.clone()));
    let raw_backup = Arc::new(InMemoryStore::new());
    let backup_store: Arc<dyn ObjectStore> =
        Arc::new(RetryingStore::new(raw_backup.clone(), config.retry.clone()));

    let content_store = Arc::new(MemoryContentStore::new());
    let registry = ContentRegistry::new(content_store.clone());
    let quota = Arc::new(QuotaLedger::new(
        Arc::new(MemoryQuotaStore::new()),
        config.quota.clone(),
    ));
    let edge = Arc::new(MockEdgeCache::new());
    let cdn = Arc::new(CdnDistributor::new(edge.clone(), config.cdn.clone()));

    let prober: Arc<dyn MediaProber> = Arc::new(prober);
    let engine = Arc::new(VariantEngine::new(
        store.clone(),
        registry.clone(),
        quota.clone(),
        prober,
        Arc::new(StubTranscoder::default()),
        config.variants.clone(),
    ));
    let worker = Arc::new(VariantWorker::new(
        engine.clone(),
        config.variants.max_concurrent_jobs,
    ));
    let dedup = DedupIndex::new(registry.clone(), config.dedup.clone());

    let pipeline = MediaPipeline::new(
        store.clone(),
        registry.clone(),
        dedup,
        quota.clone(),
        worker,
        cdn.clone(),
        &config,
    );
    let lifecycle = LifecycleManager::new(
        store,
        backup_store,
        registry.clone(),
        quota.clone(),
        cdn,
        config.lifecycle.clone(),
    );

    Harness {
        raw_store,
        raw_backup,
        edge,
        content_store,
        registry,
        quota,
        engine,
        pipeline,
        lifecycle,
    }
}

pub fn request(owner_id: Uuid, filename: &str, declared_mime: &str) -> UploadRequest {
    UploadRequest {
        owner_id,
        title: filename.to_string(),
        access_level: AccessLevel::TicketGated,
        filename: filename.to_string(),
        declared_mime: declared_mime.to_string(),
        declared_size: None,
        priority: false,
    }
}

/// Encode a solid-color JPEG of the given dimensions.
pub fn jpeg_bytes(width: u32, height: u32) -> Bytes {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 40, 200]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg)
        .expect("jpeg encoding");
    Bytes::from(buf.into_inner())
}

/// Poll the registry until the item leaves `pending`/`processing`.
pub async fn wait_settled(harness: &Harness, content_id: Uuid) -> ProcessingStatus {
    for _ in 0..200 {
        let item = harness.registry.get(content_id).await.expect("item exists");
        match item.processing_status {
            ProcessingStatus::Completed | ProcessingStatus::Failed => {
                return item.processing_status
            }
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    panic!("variant processing never settled for {}", content_id);
}
