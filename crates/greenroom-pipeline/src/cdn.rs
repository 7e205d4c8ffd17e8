//! CDN distribution.
//!
//! Publishing and invalidation are best effort: the primary store is
//! the source of truth, so edge failures are logged and retried on
//! backoff but never surfaced to the caller. Only public content is
//! pushed to the edge; invalidation runs for everything so deletes
//! always propagate.

use async_trait::async_trait;
use greenroom_core::{CdnConfig, ContentItem};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Edge cache integration seam.
#[async_trait]
pub trait EdgeCache: Send + Sync {
    /// Make everything under the prefix servable from the edge.
    async fn publish(&self, prefix: &str) -> anyhow::Result<()>;

    /// Evict everything under the prefix from the edge.
    async fn invalidate(&self, prefix: &str) -> anyhow::Result<()>;
}

pub struct CdnDistributor {
    edge: Arc<dyn EdgeCache>,
    config: CdnConfig,
}

impl CdnDistributor {
    pub fn new(edge: Arc<dyn EdgeCache>, config: CdnConfig) -> Self {
        Self { edge, config }
    }

    /// Publish a public item's storage prefix. Never fails.
    pub async fn publish(&self, item: &ContentItem) {
        if !self.config.enabled || !item.access_level.is_public() {
            return;
        }
        let prefix = greenroom_storage::keys::item_prefix(&item.storage_key).to_string();
        self.run("publish", &prefix, |p| {
            let edge = self.edge.clone();
            async move { edge.publish(&p).await }
        })
        .await;
    }

    /// Invalidate an item's storage prefix. Never fails.
    pub async fn invalidate(&self, item: &ContentItem) {
        if !self.config.enabled {
            return;
        }
        let prefix = greenroom_storage::keys::item_prefix(&item.storage_key).to_string();
        self.run("invalidate", &prefix, |p| {
            let edge = self.edge.clone();
            async move { edge.invalidate(&p).await }
        })
        .await;
    }

    async fn run<F, Fut>(&self, op: &'static str, prefix: &str, mut call: F)
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<()>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match call(prefix.to_string()).await {
                Ok(()) => {
                    tracing::debug!(op, prefix, attempt, "CDN operation succeeded");
                    return;
                }
                Err(e) if attempt < self.config.retry.max_attempts => {
                    let delay = self.config.retry.backoff_ms(attempt - 1);
                    tracing::warn!(
                        op,
                        prefix,
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "CDN operation failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    tracing::error!(
                        op,
                        prefix,
                        attempts = attempt,
                        error = %e,
                        "CDN operation failed, giving up"
                    );
                    return;
                }
            }
        }
    }
}

/// Recording edge cache for tests, with optional injected failures.
#[derive(Default)]
pub struct MockEdgeCache {
    published: std::sync::Mutex<Vec<String>>,
    invalidated: std::sync::Mutex<Vec<String>>,
    failing_calls: AtomicU32,
}

impl MockEdgeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` edge calls fail.
    pub fn fail_next_calls(&self, n: u32) {
        self.failing_calls.store(n, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn maybe_fail(&self) -> anyhow::Result<()> {
        let remaining = self.failing_calls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_calls.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("injected edge failure");
        }
        Ok(())
    }
}

#[async_trait]
impl EdgeCache for MockEdgeCache {
    async fn publish(&self, prefix: &str) -> anyhow::Result<()> {
        self.maybe_fail()?;
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prefix.to_string());
        Ok(())
    }

    async fn invalidate(&self, prefix: &str) -> anyhow::Result<()> {
        self.maybe_fail()?;
        self.invalidated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prefix.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use greenroom_core::{
        AccessLevel, LifecycleStatus, MediaType, ProcessingStatus, RetryConfig, StorageClass,
    };
    use uuid::Uuid;

    fn item(access_level: AccessLevel) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            media_type: MediaType::Image,
            title: "flyer".into(),
            access_level,
            original_filename: "flyer.jpg".into(),
            mime_type: "image/jpeg".into(),
            storage_key: "owner/1_ab_flyer.jpg".into(),
            storage_class: StorageClass::Standard,
            url: "memory://flyer.jpg".into(),
            content_hash: "ff00".into(),
            size: 100,
            uploaded_at: Utc::now(),
            updated_at: Utc::now(),
            processing_status: ProcessingStatus::Completed,
            lifecycle_status: LifecycleStatus::Active,
            soft_deleted_at: None,
            purge_after: None,
            duplicate_of: None,
            priority: false,
            variants: vec![],
            backups: vec![],
        }
    }

    fn fast_config() -> CdnConfig {
        CdnConfig {
            enabled: true,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
        }
    }

    #[tokio::test]
    async fn test_publish_uses_item_prefix() {
        let edge = Arc::new(MockEdgeCache::new());
        let cdn = CdnDistributor::new(edge.clone(), fast_config());
        cdn.publish(&item(AccessLevel::Public)).await;
        assert_eq!(edge.published(), vec!["owner/1_ab_flyer".to_string()]);
    }

    #[tokio::test]
    async fn test_non_public_items_never_published() {
        let edge = Arc::new(MockEdgeCache::new());
        let cdn = CdnDistributor::new(edge.clone(), fast_config());
        cdn.publish(&item(AccessLevel::TicketGated)).await;
        cdn.publish(&item(AccessLevel::Private)).await;
        assert!(edge.published().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_runs_for_gated_content() {
        let edge = Arc::new(MockEdgeCache::new());
        let cdn = CdnDistributor::new(edge.clone(), fast_config());
        cdn.invalidate(&item(AccessLevel::TicketGated)).await;
        assert_eq!(edge.invalidated().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_to_success() {
        let edge = Arc::new(MockEdgeCache::new());
        edge.fail_next_calls(2);
        let cdn = CdnDistributor::new(edge.clone(), fast_config());
        cdn.publish(&item(AccessLevel::Public)).await;
        assert_eq!(edge.published().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_failure_swallowed() {
        let edge = Arc::new(MockEdgeCache::new());
        edge.fail_next_calls(10);
        let cdn = CdnDistributor::new(edge.clone(), fast_config());
        // Must not panic or error; the upload path never sees edge failures.
        cdn.publish(&item(AccessLevel::Public)).await;
        assert!(edge.published().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_cdn_is_inert() {
        let edge = Arc::new(MockEdgeCache::new());
        let cdn = CdnDistributor::new(
            edge.clone(),
            CdnConfig {
                enabled: false,
                retry: RetryConfig::default(),
            },
        );
        cdn.publish(&item(AccessLevel::Public)).await;
        cdn.invalidate(&item(AccessLevel::Public)).await;
        assert!(edge.published().is_empty());
        assert!(edge.invalidated().is_empty());
    }
}
