//! Bounded retry wrapper around an [`ObjectStore`].
//!
//! Transient failures are retried with capped exponential backoff in an
//! explicit loop; once attempts are exhausted the error is surfaced as
//! [`StorageError::Unavailable`], which the upload path maps to
//! `StorageUnavailable` before any registry write happens. Permanent
//! errors (not-found, invalid key, config) pass through untouched.

use crate::traits::{ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use greenroom_core::{RetryConfig, StorageClass};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Retrying decorator for any object store backend.
pub struct RetryingStore {
    inner: Arc<dyn ObjectStore>,
    policy: RetryConfig,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn ObjectStore>, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> StorageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        tracing::error!(
                            op,
                            attempts = attempt,
                            error = %e,
                            "Store operation failed, retries exhausted"
                        );
                        return Err(StorageError::Unavailable(format!(
                            "{} failed after {} attempts: {}",
                            op, attempt, e
                        )));
                    }
                    let delay_ms = self.policy.backoff_ms(attempt - 1);
                    tracing::warn!(
                        op,
                        attempt,
                        delay_ms,
                        error = %e,
                        "Transient store failure, backing off"
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for RetryingStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        storage_class: StorageClass,
    ) -> StorageResult<String> {
        // Safe to retry: put under the same key is idempotent.
        self.with_retry("put", || {
            self.inner.put(key, data.clone(), content_type, storage_class)
        })
        .await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.with_retry("get", || self.inner.get(key)).await
    }

    async fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
        storage_class: StorageClass,
    ) -> StorageResult<String> {
        self.with_retry("copy", || self.inner.copy(src_key, dst_key, storage_class))
            .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.with_retry("delete", || self.inner.delete(key)).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.with_retry("exists", || self.inner.exists(key)).await
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.with_retry("signed_url", || self.inner.signed_url(key, expires_in))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn fast_policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failures() {
        let inner = Arc::new(InMemoryStore::new());
        inner.fail_next_puts(2);
        let store = RetryingStore::new(inner.clone(), fast_policy(3));
        store
            .put("k", Bytes::from_static(b"x"), "text/plain", StorageClass::Standard)
            .await
            .unwrap();
        assert!(inner.contains("k"));
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_unavailable() {
        let inner = Arc::new(InMemoryStore::new());
        inner.fail_next_puts(10);
        let store = RetryingStore::new(inner.clone(), fast_policy(3));
        let err = store
            .put("k", Bytes::from_static(b"x"), "text/plain", StorageClass::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(!inner.contains("k"));
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let inner = Arc::new(InMemoryStore::new());
        let store = RetryingStore::new(inner, fast_policy(3));
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
