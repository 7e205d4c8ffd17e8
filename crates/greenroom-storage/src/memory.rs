//! In-memory object store.
//!
//! Backs tests and local development. Supports injected put failures so
//! retry and abort paths can be exercised deterministically.

use crate::traits::{ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use greenroom_core::StorageClass;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    storage_class: StorageClass,
}

/// In-memory [`ObjectStore`] implementation.
#[derive(Default)]
pub struct InMemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    /// Number of upcoming put calls to fail with a transient error.
    failing_puts: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` put calls fail with a transient error.
    pub fn fail_next_puts(&self, n: u32) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn storage_class_of(&self, key: &str) -> Option<StorageClass> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.storage_class)
    }

    fn validate_key(key: &str) -> StorageResult<()> {
        if key.contains("..") || key.starts_with('/') || key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn url_for(key: &str) -> String {
        format!("memory://{}", key)
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        storage_class: StorageClass,
    ) -> StorageResult<String> {
        Self::validate_key(key)?;

        let remaining = self.failing_puts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_puts.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::UploadFailed(
                "injected transient failure".to_string(),
            ));
        }

        // Overwriting the same key with the same bytes is how idempotent
        // retried puts behave; last write wins.
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                storage_class,
            },
        );
        tracing::debug!(key = %key, "memory put");
        Ok(Self::url_for(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
        storage_class: StorageClass,
    ) -> StorageResult<String> {
        Self::validate_key(dst_key)?;
        let mut objects = self.objects.lock().unwrap();
        let src = objects
            .get(src_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(src_key.to_string()))?;
        objects.insert(
            dst_key.to_string(),
            StoredObject {
                data: src.data,
                content_type: src.content_type,
                storage_class,
            },
        );
        Ok(Self::url_for(dst_key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        // Idempotent: removing a missing key is fine.
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if !self.objects.lock().unwrap().contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!(
            "{}?expires_in={}",
            Self::url_for(key),
            expires_in.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = InMemoryStore::new();
        let url = store
            .put(
                "a/b.jpg",
                Bytes::from_static(b"jpeg"),
                "image/jpeg",
                StorageClass::Standard,
            )
            .await
            .unwrap();
        assert_eq!(url, "memory://a/b.jpg");
        assert_eq!(store.get("a/b.jpg").await.unwrap(), Bytes::from_static(b"jpeg"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .put("k", Bytes::from_static(b"x"), "text/plain", StorageClass::Standard)
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.contains("k"));
    }

    #[tokio::test]
    async fn test_copy_preserves_bytes_and_sets_class() {
        let store = InMemoryStore::new();
        store
            .put("src", Bytes::from_static(b"data"), "text/plain", StorageClass::Standard)
            .await
            .unwrap();
        store
            .copy("src", "backup/eu/src", StorageClass::InfrequentAccess)
            .await
            .unwrap();
        assert_eq!(store.get("backup/eu/src").await.unwrap(), Bytes::from_static(b"data"));
        assert_eq!(
            store.storage_class_of("backup/eu/src"),
            Some(StorageClass::InfrequentAccess)
        );
    }

    #[tokio::test]
    async fn test_injected_put_failures() {
        let store = InMemoryStore::new();
        store.fail_next_puts(1);
        let err = store
            .put("k", Bytes::from_static(b"x"), "text/plain", StorageClass::Standard)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        // Second attempt succeeds.
        store
            .put("k", Bytes::from_static(b"x"), "text/plain", StorageClass::Standard)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let store = InMemoryStore::new();
        let err = store
            .put(
                "../etc/passwd",
                Bytes::from_static(b"x"),
                "text/plain",
                StorageClass::Standard,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
