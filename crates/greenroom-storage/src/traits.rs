//! Storage abstraction trait
//!
//! All storage backends (S3, in-memory) implement [`ObjectStore`]. The
//! pipeline never talks to a concrete backend directly; everything goes
//! through this trait so backends stay swappable and tests run against
//! the in-memory implementation.

use async_trait::async_trait;
use bytes::Bytes;
use greenroom_core::StorageClass;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether a retry of the same call can succeed. Not-found, key, and
    /// config errors are permanent; everything else is assumed to be an
    /// upstream hiccup.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            StorageError::NotFound(_) | StorageError::InvalidKey(_) | StorageError::ConfigError(_)
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Object store abstraction.
///
/// `put` under the same key is idempotent: retrying a put after an
/// ambiguous failure must never corrupt or duplicate the object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object and return its public URL.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        storage_class: StorageClass,
    ) -> StorageResult<String>;

    /// Fetch an object's bytes.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Server-side copy, returning the destination URL. Used for backup
    /// replication and tier moves without pulling bytes through us.
    async fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
        storage_class: StorageClass,
    ) -> StorageResult<String>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Generate a time-limited URL for direct access.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StorageError::UploadFailed("503".into()).is_transient());
        assert!(StorageError::BackendError("conn reset".into()).is_transient());
        assert!(StorageError::Unavailable("gone".into()).is_transient());
        assert!(!StorageError::NotFound("k".into()).is_transient());
        assert!(!StorageError::InvalidKey("../k".into()).is_transient());
        assert!(!StorageError::ConfigError("no bucket".into()).is_transient());
    }
}
