//! Narrow record-store interfaces.
//!
//! The document store itself is an external collaborator; the pipeline
//! only needs find-by-id, find-by-owner, find-by-hash, and whole-row
//! writes. In-memory implementations back the tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenroom_core::{ContentItem, MediaResult, StorageRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence seam for content registry rows.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert(&self, item: ContentItem) -> MediaResult<()>;

    async fn get(&self, id: Uuid) -> MediaResult<Option<ContentItem>>;

    /// Whole-row write; the registry serializes writes per item.
    async fn update(&self, item: ContentItem) -> MediaResult<()>;

    /// Returns whether a row was actually removed.
    async fn remove(&self, id: Uuid) -> MediaResult<bool>;

    async fn find_by_owner(&self, owner_id: Uuid) -> MediaResult<Vec<ContentItem>>;

    /// Every row carrying a content hash, oldest first; `owner_id = None`
    /// searches across all owners (cross-owner dedup).
    async fn find_by_hash(
        &self,
        hash: &str,
        owner_id: Option<Uuid>,
    ) -> MediaResult<Vec<ContentItem>>;

    /// Number of rows whose primary bytes live under the given key.
    async fn count_by_storage_key(&self, storage_key: &str) -> MediaResult<usize>;

    /// Soft-deleted rows whose purge time has passed.
    async fn find_purge_due(&self, now: DateTime<Utc>) -> MediaResult<Vec<ContentItem>>;

    /// Active byte-owning rows without any completed backup.
    async fn find_missing_backups(&self) -> MediaResult<Vec<ContentItem>>;

    /// Distinct owner ids present in the store.
    async fn owners(&self) -> MediaResult<Vec<Uuid>>;
}

/// Persistence seam for quota ledger rows. Atomicity is the ledger's
/// job (per-owner locks); this is plain load/store.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn load(&self, owner_id: Uuid) -> MediaResult<Option<StorageRecord>>;
    async fn store(&self, record: StorageRecord) -> MediaResult<()>;
}

/// In-memory [`ContentStore`].
#[derive(Default)]
pub struct MemoryContentStore {
    items: RwLock<HashMap<Uuid, ContentItem>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn insert(&self, item: ContentItem) -> MediaResult<()> {
        self.items.write().await.insert(item.id, item);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> MediaResult<Option<ContentItem>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn update(&self, item: ContentItem) -> MediaResult<()> {
        self.items.write().await.insert(item.id, item);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> MediaResult<bool> {
        Ok(self.items.write().await.remove(&id).is_some())
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> MediaResult<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.uploaded_at);
        Ok(items)
    }

    async fn find_by_hash(
        &self,
        hash: &str,
        owner_id: Option<Uuid>,
    ) -> MediaResult<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|i| i.content_hash == hash)
            .filter(|i| owner_id.is_none_or(|o| i.owner_id == o))
            .cloned()
            .collect();
        items.sort_by_key(|i| i.uploaded_at);
        Ok(items)
    }

    async fn count_by_storage_key(&self, storage_key: &str) -> MediaResult<usize> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|i| i.storage_key == storage_key)
            .count())
    }

    async fn find_purge_due(&self, now: DateTime<Utc>) -> MediaResult<Vec<ContentItem>> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|i| {
                i.lifecycle_status == greenroom_core::LifecycleStatus::SoftDeleted
                    && i.purge_after.is_some_and(|t| t <= now)
            })
            .cloned()
            .collect())
    }

    async fn find_missing_backups(&self) -> MediaResult<Vec<ContentItem>> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|i| {
                i.is_listed()
                    && i.owns_bytes()
                    && !i
                        .backups
                        .iter()
                        .any(|b| b.status == greenroom_core::BackupStatus::Completed)
            })
            .cloned()
            .collect())
    }

    async fn owners(&self) -> MediaResult<Vec<Uuid>> {
        let mut owners: Vec<Uuid> = self
            .items
            .read()
            .await
            .values()
            .map(|i| i.owner_id)
            .collect();
        owners.sort();
        owners.dedup();
        Ok(owners)
    }
}

/// In-memory [`QuotaStore`].
#[derive(Default)]
pub struct MemoryQuotaStore {
    records: RwLock<HashMap<Uuid, StorageRecord>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn load(&self, owner_id: Uuid) -> MediaResult<Option<StorageRecord>> {
        Ok(self.records.read().await.get(&owner_id).cloned())
    }

    async fn store(&self, record: StorageRecord) -> MediaResult<()> {
        self.records.write().await.insert(record.owner_id, record);
        Ok(())
    }
}
