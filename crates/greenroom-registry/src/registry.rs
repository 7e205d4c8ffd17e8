//! Content registry: the durable record of every item, its variants,
//! storage locations, and backup state.
//!
//! All status changes go through the transition tables on the core
//! enums; an invalid transition is rejected before anything is written.

use chrono::{DateTime, Utc};
use greenroom_core::{
    BackupLocation, BackupStatus, ContentItem, LifecycleStatus, MediaError, MediaResult,
    ProcessingStatus, Variant, VariantStatus,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::store::ContentStore;

/// Registry over a narrow content store.
#[derive(Clone)]
pub struct ContentRegistry {
    store: Arc<dyn ContentStore>,
}

impl ContentRegistry {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, item: ContentItem) -> MediaResult<()> {
        tracing::info!(
            content_id = %item.id,
            owner_id = %item.owner_id,
            media_type = item.media_type.as_str(),
            size_bytes = item.size,
            duplicate = item.duplicate_of.is_some(),
            "Registering content item"
        );
        self.store.insert(item).await
    }

    pub async fn get(&self, id: Uuid) -> MediaResult<ContentItem> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("content item {}", id)))
    }

    pub async fn try_get(&self, id: Uuid) -> MediaResult<Option<ContentItem>> {
        self.store.get(id).await
    }

    /// Items visible in normal listings: soft-deleted rows are hidden.
    pub async fn list_active(&self, owner_id: Uuid) -> MediaResult<Vec<ContentItem>> {
        Ok(self
            .store
            .find_by_owner(owner_id)
            .await?
            .into_iter()
            .filter(|i| i.is_listed())
            .collect())
    }

    pub async fn list_all(&self, owner_id: Uuid) -> MediaResult<Vec<ContentItem>> {
        self.store.find_by_owner(owner_id).await
    }

    /// Move the item's processing status through the transition table.
    pub async fn set_processing_status(
        &self,
        id: Uuid,
        to: ProcessingStatus,
    ) -> MediaResult<ContentItem> {
        let mut item = self.get(id).await?;
        if !item.processing_status.can_transition(to) {
            return Err(MediaError::InvalidTransition {
                from: format!("{:?}", item.processing_status),
                to: format!("{:?}", to),
            });
        }
        item.processing_status = to;
        item.updated_at = Utc::now();
        self.store.update(item.clone()).await?;
        Ok(item)
    }

    /// Move the item's lifecycle status through the transition table,
    /// stamping or clearing the soft-delete bookkeeping.
    pub async fn set_lifecycle_status(
        &self,
        id: Uuid,
        to: LifecycleStatus,
        purge_after: Option<DateTime<Utc>>,
    ) -> MediaResult<ContentItem> {
        let mut item = self.get(id).await?;
        if !item.lifecycle_status.can_transition(to) {
            return Err(MediaError::InvalidTransition {
                from: format!("{:?}", item.lifecycle_status),
                to: format!("{:?}", to),
            });
        }
        item.lifecycle_status = to;
        match to {
            LifecycleStatus::SoftDeleted => {
                item.soft_deleted_at = Some(Utc::now());
                item.purge_after = purge_after;
            }
            LifecycleStatus::Active => {
                item.soft_deleted_at = None;
                item.purge_after = None;
            }
        }
        item.updated_at = Utc::now();
        self.store.update(item.clone()).await?;
        Ok(item)
    }

    /// Record a variant (insert or replace by id).
    pub async fn upsert_variant(&self, id: Uuid, variant: Variant) -> MediaResult<()> {
        let mut item = self.get(id).await?;
        item.variants.retain(|v| v.id != variant.id);
        item.variants.push(variant);
        item.updated_at = Utc::now();
        self.store.update(item).await
    }

    pub async fn set_variant_status(
        &self,
        id: Uuid,
        variant_id: Uuid,
        status: VariantStatus,
    ) -> MediaResult<()> {
        let mut item = self.get(id).await?;
        let variant = item
            .variants
            .iter_mut()
            .find(|v| v.id == variant_id)
            .ok_or_else(|| MediaError::NotFound(format!("variant {}", variant_id)))?;
        variant.status = status;
        item.updated_at = Utc::now();
        self.store.update(item).await
    }

    pub async fn add_backup(&self, id: Uuid, backup: BackupLocation) -> MediaResult<()> {
        let mut item = self.get(id).await?;
        item.backups.retain(|b| b.key != backup.key);
        item.backups.push(backup);
        item.updated_at = Utc::now();
        self.store.update(item).await
    }

    pub async fn set_backup_status(
        &self,
        id: Uuid,
        backup_key: &str,
        status: BackupStatus,
    ) -> MediaResult<()> {
        let mut item = self.get(id).await?;
        let backup = item
            .backups
            .iter_mut()
            .find(|b| b.key == backup_key)
            .ok_or_else(|| MediaError::NotFound(format!("backup {}", backup_key)))?;
        backup.status = status;
        item.updated_at = Utc::now();
        self.store.update(item).await
    }

    /// Remove the registry row. Returns false when it was already gone,
    /// which keeps hard delete idempotent.
    pub async fn remove(&self, id: Uuid) -> MediaResult<bool> {
        self.store.remove(id).await
    }

    pub async fn find_by_hash(
        &self,
        hash: &str,
        owner_id: Option<Uuid>,
    ) -> MediaResult<Vec<ContentItem>> {
        self.store.find_by_hash(hash, owner_id).await
    }

    /// How many rows (canonical + logical copies) point at a storage key.
    pub async fn references_to_key(&self, storage_key: &str) -> MediaResult<usize> {
        self.store.count_by_storage_key(storage_key).await
    }

    pub async fn purge_due(&self, now: DateTime<Utc>) -> MediaResult<Vec<ContentItem>> {
        self.store.find_purge_due(now).await
    }

    pub async fn missing_backups(&self) -> MediaResult<Vec<ContentItem>> {
        self.store.find_missing_backups().await
    }

    pub async fn owners(&self) -> MediaResult<Vec<Uuid>> {
        self.store.owners().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryContentStore;
    use greenroom_core::{AccessLevel, MediaType, StorageClass, VariantKind};

    fn registry() -> ContentRegistry {
        ContentRegistry::new(Arc::new(MemoryContentStore::new()))
    }

    pub(crate) fn item(owner_id: Uuid) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            owner_id,
            media_type: MediaType::Image,
            title: "poster art".into(),
            access_level: AccessLevel::Public,
            original_filename: "poster.jpg".into(),
            mime_type: "image/jpeg".into(),
            storage_key: format!("{}/1_ab_poster.jpg", owner_id),
            storage_class: StorageClass::Standard,
            url: "memory://poster.jpg".into(),
            content_hash: "abcd".into(),
            size: 2048,
            uploaded_at: Utc::now(),
            updated_at: Utc::now(),
            processing_status: ProcessingStatus::Pending,
            lifecycle_status: LifecycleStatus::Active,
            soft_deleted_at: None,
            purge_after: None,
            duplicate_of: None,
            priority: false,
            variants: vec![],
            backups: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_get_round_trip() {
        let reg = registry();
        let it = item(Uuid::new_v4());
        reg.create(it.clone()).await.unwrap();
        let fetched = reg.get(it.id).await.unwrap();
        assert_eq!(fetched.storage_key, it.storage_key);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let reg = registry();
        let err = reg.get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_processing_transition_rejected() {
        let reg = registry();
        let it = item(Uuid::new_v4());
        reg.create(it.clone()).await.unwrap();
        // Pending -> Completed skips Processing.
        let err = reg
            .set_processing_status(it.id, ProcessingStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active_listing() {
        let reg = registry();
        let owner = Uuid::new_v4();
        let it = item(owner);
        reg.create(it.clone()).await.unwrap();
        reg.set_lifecycle_status(it.id, LifecycleStatus::SoftDeleted, Some(Utc::now()))
            .await
            .unwrap();
        assert!(reg.list_active(owner).await.unwrap().is_empty());
        assert_eq!(reg.list_all(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_clears_soft_delete_stamps() {
        let reg = registry();
        let it = item(Uuid::new_v4());
        reg.create(it.clone()).await.unwrap();
        reg.set_lifecycle_status(it.id, LifecycleStatus::SoftDeleted, Some(Utc::now()))
            .await
            .unwrap();
        let restored = reg
            .set_lifecycle_status(it.id, LifecycleStatus::Active, None)
            .await
            .unwrap();
        assert!(restored.soft_deleted_at.is_none());
        assert!(restored.purge_after.is_none());
    }

    #[tokio::test]
    async fn test_upsert_variant_replaces_by_id() {
        let reg = registry();
        let it = item(Uuid::new_v4());
        reg.create(it.clone()).await.unwrap();
        let variant_id = Uuid::new_v4();
        let v = Variant {
            id: variant_id,
            kind: VariantKind::Thumbnail {
                width: 150,
                height: 100,
            },
            storage_key: "k/thumbnail/150.jpg".into(),
            size: 0,
            status: VariantStatus::Pending,
            created_at: Utc::now(),
        };
        reg.upsert_variant(it.id, v.clone()).await.unwrap();
        reg.upsert_variant(
            it.id,
            Variant {
                size: 512,
                status: VariantStatus::Completed,
                ..v
            },
        )
        .await
        .unwrap();
        let fetched = reg.get(it.id).await.unwrap();
        assert_eq!(fetched.variants.len(), 1);
        assert_eq!(fetched.variants[0].size, 512);
    }

    #[tokio::test]
    async fn test_references_to_key_counts_duplicates() {
        let reg = registry();
        let owner = Uuid::new_v4();
        let canonical = item(owner);
        reg.create(canonical.clone()).await.unwrap();
        let mut dup = item(owner);
        dup.storage_key = canonical.storage_key.clone();
        dup.duplicate_of = Some(canonical.id);
        reg.create(dup).await.unwrap();
        assert_eq!(
            reg.references_to_key(&canonical.storage_key).await.unwrap(),
            2
        );
    }
}
