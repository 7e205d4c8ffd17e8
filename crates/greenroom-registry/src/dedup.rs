//! Content-hash deduplication over the registry.
//!
//! A duplicate upload never stores bytes and never charges quota: it
//! becomes a logical copy pointing at the canonical item's storage key.
//! Matching is scoped per owner unless cross-owner dedup is enabled.

use chrono::Utc;
use greenroom_core::{ContentItem, DedupConfig, MediaResult};
use uuid::Uuid;

use crate::registry::ContentRegistry;

/// Outcome of a duplicate lookup.
#[derive(Debug, Clone)]
pub enum DedupOutcome {
    /// No existing item carries these bytes.
    Unique,
    /// The bytes already exist; the canonical item is returned.
    Duplicate(ContentItem),
}

impl DedupOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DedupOutcome::Duplicate(_))
    }
}

pub struct DedupIndex {
    registry: ContentRegistry,
    config: DedupConfig,
}

impl DedupIndex {
    pub fn new(registry: ContentRegistry, config: DedupConfig) -> Self {
        Self { registry, config }
    }

    /// Look up the content hash and resolve to the canonical item.
    ///
    /// Soft-deleted matches do not count: their bytes are on the way
    /// out, so the new upload must store its own copy. A soft-deleted
    /// logical copy must never mask a live canonical row, so every
    /// match is considered, byte-owning rows first.
    pub async fn lookup(&self, hash: &str, owner_id: Uuid) -> MediaResult<DedupOutcome> {
        let scope = if self.config.cross_owner {
            None
        } else {
            Some(owner_id)
        };
        let found = self
            .registry
            .find_by_hash(hash, scope)
            .await?
            .into_iter()
            .filter(|i| i.is_listed())
            .min_by_key(|i| (i.duplicate_of.is_some(), i.uploaded_at));
        let Some(found) = found else {
            return Ok(DedupOutcome::Unique);
        };
        // Logical copies point back to their canonical item; follow the
        // link so chains never form.
        let canonical = match found.duplicate_of {
            Some(root_id) => match self.registry.try_get(root_id).await? {
                Some(root) if root.is_listed() => root,
                _ => found,
            },
            None => found,
        };
        tracing::info!(
            content_hash = hash,
            canonical_id = %canonical.id,
            owner_id = %owner_id,
            "Duplicate upload detected"
        );
        Ok(DedupOutcome::Duplicate(canonical))
    }

    /// Build a logical copy of `canonical` for the uploading owner. The
    /// copy shares the storage key and hash but owns no bytes, so it is
    /// never charged and never triggers object-store writes.
    pub fn logical_copy(
        &self,
        canonical: &ContentItem,
        owner_id: Uuid,
        title: String,
        original_filename: String,
    ) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: Uuid::new_v4(),
            owner_id,
            title,
            original_filename,
            uploaded_at: now,
            updated_at: now,
            duplicate_of: Some(canonical.id),
            // The copy serves the canonical item's derived outputs, so
            // its processing status is whatever the canonical's is right
            // now. `..canonical.clone()` carries it over.
            variants: vec![],
            backups: vec![],
            soft_deleted_at: None,
            purge_after: None,
            ..canonical.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryContentStore;
    use greenroom_core::{
        AccessLevel, LifecycleStatus, MediaType, ProcessingStatus, StorageClass,
    };
    use std::sync::Arc;

    fn item(owner_id: Uuid, hash: &str) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            owner_id,
            media_type: MediaType::Audio,
            title: "unreleased demo".into(),
            access_level: AccessLevel::TicketGated,
            original_filename: "demo.mp3".into(),
            mime_type: "audio/mpeg".into(),
            storage_key: format!("{}/1_xy_demo.mp3", owner_id),
            storage_class: StorageClass::Standard,
            url: "memory://demo.mp3".into(),
            content_hash: hash.into(),
            size: 4096,
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

    fn index(cross_owner: bool) -> (DedupIndex, ContentRegistry) {
        let registry = ContentRegistry::new(Arc::new(MemoryContentStore::new()));
        (
            DedupIndex::new(registry.clone(), DedupConfig { cross_owner }),
            registry,
        )
    }

    #[tokio::test]
    async fn test_unique_when_hash_unknown() {
        let (index, _) = index(false);
        let outcome = index.lookup("deadbeef", Uuid::new_v4()).await.unwrap();
        assert!(!outcome.is_duplicate());
    }

    #[tokio::test]
    async fn test_duplicate_within_owner() {
        let (index, registry) = index(false);
        let owner = Uuid::new_v4();
        let existing = item(owner, "aa11");
        registry.create(existing.clone()).await.unwrap();
        match index.lookup("aa11", owner).await.unwrap() {
            DedupOutcome::Duplicate(canonical) => assert_eq!(canonical.id, existing.id),
            DedupOutcome::Unique => panic!("expected duplicate"),
        }
    }

    #[tokio::test]
    async fn test_other_owner_invisible_without_cross_owner() {
        let (index, registry) = index(false);
        registry.create(item(Uuid::new_v4(), "aa11")).await.unwrap();
        let outcome = index.lookup("aa11", Uuid::new_v4()).await.unwrap();
        assert!(!outcome.is_duplicate());
    }

    #[tokio::test]
    async fn test_cross_owner_matches_any_owner() {
        let (index, registry) = index(true);
        let existing = item(Uuid::new_v4(), "aa11");
        registry.create(existing.clone()).await.unwrap();
        match index.lookup("aa11", Uuid::new_v4()).await.unwrap() {
            DedupOutcome::Duplicate(canonical) => assert_eq!(canonical.id, existing.id),
            DedupOutcome::Unique => panic!("expected duplicate"),
        }
    }

    #[tokio::test]
    async fn test_soft_deleted_match_does_not_count() {
        let (index, registry) = index(false);
        let owner = Uuid::new_v4();
        let existing = item(owner, "aa11");
        registry.create(existing.clone()).await.unwrap();
        registry
            .set_lifecycle_status(existing.id, LifecycleStatus::SoftDeleted, Some(Utc::now()))
            .await
            .unwrap();
        let outcome = index.lookup("aa11", owner).await.unwrap();
        assert!(!outcome.is_duplicate());
    }

    #[tokio::test]
    async fn test_lookup_resolves_to_canonical_root() {
        let (index, registry) = index(false);
        let owner = Uuid::new_v4();
        let canonical = item(owner, "aa11");
        registry.create(canonical.clone()).await.unwrap();
        let mut copy = index.logical_copy(&canonical, owner, "again".into(), "demo.mp3".into());
        // Force the copy to be the newest match.
        copy.uploaded_at = Utc::now() + chrono::Duration::seconds(10);
        registry.create(copy).await.unwrap();
        match index.lookup("aa11", owner).await.unwrap() {
            DedupOutcome::Duplicate(found) => assert_eq!(found.id, canonical.id),
            DedupOutcome::Unique => panic!("expected duplicate"),
        }
    }

    #[tokio::test]
    async fn test_soft_deleted_copy_does_not_shadow_live_canonical() {
        let (index, registry) = index(false);
        let owner = Uuid::new_v4();
        let canonical = item(owner, "aa11");
        registry.create(canonical.clone()).await.unwrap();
        let mut copy = index.logical_copy(&canonical, owner, "again".into(), "demo.mp3".into());
        copy.uploaded_at = Utc::now() + chrono::Duration::seconds(10);
        let copy_id = copy.id;
        registry.create(copy).await.unwrap();
        registry
            .set_lifecycle_status(copy_id, LifecycleStatus::SoftDeleted, Some(Utc::now()))
            .await
            .unwrap();
        // The canonical row is still live, so the bytes still count.
        match index.lookup("aa11", owner).await.unwrap() {
            DedupOutcome::Duplicate(found) => assert_eq!(found.id, canonical.id),
            DedupOutcome::Unique => panic!("expected duplicate"),
        }
    }

    #[tokio::test]
    async fn test_logical_copy_inherits_canonical_status() {
        let (index, _) = index(false);
        let mut canonical = item(Uuid::new_v4(), "aa11");
        canonical.processing_status = ProcessingStatus::Pending;
        let copy = index.logical_copy(
            &canonical,
            Uuid::new_v4(),
            "early bird".into(),
            "demo.mp3".into(),
        );
        assert_eq!(copy.processing_status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn test_logical_copy_owns_no_bytes() {
        let (index, _) = index(false);
        let canonical = item(Uuid::new_v4(), "aa11");
        let copy = index.logical_copy(
            &canonical,
            Uuid::new_v4(),
            "shared".into(),
            "demo.mp3".into(),
        );
        assert!(!copy.owns_bytes());
        assert_eq!(copy.charged_bytes(), 0);
        assert_eq!(copy.storage_key, canonical.storage_key);
    }
}
