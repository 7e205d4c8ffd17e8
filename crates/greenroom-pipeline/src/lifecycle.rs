//! Lifecycle management: soft delete, restore, purge, and backups.
//!
//! Soft delete is reversible inside the grace period; the sweep turns
//! due items into hard deletes. Hard delete is idempotent: a missing
//! row means the work is already done. Primary bytes are only removed
//! when no other registry row still references the storage key, so
//! deleting a logical copy never strands its canonical siblings.

use chrono::{DateTime, Duration, Utc};
use greenroom_core::{
    BackupLocation, BackupStatus, ContentItem, LifecycleConfig, LifecycleStatus, MediaError,
    MediaResult,
};
use greenroom_registry::{ContentRegistry, QuotaLedger};
use greenroom_storage::{keys, ObjectStore};
use std::sync::Arc;
use uuid::Uuid;

use crate::cdn::CdnDistributor;

/// Outcome of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub purged: usize,
    pub purge_failures: usize,
    pub backed_up: usize,
}

pub struct LifecycleManager {
    store: Arc<dyn ObjectStore>,
    backup_store: Arc<dyn ObjectStore>,
    registry: ContentRegistry,
    quota: Arc<QuotaLedger>,
    cdn: Arc<CdnDistributor>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        backup_store: Arc<dyn ObjectStore>,
        registry: ContentRegistry,
        quota: Arc<QuotaLedger>,
        cdn: Arc<CdnDistributor>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            backup_store,
            registry,
            quota,
            cdn,
            config,
        }
    }

    /// Hide the item and start the grace clock.
    pub async fn soft_delete(&self, content_id: Uuid) -> MediaResult<ContentItem> {
        let purge_after = Utc::now() + Duration::seconds(self.config.grace_period_secs);
        let item = self
            .registry
            .set_lifecycle_status(content_id, LifecycleStatus::SoftDeleted, Some(purge_after))
            .await?;
        tracing::info!(
            content_id = %content_id,
            purge_after = %purge_after,
            "Content soft-deleted"
        );
        self.cdn.invalidate(&item).await;
        Ok(item)
    }

    /// Bring a soft-deleted item back, only inside the grace period.
    /// Past the grace the item is as good as gone even if the sweep has
    /// not caught up yet.
    pub async fn restore(&self, content_id: Uuid) -> MediaResult<ContentItem> {
        let item = self.registry.get(content_id).await?;
        if item.lifecycle_status == LifecycleStatus::SoftDeleted {
            if let Some(purge_after) = item.purge_after {
                if purge_after <= Utc::now() {
                    return Err(MediaError::NotFound(format!(
                        "content item {} (grace period elapsed)",
                        content_id
                    )));
                }
            }
        }
        let item = self
            .registry
            .set_lifecycle_status(content_id, LifecycleStatus::Active, None)
            .await?;
        tracing::info!(content_id = %content_id, "Content restored");
        self.cdn.publish(&item).await;
        Ok(item)
    }

    /// Irreversibly remove an item: owned bytes, variants, backups, CDN
    /// state, quota charge, and finally the registry row.
    ///
    /// Returns `false` when the row was already gone. Safe to call
    /// repeatedly; a second call after success releases nothing twice.
    pub async fn hard_delete(&self, content_id: Uuid) -> MediaResult<bool> {
        let Some(item) = self.registry.try_get(content_id).await? else {
            tracing::debug!(content_id = %content_id, "Hard delete of missing item is a no-op");
            return Ok(false);
        };

        for variant in &item.variants {
            self.store
                .delete(&variant.storage_key)
                .await
                .map_err(|e| MediaError::StorageUnavailable(e.to_string()))?;
        }

        // The key may be shared with logical copies (or, for a copy,
        // with its canonical item). Only the last surviving reference
        // takes the bytes with it.
        let references = self.registry.references_to_key(&item.storage_key).await?;
        if references <= 1 {
            self.store
                .delete(&item.storage_key)
                .await
                .map_err(|e| MediaError::StorageUnavailable(e.to_string()))?;
        } else {
            tracing::info!(
                content_id = %content_id,
                key = %item.storage_key,
                references,
                "Primary bytes retained, still referenced"
            );
        }

        for backup in &item.backups {
            self.backup_store
                .delete(&backup.key)
                .await
                .map_err(|e| MediaError::StorageUnavailable(e.to_string()))?;
        }

        self.cdn.invalidate(&item).await;
        self.quota
            .release(item.owner_id, item.charged_bytes())
            .await?;
        self.registry.remove(content_id).await?;

        tracing::info!(
            content_id = %content_id,
            owner_id = %item.owner_id,
            released_bytes = item.charged_bytes(),
            "Content hard-deleted"
        );
        Ok(true)
    }

    /// Copy an item's primary bytes to the secondary location and record
    /// the result. Failures are recorded on the item and logged; the
    /// primary copy stays available regardless.
    pub async fn backup(&self, content_id: Uuid) -> MediaResult<()> {
        let item = self.registry.get(content_id).await?;
        if !item.owns_bytes() {
            return Ok(());
        }
        let backup_key = keys::backup_key(&self.config.backup_region, &item.storage_key);
        let location = BackupLocation {
            provider: self.config.backup_provider.clone(),
            region: self.config.backup_region.clone(),
            key: backup_key.clone(),
            storage_class: self.config.backup_storage_class,
            status: BackupStatus::Pending,
            created_at: Utc::now(),
        };
        self.registry.add_backup(content_id, location).await?;

        let result = async {
            let data = self.store.get(&item.storage_key).await?;
            self.backup_store
                .put(
                    &backup_key,
                    data,
                    &item.mime_type,
                    self.config.backup_storage_class,
                )
                .await
        }
        .await;

        match result {
            Ok(_) => {
                self.registry
                    .set_backup_status(content_id, &backup_key, BackupStatus::Completed)
                    .await?;
                tracing::info!(
                    content_id = %content_id,
                    backup_key = %backup_key,
                    size_bytes = item.size,
                    "Backup completed"
                );
                Ok(())
            }
            Err(e) => {
                self.registry
                    .set_backup_status(
                        content_id,
                        &backup_key,
                        BackupStatus::Failed {
                            reason: e.to_string(),
                        },
                    )
                    .await?;
                tracing::warn!(
                    content_id = %content_id,
                    backup_key = %backup_key,
                    error = %e,
                    "Backup failed, will retry on a later sweep"
                );
                Ok(())
            }
        }
    }

    /// Purge items whose grace period elapsed and back up priority
    /// content that has no completed backup yet.
    pub async fn sweep(&self, now: DateTime<Utc>) -> MediaResult<SweepReport> {
        let mut report = SweepReport::default();

        for item in self.registry.purge_due(now).await? {
            match self.hard_delete(item.id).await {
                Ok(true) => report.purged += 1,
                Ok(false) => {}
                Err(e) => {
                    report.purge_failures += 1;
                    tracing::error!(
                        content_id = %item.id,
                        error = %e,
                        "Purge failed, leaving item for the next sweep"
                    );
                }
            }
        }

        for item in self.registry.missing_backups().await? {
            if !item.priority {
                continue;
            }
            // Pending/Failed entries from earlier attempts are replaced.
            self.backup(item.id).await?;
            report.backed_up += 1;
        }

        tracing::info!(
            purged = report.purged,
            purge_failures = report.purge_failures,
            backed_up = report.backed_up,
            "Lifecycle sweep finished"
        );
        Ok(report)
    }
}
