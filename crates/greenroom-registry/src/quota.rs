//! Per-owner storage quota ledger.
//!
//! Every mutation for an owner runs under that owner's lock, so
//! concurrent uploads by one artist serialize while different artists
//! never contend. Uploads reserve first and commit after the bytes
//! land, so a crash between the two leaves a reservation that the
//! reconciliation sweep clears.

use greenroom_core::{MediaError, MediaResult, QuotaConfig, StorageRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::store::{ContentStore, QuotaStore};

pub struct QuotaLedger {
    store: Arc<dyn QuotaStore>,
    locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
    config: QuotaConfig,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn QuotaStore>, config: QuotaConfig) -> Self {
        Self {
            store,
            locks: RwLock::new(HashMap::new()),
            config,
        }
    }

    async fn owner_lock(&self, owner_id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&owner_id) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(owner_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_or_default(&self, owner_id: Uuid) -> MediaResult<StorageRecord> {
        Ok(self
            .store
            .load(owner_id)
            .await?
            .unwrap_or_else(|| StorageRecord::new(owner_id, self.config.default_ceiling)))
    }

    /// Reserve headroom before any bytes move. Fails fast when
    /// `used + reserved + requested` would exceed the ceiling.
    pub async fn reserve(&self, owner_id: Uuid, requested: u64) -> MediaResult<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(owner_id).await?;
        if record.used + record.reserved + requested > record.ceiling {
            tracing::warn!(
                owner_id = %owner_id,
                requested,
                used = record.used,
                reserved = record.reserved,
                ceiling = record.ceiling,
                "Quota reservation rejected"
            );
            return Err(MediaError::QuotaExceeded {
                owner_id,
                requested,
                used: record.used,
                ceiling: record.ceiling,
            });
        }
        record.reserved += requested;
        record.updated_at = chrono::Utc::now();
        self.store.store(record).await
    }

    /// Convert a reservation into usage once the bytes are durable.
    pub async fn commit(&self, owner_id: Uuid, reserved: u64, actual: u64) -> MediaResult<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(owner_id).await?;
        record.reserved = record.reserved.saturating_sub(reserved);
        record.used += actual;
        record.updated_at = chrono::Utc::now();
        self.store.store(record).await
    }

    /// Drop a reservation without charging (duplicate or failed upload).
    pub async fn release_reservation(&self, owner_id: Uuid, reserved: u64) -> MediaResult<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(owner_id).await?;
        record.reserved = record.reserved.saturating_sub(reserved);
        record.updated_at = chrono::Utc::now();
        self.store.store(record).await
    }

    /// Credit bytes back after a purge. Saturating: usage never goes
    /// negative even if accounting drifted.
    pub async fn release(&self, owner_id: Uuid, bytes: u64) -> MediaResult<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(owner_id).await?;
        record.used = record.used.saturating_sub(bytes);
        record.updated_at = chrono::Utc::now();
        self.store.store(record).await
    }

    /// Charge bytes that bypass the reserve/commit pair (variant
    /// outputs). Checked like a reserve: the ceiling holds even for
    /// derived bytes, so a full owner gets `QuotaExceeded` here too.
    pub async fn charge(&self, owner_id: Uuid, bytes: u64) -> MediaResult<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(owner_id).await?;
        if record.used + record.reserved + bytes > record.ceiling {
            tracing::warn!(
                owner_id = %owner_id,
                requested = bytes,
                used = record.used,
                reserved = record.reserved,
                ceiling = record.ceiling,
                "Quota charge rejected"
            );
            return Err(MediaError::QuotaExceeded {
                owner_id,
                requested: bytes,
                used: record.used,
                ceiling: record.ceiling,
            });
        }
        record.used += bytes;
        record.updated_at = chrono::Utc::now();
        self.store.store(record).await
    }

    pub async fn set_ceiling(&self, owner_id: Uuid, ceiling: u64) -> MediaResult<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(owner_id).await?;
        record.ceiling = ceiling;
        record.updated_at = chrono::Utc::now();
        self.store.store(record).await
    }

    pub async fn usage(&self, owner_id: Uuid) -> MediaResult<StorageRecord> {
        self.load_or_default(owner_id).await
    }

    /// Recompute one owner's usage from the registry and clear stale
    /// reservations. Returns the corrected record.
    pub async fn reconcile(
        &self,
        owner_id: Uuid,
        content: &dyn ContentStore,
    ) -> MediaResult<StorageRecord> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        let actual: u64 = content
            .find_by_owner(owner_id)
            .await?
            .iter()
            .map(|i| i.charged_bytes())
            .sum();
        let mut record = self.load_or_default(owner_id).await?;
        if record.used != actual || record.reserved != 0 {
            tracing::warn!(
                owner_id = %owner_id,
                recorded = record.used,
                actual,
                stale_reserved = record.reserved,
                "Quota drift corrected"
            );
        }
        record.used = actual;
        record.reserved = 0;
        record.updated_at = chrono::Utc::now();
        self.store.store(record.clone()).await?;
        Ok(record)
    }

    /// Reconcile every owner known to the registry.
    pub async fn reconcile_all(&self, content: &dyn ContentStore) -> MediaResult<usize> {
        let owners = content.owners().await?;
        let count = owners.len();
        for owner_id in owners {
            self.reconcile(owner_id, content).await?;
        }
        Ok(count)
    }
}
