//! Storage usage analytics and cost estimation.
//!
//! Read-only aggregation over the registry and the quota ledger. Cost
//! figures come from a per-class rate card and are estimates for
//! dashboards, not billing.

use chrono::{Duration, Utc};
use greenroom_core::{MediaResult, StorageClass};
use greenroom_registry::{ContentRegistry, QuotaLedger};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;

/// Days in Standard class after which an item becomes an archive
/// candidate.
const ARCHIVE_CANDIDATE_AGE_DAYS: i64 = 90;

/// Fraction of the ceiling above which quota pressure is flagged.
const QUOTA_PRESSURE_RATIO: f64 = 0.8;

/// Monthly price per GiB for each storage class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCard {
    pub standard_per_gib: f64,
    pub infrequent_access_per_gib: f64,
    pub archive_per_gib: f64,
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            standard_per_gib: 0.023,
            infrequent_access_per_gib: 0.0125,
            archive_per_gib: 0.004,
        }
    }
}

impl RateCard {
    pub fn rate(&self, class: StorageClass) -> f64 {
        match class {
            StorageClass::Standard => self.standard_per_gib,
            StorageClass::InfrequentAccess => self.infrequent_access_per_gib,
            StorageClass::Archive => self.archive_per_gib,
        }
    }
}

/// Suggested action for an owner's footprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Old Standard-class item that would be cheaper in the archive tier.
    ArchiveCandidate {
        content_id: Uuid,
        bytes: u64,
        estimated_monthly_savings: f64,
    },
    /// The owner is close to their ceiling.
    QuotaPressure { used: u64, ceiling: u64 },
}

/// Per-owner usage aggregate. The breakdown maps are keyed by the
/// enum's string form so the report serializes cleanly to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub owner_id: Uuid,
    pub item_count: usize,
    pub total_bytes: u64,
    pub bytes_by_class: HashMap<String, u64>,
    pub items_by_type: HashMap<String, usize>,
    pub quota_used: u64,
    pub quota_ceiling: u64,
    pub estimated_monthly_cost: f64,
    pub recommendations: Vec<Recommendation>,
}

pub struct UsageAnalytics {
    registry: ContentRegistry,
    quota: Arc<QuotaLedger>,
    rates: RateCard,
}

impl UsageAnalytics {
    pub fn new(registry: ContentRegistry, quota: Arc<QuotaLedger>, rates: RateCard) -> Self {
        Self {
            registry,
            quota,
            rates,
        }
    }

    /// Build the usage report for one owner.
    pub async fn report(&self, owner_id: Uuid) -> MediaResult<UsageReport> {
        let items = self.registry.list_active(owner_id).await?;
        let record = self.quota.usage(owner_id).await?;
        let archive_cutoff = Utc::now() - Duration::days(ARCHIVE_CANDIDATE_AGE_DAYS);

        let mut bytes_by_class: HashMap<String, u64> = HashMap::new();
        let mut items_by_type: HashMap<String, usize> = HashMap::new();
        let mut total_bytes = 0u64;
        let mut cost = 0f64;
        let mut recommendations = Vec::new();

        for item in &items {
            *items_by_type
                .entry(item.media_type.as_str().to_string())
                .or_insert(0) += 1;
            let charged = item.charged_bytes();
            if charged == 0 {
                // Logical copies cost nothing; the canonical item pays.
                continue;
            }
            total_bytes += charged;
            *bytes_by_class
                .entry(item.storage_class.as_str().to_string())
                .or_insert(0) += item.size;
            cost += (item.size as f64 / BYTES_PER_GIB) * self.rates.rate(item.storage_class);
            for variant in &item.variants {
                if variant.is_completed() {
                    *bytes_by_class
                        .entry(StorageClass::Standard.as_str().to_string())
                        .or_insert(0) += variant.size;
                    cost += (variant.size as f64 / BYTES_PER_GIB)
                        * self.rates.rate(StorageClass::Standard);
                }
            }

            if item.storage_class == StorageClass::Standard && item.uploaded_at < archive_cutoff {
                let savings = (item.size as f64 / BYTES_PER_GIB)
                    * (self.rates.rate(StorageClass::Standard)
                        - self.rates.rate(StorageClass::Archive));
                recommendations.push(Recommendation::ArchiveCandidate {
                    content_id: item.id,
                    bytes: item.size,
                    estimated_monthly_savings: savings,
                });
            }
        }

        if record.ceiling > 0
            && record.used as f64 / record.ceiling as f64 >= QUOTA_PRESSURE_RATIO
        {
            recommendations.push(Recommendation::QuotaPressure {
                used: record.used,
                ceiling: record.ceiling,
            });
        }

        Ok(UsageReport {
            owner_id,
            item_count: items.len(),
            total_bytes,
            bytes_by_class,
            items_by_type,
            quota_used: record.used,
            quota_ceiling: record.ceiling,
            estimated_monthly_cost: cost,
            recommendations,
        })
    }
}
