//! Domain models for registered content, derived variants, quota accounting,
//! and backup locations.
//!
//! Status fields are tagged enums with an explicit transition table
//! ([`LifecycleStatus::can_transition`], [`ProcessingStatus::can_transition`]);
//! callers never match on raw strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical media class of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
        }
    }
}

/// Who may fetch the content without a capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    TicketGated,
    Private,
}

impl AccessLevel {
    /// Public content is served through the CDN; everything else goes
    /// through signed URLs.
    pub fn is_public(&self) -> bool {
        matches!(self, AccessLevel::Public)
    }
}

/// Storage tier for a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Standard,
    InfrequentAccess,
    Archive,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "standard",
            StorageClass::InfrequentAccess => "infrequent_access",
            StorageClass::Archive => "archive",
        }
    }
}

/// Variant-generation state of an item as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Valid transitions. `Failed -> Processing` is allowed so a failed
    /// item can be retried without re-uploading bytes.
    pub fn can_transition(self, to: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
        )
    }
}

/// Lifecycle state of a registered item. Hard deletion removes the row
/// entirely, so there is no terminal variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Active,
    SoftDeleted,
}

impl LifecycleStatus {
    /// `SoftDeleted -> Active` is the restore path; it is additionally
    /// bounded by the grace period, which the lifecycle manager enforces.
    pub fn can_transition(self, to: LifecycleStatus) -> bool {
        use LifecycleStatus::*;
        matches!((self, to), (Active, SoftDeleted) | (SoftDeleted, Active))
    }
}

/// Generation state of a single variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum VariantStatus {
    Pending,
    Completed,
    /// The reason is kept so the variant can be retried later without
    /// touching the rest of the item.
    Failed {
        reason: String,
    },
}

/// What a variant is: a resized image, a transcoded rendition, a poster
/// frame, or derived audio artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantKind {
    Thumbnail { width: u32, height: u32 },
    VideoRendition { height: u32 },
    Poster,
    AudioRendition { bitrate_kbps: u32 },
    Waveform,
}

impl VariantKind {
    /// Path segment used in the variant's storage key, e.g. `thumbnail/480`
    /// or `video/720p`. Deterministic so prefix listing works.
    pub fn path_segment(&self) -> String {
        match self {
            VariantKind::Thumbnail { width, .. } => format!("thumbnail/{}", width),
            VariantKind::VideoRendition { height } => format!("video/{}p", height),
            VariantKind::Poster => "poster".to_string(),
            VariantKind::AudioRendition { bitrate_kbps } => format!("audio/{}k", bitrate_kbps),
            VariantKind::Waveform => "waveform".to_string(),
        }
    }
}

/// A derived artifact of a [`ContentItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub kind: VariantKind,
    pub storage_key: String,
    pub size: u64,
    pub status: VariantStatus,
    pub created_at: DateTime<Utc>,
}

impl Variant {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, VariantStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, VariantStatus::Failed { .. })
    }
}

/// State of one replicated copy in a secondary location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BackupStatus {
    Pending,
    Completed,
    Failed { reason: String },
}

/// One secondary copy of an item's primary bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupLocation {
    pub provider: String,
    pub region: String,
    pub key: String,
    pub storage_class: StorageClass,
    pub status: BackupStatus,
    pub created_at: DateTime<Utc>,
}

/// A registered media asset owned by an artist.
///
/// A duplicate item (`duplicate_of` set) never owns bytes: its storage key,
/// hash, and variants all reference the canonical item's stored objects, and
/// it is never charged against the owner's quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub media_type: MediaType,
    pub title: String,
    pub access_level: AccessLevel,
    pub original_filename: String,
    pub mime_type: String,
    pub storage_key: String,
    pub storage_class: StorageClass,
    pub url: String,
    pub content_hash: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processing_status: ProcessingStatus,
    pub lifecycle_status: LifecycleStatus,
    pub soft_deleted_at: Option<DateTime<Utc>>,
    pub purge_after: Option<DateTime<Utc>>,
    /// Canonical item id when this row is a logical copy.
    pub duplicate_of: Option<Uuid>,
    /// Priority content is backed up opportunistically right after upload.
    pub priority: bool,
    pub variants: Vec<Variant>,
    pub backups: Vec<BackupLocation>,
}

impl ContentItem {
    /// Whether this row owns the stored bytes (canonical items do,
    /// logical copies do not).
    pub fn owns_bytes(&self) -> bool {
        self.duplicate_of.is_none()
    }

    /// Bytes charged against the owner's quota: primary size plus all
    /// completed variants, zero for logical copies.
    pub fn charged_bytes(&self) -> u64 {
        if !self.owns_bytes() {
            return 0;
        }
        self.size + self.completed_variant_bytes()
    }

    pub fn completed_variant_bytes(&self) -> u64 {
        self.variants
            .iter()
            .filter(|v| v.is_completed())
            .map(|v| v.size)
            .sum()
    }

    /// Soft-deleted items are hidden from normal listings.
    pub fn is_listed(&self) -> bool {
        self.lifecycle_status == LifecycleStatus::Active
    }

    pub fn variant(&self, id: Uuid) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }
}

/// Quota Ledger entry: per-artist storage accounting.
///
/// Invariant: `used` is never negative (it is unsigned and releases
/// saturate), and `used + reserved <= ceiling` after every successful
/// reserve or charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRecord {
    pub owner_id: Uuid,
    pub ceiling: u64,
    pub used: u64,
    /// Bytes reserved by in-flight uploads, not yet committed.
    pub reserved: u64,
    pub updated_at: DateTime<Utc>,
}

impl StorageRecord {
    pub fn new(owner_id: Uuid, ceiling: u64) -> Self {
        Self {
            owner_id,
            ceiling,
            used: 0,
            reserved: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn available(&self) -> u64 {
        self.ceiling.saturating_sub(self.used + self.reserved)
    }
}
