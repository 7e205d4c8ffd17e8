//! Shared constants and defaults.

/// Maximum accepted upload size: 5 GiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Default per-artist quota ceiling: 10 GiB.
pub const DEFAULT_QUOTA_CEILING_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Window between soft delete and irreversible purge: 30 days.
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 30 * 24 * 60 * 60;

/// Default lifetime of a signed URL: 15 minutes.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 15 * 60;

/// Poster frame is sampled at this fraction of the video duration.
pub const POSTER_FRAME_OFFSET_RATIO: f64 = 0.1;
