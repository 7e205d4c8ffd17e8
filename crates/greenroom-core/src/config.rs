//! Configuration module
//!
//! Explicit per-component configuration structs, each with documented
//! defaults and a `validate()` run once at construction. The top-level
//! [`PipelineConfig`] aggregates them and can be loaded from the
//! environment.

use std::env;

use crate::constants::{
    DEFAULT_GRACE_PERIOD_SECS, DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_QUOTA_CEILING_BYTES,
    DEFAULT_SIGNED_URL_TTL_SECS, POSTER_FRAME_OFFSET_RATIO,
};

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Upload validation limits.
#[derive(Clone, Debug)]
pub struct UploadLimits {
    /// Hard ceiling on upload size in bytes.
    pub max_file_size: u64,
    /// When set, a mime/extension mismatch rejects the upload instead of
    /// logging a warning.
    pub strict_mime: bool,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE_BYTES,
            strict_mime: false,
        }
    }
}

/// Deduplication policy.
#[derive(Clone, Debug, Default)]
pub struct DedupConfig {
    /// Allow dedup hits across owners. Off by default: a cross-tenant hit
    /// leaks whether another tenant already holds the same bytes.
    pub cross_owner: bool,
}

/// Bounded retry policy for store and CDN calls.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with cap for the given zero-based attempt.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        (self.base_delay_ms.saturating_mul(1_u64 << attempt.min(20))).min(self.max_delay_ms)
    }
}

/// Variant generation ladders and worker sizing.
#[derive(Clone, Debug)]
pub struct VariantConfig {
    /// Image rendition widths, largest first. Entries wider than the
    /// source are skipped.
    pub thumbnail_widths: Vec<u32>,
    /// Video rendition heights; only heights <= the source's native
    /// height are generated.
    pub video_rendition_heights: Vec<u32>,
    /// Audio rendition bitrates in kbit/s; only bitrates <= the source's
    /// native bitrate are generated.
    pub audio_bitrates_kbps: Vec<u32>,
    /// Generate waveform peaks for audio uploads.
    pub waveform: bool,
    /// Fraction of the video duration at which the poster frame is taken.
    pub poster_offset_ratio: f64,
    /// Parallel variant jobs across items. Per-item runs are always
    /// serialized regardless of this value.
    pub max_concurrent_jobs: usize,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            thumbnail_widths: vec![1024, 480, 150],
            video_rendition_heights: vec![1080, 720, 480, 240],
            audio_bitrates_kbps: vec![128, 64],
            waveform: true,
            poster_offset_ratio: POSTER_FRAME_OFFSET_RATIO,
            max_concurrent_jobs: 4,
        }
    }
}

/// Quota Ledger defaults.
#[derive(Clone, Debug)]
pub struct QuotaConfig {
    /// Ceiling assigned to owners without an explicit entry.
    pub default_ceiling: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_ceiling: DEFAULT_QUOTA_CEILING_BYTES,
        }
    }
}

/// Lifecycle manager timings and backup target.
#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    /// Seconds between soft delete and irreversible purge.
    pub grace_period_secs: i64,
    /// Secondary location descriptor recorded on backup copies.
    pub backup_provider: String,
    pub backup_region: String,
    /// Tier used for backup copies.
    pub backup_storage_class: crate::models::StorageClass,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            backup_provider: "secondary".to_string(),
            backup_region: "eu-central-1".to_string(),
            backup_storage_class: crate::models::StorageClass::InfrequentAccess,
        }
    }
}

/// CDN distribution settings.
#[derive(Clone, Debug)]
pub struct CdnConfig {
    pub enabled: bool,
    pub retry: RetryConfig,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RetryConfig::default(),
        }
    }
}

/// Signed URL settings.
#[derive(Clone, Debug)]
pub struct SignerConfig {
    pub secret: String,
    pub default_ttl_secs: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            default_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }
}

/// Aggregate configuration for the whole pipeline.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub limits: UploadLimits,
    pub dedup: DedupConfig,
    pub retry: RetryConfig,
    pub variants: VariantConfig,
    pub quota: QuotaConfig,
    pub lifecycle: LifecycleConfig,
    pub cdn: CdnConfig,
    pub signer: SignerConfig,
}

impl PipelineConfig {
    /// Load configuration from `GREENROOM_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            limits: UploadLimits {
                max_file_size: env_parsed(
                    "GREENROOM_MAX_FILE_SIZE_BYTES",
                    defaults.limits.max_file_size,
                ),
                strict_mime: env_parsed("GREENROOM_STRICT_MIME", defaults.limits.strict_mime),
            },
            dedup: DedupConfig {
                cross_owner: env_parsed("GREENROOM_DEDUP_CROSS_OWNER", false),
            },
            retry: RetryConfig {
                max_attempts: env_parsed(
                    "GREENROOM_STORE_RETRY_ATTEMPTS",
                    defaults.retry.max_attempts,
                ),
                base_delay_ms: env_parsed(
                    "GREENROOM_STORE_RETRY_BASE_MS",
                    defaults.retry.base_delay_ms,
                ),
                max_delay_ms: env_parsed(
                    "GREENROOM_STORE_RETRY_MAX_MS",
                    defaults.retry.max_delay_ms,
                ),
            },
            quota: QuotaConfig {
                default_ceiling: env_parsed(
                    "GREENROOM_DEFAULT_QUOTA_BYTES",
                    defaults.quota.default_ceiling,
                ),
            },
            lifecycle: LifecycleConfig {
                grace_period_secs: env_parsed(
                    "GREENROOM_GRACE_PERIOD_SECS",
                    defaults.lifecycle.grace_period_secs,
                ),
                backup_provider: env::var("GREENROOM_BACKUP_PROVIDER")
                    .unwrap_or(defaults.lifecycle.backup_provider),
                backup_region: env::var("GREENROOM_BACKUP_REGION")
                    .unwrap_or(defaults.lifecycle.backup_region),
                backup_storage_class: defaults.lifecycle.backup_storage_class,
            },
            signer: SignerConfig {
                secret: env::var("GREENROOM_SIGNING_SECRET").unwrap_or_default(),
                default_ttl_secs: env_parsed(
                    "GREENROOM_SIGNED_URL_TTL_SECS",
                    defaults.signer.default_ttl_secs,
                ),
            },
            variants: defaults.variants,
            cdn: defaults.cdn,
        }
    }

    /// Validate once at construction; later code assumes these hold.
    pub fn validate(&self) -> Result<(), String> {
        if self.limits.max_file_size == 0 {
            return Err("max_file_size must be positive".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry max_attempts must be at least 1".to_string());
        }
        if self.lifecycle.grace_period_secs < 0 {
            return Err("grace_period_secs must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.variants.poster_offset_ratio) {
            return Err("poster_offset_ratio must be within [0, 1]".to_string());
        }
        if self.variants.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_retry() {
        let mut cfg = PipelineConfig::default();
        cfg.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_poster_offset() {
        let mut cfg = PipelineConfig::default();
        cfg.variants.poster_offset_ratio = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_backoff_is_bounded() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_ms(0), 200);
        assert_eq!(retry.backoff_ms(1), 400);
        assert_eq!(retry.backoff_ms(10), 5_000);
        assert_eq!(retry.backoff_ms(63), 5_000);
    }
}
