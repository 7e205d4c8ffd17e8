//! Greenroom Core Library
//!
//! This crate provides the domain models, error types, configuration, and
//! signed-URL primitives shared across all greenroom components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod signer;

// Re-export commonly used types
pub use config::{
    CdnConfig, DedupConfig, LifecycleConfig, PipelineConfig, QuotaConfig, RetryConfig,
    SignerConfig, UploadLimits, VariantConfig,
};
pub use error::{LogLevel, MediaError, MediaResult};
pub use models::{
    AccessLevel, BackupLocation, BackupStatus, ContentItem, LifecycleStatus, MediaType,
    ProcessingStatus, StorageClass, StorageRecord, Variant, VariantKind, VariantStatus,
};
pub use signer::{SignedUrlClaims, SignerError, UrlSigner};
