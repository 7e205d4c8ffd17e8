//! Greenroom Storage Library
//!
//! Object store abstraction and implementations: the [`ObjectStore`] trait,
//! an S3 backend, an in-memory backend for tests, and a bounded-retry
//! wrapper that turns exhausted transient failures into
//! `StorageError::Unavailable`.
//!
//! # Storage key format
//!
//! Primary objects: `{owner_id}/{timestamp}_{random}_{sanitized_name}.{ext}`.
//! Derived variants live under the item prefix (the primary key minus its
//! extension): `{item_prefix}/{kind}/{quality-or-size}.{ext}`. Backups use
//! `backup/{region}/{primary_key}`. Keys must not contain `..` or a leading
//! `/`; generation is centralized in the `keys` module.

pub mod keys;
pub mod memory;
pub mod retry;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use memory::InMemoryStore;
pub use retry::RetryingStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3Store;
pub use traits::{ObjectStore, StorageError, StorageResult};
