//! Greenroom Registry Library
//!
//! The durable side of the pipeline: content registry rows, the
//! deduplication index, and the per-owner quota ledger, all persisted
//! through narrow record-store traits so the underlying document store
//! stays opaque.

pub mod dedup;
pub mod quota;
pub mod registry;
pub mod store;

pub use dedup::DedupIndex;
pub use quota::QuotaLedger;
pub use registry::ContentRegistry;
pub use store::{ContentStore, MemoryContentStore, MemoryQuotaStore, QuotaStore};
