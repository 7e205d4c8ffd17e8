//! Greenroom Pipeline Library
//!
//! Orchestration over the core/storage/processing/registry crates: the
//! upload flow, the background variant worker, the lifecycle manager
//! (soft delete, restore, purge sweep, backups), CDN distribution, and
//! usage analytics. All collaborators are injected through constructors;
//! nothing here reaches for globals.

pub mod access;
pub mod analytics;
pub mod cdn;
pub mod lifecycle;
pub mod telemetry;
pub mod upload;
pub mod worker;

pub use access::{AccessChecker, AllowAll, UrlIssuer};
pub use analytics::{RateCard, Recommendation, UsageAnalytics, UsageReport};
pub use cdn::{CdnDistributor, EdgeCache, MockEdgeCache};
pub use lifecycle::{LifecycleManager, SweepReport};
pub use telemetry::init_telemetry;
pub use upload::{MediaPipeline, UploadOutcome, UploadRequest};
pub use worker::{VariantEngine, VariantWorker};
