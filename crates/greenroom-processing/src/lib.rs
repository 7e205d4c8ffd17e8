//! Greenroom Processing Library
//!
//! Stateless transformers over bytes: streaming content hashing, upload
//! validation, and variant planning/generation. Nothing here touches the
//! registry or the object store; orchestration lives in the pipeline
//! crate.

pub mod hasher;
pub mod validator;
pub mod variants;

pub use hasher::{hash_bytes, hash_stream, ContentHasher};
pub use validator::{
    classify_media_type, UploadValidator, ValidationError, ValidationReport, Violation,
};
pub use variants::media::{
    AudioProbe, MediaProber, StaticProber, StubTranscoder, Transcoder, VideoProbe,
};
pub use variants::VariantPlan;
