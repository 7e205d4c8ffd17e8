//! Error types module
//!
//! The pipeline-wide error taxonomy. Each variant carries enough metadata
//! (code, retryability, log level) for callers to decide whether to retry
//! and how loudly to log, without matching on message strings.
//!
//! Duplicate detection is deliberately *not* an error: the dedup path
//! reports it as a normal upload outcome.

use uuid::Uuid;

/// Log level for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected rejections such as validation failures.
    Debug,
    /// Recoverable issues such as quota pressure.
    Warn,
    /// Unexpected failures.
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Quota exceeded for owner {owner_id}: requested {requested} bytes, {used}/{ceiling} used")]
    QuotaExceeded {
        owner_id: Uuid,
        requested: u64,
        used: u64,
        ceiling: u64,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Processing failed for {content_id}: {detail}")]
    ProcessingFailed { content_id: Uuid, detail: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type MediaResult<T> = Result<T, MediaError>;

impl From<anyhow::Error> for MediaError {
    fn from(err: anyhow::Error) -> Self {
        MediaError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Static metadata per variant: (error_code, retryable, log_level).
fn static_metadata(err: &MediaError) -> (&'static str, bool, LogLevel) {
    match err {
        MediaError::Validation(_) => ("VALIDATION_FAILED", false, LogLevel::Debug),
        MediaError::QuotaExceeded { .. } => ("QUOTA_EXCEEDED", false, LogLevel::Warn),
        MediaError::StorageUnavailable(_) => ("STORAGE_UNAVAILABLE", true, LogLevel::Error),
        MediaError::ProcessingFailed { .. } => ("PROCESSING_FAILED", true, LogLevel::Warn),
        MediaError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        MediaError::InvalidTransition { .. } => ("INVALID_TRANSITION", false, LogLevel::Warn),
        MediaError::Unauthorized(_) => ("UNAUTHORIZED", false, LogLevel::Debug),
        MediaError::Internal(_) => ("INTERNAL_ERROR", true, LogLevel::Error),
        MediaError::InternalWithSource { .. } => ("INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl MediaError {
    /// Machine-readable code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        static_metadata(self).0
    }

    /// Whether retrying the same operation can succeed. Validation and
    /// quota errors never become retryable until the input or quota
    /// changes.
    pub fn is_retryable(&self) -> bool {
        static_metadata(self).1
    }

    pub fn log_level(&self) -> LogLevel {
        static_metadata(self).2
    }

    /// Log this error at its declared level with structured fields.
    pub fn log(&self) {
        let code = self.error_code();
        match self.log_level() {
            LogLevel::Debug => tracing::debug!(error = %self, code, "Operation failed"),
            LogLevel::Warn => tracing::warn!(error = %self, code, "Operation failed"),
            LogLevel::Error => tracing::error!(error = %self, code, "Operation failed"),
        }
    }
}
