use thiserror::Error;

/// Failures that can occur while reconciling a resource against a remote
/// system. Parse rejections are not errors (parsers return `None`), and a
/// single item's failure must never abort its siblings.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("transient remote failure: {0}")]
    Transient(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("remote content for {path} does not match what was written")]
    VerificationMismatch { path: String },

    #[error("remote resource not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Fatal(String),
}

impl SyncError {
    /// Transient failures are retried with backoff; everything else is
    /// reported and left for the next reconciliation cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Transient(_) | SyncError::RateLimited { .. }
        )
    }
}

/// Startup configuration problems. These are the only errors allowed to be
/// fatal to the whole process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
