//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell a
//! fatal source failure from a recoverable per-item failure.

use thiserror::Error;

/// Errors that can occur while ingesting job postings.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The external source could not be reached or rejected the request
    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A raw posting is missing a field required for normalization
    #[error("cannot normalize {url}: missing {field}")]
    Normalization { url: String, field: &'static str },

    /// No rate limiter is configured for the source
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    /// Convenience constructor for source failures.
    pub fn source_unavailable(source: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap any storage backend error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
