//! Error types for the Atrium assistant.
//!
//! This module defines a unified error enum covering every failure category
//! in the pipeline: configuration, ingestion, embedding, storage, and the
//! external completion service.
//!
//! Note that there is deliberately no `PermissionDenied` variant. Lack of
//! access to a document yields empty retrieval results, so permission state
//! is never observable through an error message.

use thiserror::Error;

/// Unified error type for the Atrium pipeline.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid chunking or pipeline configuration. Fatal; the caller must
    /// fix the configuration before retrying.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Text extraction cannot handle the given file format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Network or auth failure while fetching a source file.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The embedding backend errored or is unreachable.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The completion service is unreachable or returned a server error.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The completion service rejected the request due to rate limiting.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// An external call exceeded its configured timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Vector store or conversation store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error represents a transient external-service fault.
    ///
    /// Transient errors are eligible for bounded exponential backoff; all
    /// other variants are surfaced to the caller immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingUnavailable(_)
                | AppError::ServiceUnavailable(_)
                | AppError::RateLimited(_)
                | AppError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
