//! Huginn error types

use std::time::Duration;

use crate::usage::Denial;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // User-visible errors
    #[error("admission denied ({}): {}", .0.reason, .0.message)]
    AdmissionDenied(Denial),

    /// Error raised by the analysis backend, propagated verbatim.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("backend call timed out after {0:?}")]
    BackendTimeout(Duration),

    // Dependency errors (recovered locally, never surfaced by the gateway)
    #[error("store '{store}' error: {message}")]
    Store { store: String, message: String },

    #[error("store '{store}' timed out after {after:?}")]
    StoreTimeout { store: String, after: Duration },

    #[error("signature error: {0}")]
    Signature(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HuginnError {
    /// Build a store error from any displayable cause.
    pub fn store(store: impl Into<String>, message: impl std::fmt::Display) -> Self {
        HuginnError::Store {
            store: store.into(),
            message: message.to_string(),
        }
    }

    /// Whether the failure is worth retrying by the caller.
    ///
    /// Dependency hiccups and timeouts are transient. Denials, backend
    /// errors and configuration problems are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HuginnError::Store { .. }
                | HuginnError::StoreTimeout { .. }
                | HuginnError::BackendTimeout(_)
        )
    }

    /// The structured denial, if this is an admission failure.
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            HuginnError::AdmissionDenied(denial) => Some(denial),
            _ => None,
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for HuginnError {
    fn from(err: redis::RedisError) -> Self {
        HuginnError::store("redis", err)
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
