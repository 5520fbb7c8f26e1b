//! HSM client errors

use thiserror::Error;

/// Errors that can occur when interacting with the HSM API
#[derive(Debug, Error)]
pub enum HsmError {
    /// HTTP request/response error (connection refused, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HSM returned a non-success status
    #[error("HSM API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., empty component ID)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl HsmError {
    /// Whether the error is a 404-style miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether retrying the request may succeed.
    ///
    /// Transport failures and 5xx responses are transient; 4xx responses and
    /// decode failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
