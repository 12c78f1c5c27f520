//! Store error types.

use thiserror::Error;

/// Errors raised by an [`IdentityStore`](crate::IdentityStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A path segment was empty or contained a separator.
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// The backend refused the write (rules, constraint, injected failure).
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// The backend could not be reached or answered with a server error.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The subscription was closed before the call completed.
    #[error("Subscription closed")]
    Closed,

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the same call may succeed when repeated later.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
