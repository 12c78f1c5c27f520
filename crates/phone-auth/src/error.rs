//! Authentication error types.

use identity_store::StoreError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Local input was rejected before any provider or store call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The provider could not issue a challenge
    #[error("Auth provider error: {0}")]
    AuthProvider(String),

    /// The submitted code was not accepted
    #[error("Invalid verification code: {0}")]
    InvalidCode(String),

    /// A required record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// A signed-in session was required
    #[error("Not signed in: {0}")]
    NotReady(String),

    /// Identity store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential storage error
    #[error("Secure storage error: {0}")]
    Storage(#[from] secure_storage::StorageError),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Store(e) => e.is_transient(),
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
