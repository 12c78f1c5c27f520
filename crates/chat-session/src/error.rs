//! Chat error types.

use identity_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the directory and conversation APIs.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Local input was rejected; nothing was written
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The durable write failed. `text` is the message that was not sent.
    #[error("Failed to send message: {reason}")]
    SendFailed { text: String, reason: String },

    /// The session was signed out or never reached Ready
    #[error("Not signed in")]
    NotAuthenticated,

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ChatError {
    /// The unsent text carried by a failed send.
    pub fn unsent_text(&self) -> Option<&str> {
        match self {
            ChatError::SendFailed { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Result type alias using ChatError.
pub type ChatResult<T> = Result<T, ChatError>;
