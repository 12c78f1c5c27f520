//! Credential storage for the chat client.
//!
//! Session tokens live in the platform store:
//! - **macOS**: Keychain via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//! - **Windows**: Credential Vault via `windows`
//!
//! [`MemorySecureStorage`] keeps values in process memory for tests and
//! embedders that bring their own persistence.

mod keys;
mod memory;
mod secrets;
mod traits;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows_vault;

pub use keys::StorageKeys;
pub use memory::MemorySecureStorage;
pub use secrets::{SessionSecrets, SessionTokens};
pub use traits::SecureStorage;

use std::sync::Arc;

use thiserror::Error;

/// Service name all entries are filed under.
pub const SERVICE_NAME: &str = "app.chatpro.client";

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The platform's credential store.
pub fn create_storage() -> StorageResult<Arc<dyn SecureStorage>> {
    #[cfg(target_os = "macos")]
    {
        let storage = macos::KeychainStorage::new(SERVICE_NAME)?;
        Ok(Arc::new(storage))
    }

    #[cfg(target_os = "linux")]
    {
        let storage = linux::SecretServiceStorage::new(SERVICE_NAME)?;
        Ok(Arc::new(storage))
    }

    #[cfg(target_os = "windows")]
    {
        let storage = windows_vault::CredentialStorage::new(SERVICE_NAME)?;
        Ok(Arc::new(storage))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(StorageError::Platform(
            "No secure storage implementation available for this platform".to_string(),
        ))
    }
}
