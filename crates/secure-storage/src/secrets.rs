//! Session token API over a [`SecureStorage`].

use std::fmt;
use std::sync::Arc;

use crate::{SecureStorage, StorageKeys, StorageResult};

/// An access/refresh token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Reads and writes the signed-in user's tokens.
#[derive(Clone)]
pub struct SessionSecrets {
    storage: Arc<dyn SecureStorage>,
}

impl SessionSecrets {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    pub fn store(&self, tokens: &SessionTokens) -> StorageResult<()> {
        self.storage
            .set(StorageKeys::ACCESS_TOKEN, &tokens.access_token)?;
        self.storage
            .set(StorageKeys::REFRESH_TOKEN, &tokens.refresh_token)
    }

    /// Both tokens, or `None` if either is missing.
    pub fn load(&self) -> StorageResult<Option<SessionTokens>> {
        let access = self.storage.get(StorageKeys::ACCESS_TOKEN)?;
        let refresh = self.storage.get(StorageKeys::REFRESH_TOKEN)?;
        Ok(match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Some(SessionTokens {
                access_token,
                refresh_token,
            }),
            _ => None,
        })
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::ACCESS_TOKEN)?;
        self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
        Ok(())
    }
}

impl fmt::Debug for SessionSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSecrets").finish_non_exhaustive()
    }
}
