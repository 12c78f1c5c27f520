//! macOS Keychain storage.

use security_framework::item::{ItemClass, ItemSearchOptions, Limit, SearchResult};
use security_framework::passwords::{delete_generic_password, set_generic_password};
use tracing::debug;

use crate::{SecureStorage, StorageError, StorageResult};

/// errSecItemNotFound
const ITEM_NOT_FOUND: &str = "-25300";

/// Generic-password items filed under one service name.
pub struct KeychainStorage {
    service_name: String,
}

impl KeychainStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn is_not_found(error: &security_framework::base::Error) -> bool {
        let message = error.to_string().to_lowercase();
        message.contains("not found")
            || message.contains("could not be found")
            || message.contains(ITEM_NOT_FOUND)
    }
}

impl SecureStorage for KeychainStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting keychain item");

        let _ = delete_generic_password(&self.service_name, key);
        set_generic_password(&self.service_name, key, value.as_bytes())
            .map_err(|e| StorageError::Platform(format!("Failed to set keychain item: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(service = %self.service_name, key = %key, "Getting keychain item");

        let mut search = ItemSearchOptions::new();
        search
            .class(ItemClass::generic_password())
            .service(&self.service_name)
            .account(key)
            .limit(Limit::Max(1))
            .load_data(true);

        match search.search() {
            Ok(results) => match results.into_iter().next() {
                Some(SearchResult::Data(data)) => String::from_utf8(data)
                    .map(Some)
                    .map_err(|e| StorageError::Encoding(e.to_string())),
                _ => Ok(None),
            },
            Err(e) if Self::is_not_found(&e) => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to get keychain item: {}",
                e
            ))),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");

        match delete_generic_password(&self.service_name, key) {
            Ok(()) => Ok(true),
            Err(e) if Self::is_not_found(&e) => Ok(false),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to delete keychain item: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Keychain access
    fn keychain_roundtrip() {
        let storage = KeychainStorage::new("app.chatpro.client.test").unwrap();
        let _ = storage.delete("test_key");

        storage.set("test_key", "one").unwrap();
        storage.set("test_key", "two").unwrap();
        assert_eq!(storage.get("test_key").unwrap().as_deref(), Some("two"));

        assert!(storage.delete("test_key").unwrap());
        assert!(!storage.delete("test_key").unwrap());
        assert_eq!(storage.get("test_key").unwrap(), None);
    }
}
