//! Process-local storage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{SecureStorage, StorageResult};

/// Keeps entries in memory. Clones share entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySecureStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySecureStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SecureStorage for MemorySecureStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}
