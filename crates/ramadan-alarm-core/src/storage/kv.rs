use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// String blob storage keyed by name.
///
/// A `set_item` either replaces the whole value or leaves the old one in
/// place; partial writes are not observable.
pub trait KeyValueStore: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set_item(key, value)
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryKv {
    items: Mutex<HashMap<String, String>>,
    read_only: bool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated with `key = value`.
    pub fn with_item(key: &str, value: &str) -> Self {
        let kv = Self::default();
        if let Ok(mut items) = kv.items.lock() {
            items.insert(key.to_string(), value.to_string());
        }
        kv
    }

    /// Every write fails with `WriteFailed`.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl KeyValueStore for MemoryKv {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Locked)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                message: "store is read-only".into(),
            });
        }
        let mut items = self.items.lock().map_err(|_| StoreError::Locked)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
