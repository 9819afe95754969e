//! In-memory key-value store

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{validate_key, KeyValueStore};
use crate::error::StoreError;

/// Process-local store backed by a concurrent map
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<(String, String), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn map_key(namespace: &str, key: &str) -> Result<(String, String), StoreError> {
    validate_key(key)?;
    Ok((namespace.to_string(), key.to_string()))
}

impl KeyValueStore for MemoryStore {
    fn create_if_absent(&self, namespace: &str, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        match self.entries.entry(map_key(namespace, key)?) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(true)
            }
        }
    }

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(map_key(namespace, key)?, value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .get(&map_key(namespace, key)?)
            .map(|v| v.value().clone()))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.entries.remove(&map_key(namespace, key)?);
        Ok(())
    }
}
