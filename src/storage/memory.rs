use super::key::Key;

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("already exists: {0}")]
    AlreadyExists(Key),

    #[error("not found: {0}")]
    NotFound(Key),
}

/// A committed value. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub value: String,
}

impl Item {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Adopts a value received from a peer. Non UTF-8 payloads are refused.
    pub fn from_wire(bytes: Vec<u8>) -> Option<Self> {
        String::from_utf8(bytes).ok().map(|value| Self { value })
    }

    pub fn to_wire(&self) -> Vec<u8> {
        self.value.as_bytes().to_vec()
    }
}

/// Authoritative local map from key to item.
///
/// Writers take the lock exclusively, readers share it. Callers never see the
/// lock or a reference into the map: `get` and `get_all` hand out copies.
#[derive(Debug, Default)]
pub struct KeyedStore {
    items: RwLock<BTreeMap<Key, Item>>,
}

impl KeyedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Key, Item>> {
        // A writer that panicked cannot leave a half-built item behind, so
        // the map is still consistent.
        self.items.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Key, Item>> {
        self.items.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `item` under `key` unless the key is already taken.
    ///
    /// This is the single point where concurrent writers of the same key are
    /// serialized: exactly one caller observes `Ok`.
    pub fn put(&self, key: Key, item: Item) -> Result<(), StoreError> {
        let mut items = self.write();
        if items.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        items.insert(key, item);
        tracing::debug!("Stored {}", key);
        Ok(())
    }

    pub fn get(&self, key: &Key) -> Result<Item, StoreError> {
        self.read()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound(*key))
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.read().contains_key(key)
    }

    /// Point-in-time copy of every stored item, ordered by key bytes.
    pub fn get_all(&self) -> BTreeMap<Key, Item> {
        self.read().clone()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.read().keys().copied().collect()
    }

    pub fn delete(&self, key: &Key) {
        self.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
