//! Shared key/value space.
//!
//! Extensions coordinate through the [`Space`]: one extension stores a value
//! under a well-known key and others (or the bot itself) check for it. The
//! permissions extension, for example, announces itself by writing its
//! settings under `_STANDARD_PERMISSIONS_`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Cloneable handle to a shared JSON key/value store.
#[derive(Clone, Default, Debug)]
pub struct Space {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl Space {
    /// Creates an empty space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn has(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Deserialises the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent and `Err` when the stored
    /// value has the wrong shape.
    pub fn get_as<T>(&self, key: &str) -> serde_json::Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.inner.read().get(key) {
            Some(value) => T::deserialize(value).map(Some),
            None => Ok(None),
        }
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.write().insert(key.into(), value)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key)
    }

    /// Returns all keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
