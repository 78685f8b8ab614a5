//! In-memory fallback store.
//!
//! `MemoryStorage` is what gets installed when the host has no working
//! storage facility, and what servers use as their process-wide store. It has
//! the same shape as the host facility but none of its operations can fail.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::backend::StorageBackend;
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Inner {
    data: BTreeMap<String, String>,
    used_bytes: usize,
}

/// A non-persistent key-value store with the Web Storage contract.
///
/// Data lives as long as the value does. Iteration order, and therefore
/// [`key`](MemoryStorage::key), follows key order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RefCell<Inner>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create an empty store with no quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the store to `bytes` of key and value text.
    /// Writes that would go over the limit are dropped.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Returns the value for `key`, or `None` if it is absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.try_borrow().ok()?;
        inner.data.get(key).cloned()
    }

    /// Stores the text form of `value` under `key`.
    pub fn set(&self, key: &str, value: impl ToString) {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return;
        };
        let value = value.to_string();

        let previous = inner.data.get(key).map_or(0, |old| key.len() + old.len());
        let needed = inner.used_bytes - previous + key.len() + value.len();
        if let Some(quota) = self.quota
            && needed > quota
        {
            log::debug!("memory storage quota of {quota} bytes reached, dropping write to {key:?}");
            return;
        }

        inner.used_bytes = needed;
        inner.data.insert(key.to_string(), value);
    }

    /// Removes `key` if present.
    pub fn remove(&self, key: &str) -> bool {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return false;
        };
        match inner.data.remove(key) {
            Some(old) => {
                inner.used_bytes -= key.len() + old.len();
                true
            }
            None => false,
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.data.clear();
            inner.used_bytes = 0;
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.try_borrow().map_or(0, |inner| inner.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the key at `index`, or `None` when out of range.
    pub fn key(&self, index: usize) -> Option<String> {
        let inner = self.inner.try_borrow().ok()?;
        inner.data.keys().nth(index).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .try_borrow()
            .is_ok_and(|inner| inner.data.contains_key(key))
    }

    /// Returns all keys in iteration order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .try_borrow()
            .map(|inner| inner.data.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns all keys that start with the given prefix.
    pub fn list_keys(&self, prefix: &str) -> Vec<String> {
        self.inner
            .try_borrow()
            .map(|inner| {
                inner
                    .data
                    .keys()
                    .filter(|key| key.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes every key that starts with `prefix`, returning how many went.
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return 0;
        };
        let mut freed = 0;
        let before = inner.data.len();
        inner.data.retain(|key, value| {
            let keep = !key.starts_with(prefix);
            if !keep {
                freed += key.len() + value.len();
            }
            keep
        });
        inner.used_bytes -= freed;
        before - inner.data.len()
    }

    /// Bytes of key and value text currently held.
    pub fn used_bytes(&self) -> usize {
        self.inner.try_borrow().map_or(0, |inner| inner.used_bytes)
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set(key, value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        MemoryStorage::clear(self);
        Ok(())
    }

    fn length(&self) -> Result<usize, StorageError> {
        Ok(self.len())
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(MemoryStorage::key(self, index))
    }
}
