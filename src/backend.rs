//! The host storage facility contract.

use std::rc::Rc;

use crate::error::StorageError;

/// A key-value storage facility shaped like the Web Storage API.
///
/// Every method may fail: hosts with storage disabled or restricted raise on
/// any call, not just on writes. Implementations that cannot fail (such as
/// [`MemoryStorage`](crate::MemoryStorage)) simply always return `Ok`.
pub trait StorageBackend {
    /// Returns the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every entry.
    fn clear(&self) -> Result<(), StorageError>;

    /// Number of stored entries.
    fn length(&self) -> Result<usize, StorageError>;

    /// The key at `index` in the current iteration order.
    fn key(&self, index: usize) -> Result<Option<String>, StorageError>;
}

impl<T: StorageBackend + ?Sized> StorageBackend for Rc<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }

    fn length(&self) -> Result<usize, StorageError> {
        (**self).length()
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        (**self).key(index)
    }
}
