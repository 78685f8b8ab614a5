//! Guarded storage accessor.
//!
//! `SafeStorage` wraps every storage call in an environment check and a
//! failure guard. Outside an interactive host all operations are no-ops;
//! inside one, failures are reported to a [`DiagnosticSink`] and the caller
//! gets `None` or nothing. No operation here returns an error.

use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Serialize, de::DeserializeOwned};

use crate::backend::StorageBackend;
use crate::diagnostics::{DiagnosticSink, LogSink};
use crate::error::StorageError;
use crate::host::{Host, NativeSlot};

/// Call-site safe access to a host's storage slot.
#[derive(Debug, Clone)]
pub struct SafeStorage<H, S = LogSink> {
    host: H,
    sink: S,
    namespace: String,
}

impl<H: Host> SafeStorage<H> {
    /// Creates an accessor that logs absorbed failures through `log`.
    pub fn new(host: H) -> Self {
        Self {
            host,
            sink: LogSink,
            namespace: String::new(),
        }
    }
}

impl<H: Host, S: DiagnosticSink> SafeStorage<H, S> {
    /// Routes absorbed failures to `sink` instead.
    pub fn with_sink<T: DiagnosticSink>(self, sink: T) -> SafeStorage<H, T> {
        SafeStorage {
            host: self.host,
            sink,
            namespace: self.namespace,
        }
    }

    /// Sets a namespace prefix for all keys.
    /// Keys will be automatically prefixed when stored and accessed.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = if namespace.is_empty() {
            String::new()
        } else if namespace.ends_with(':') {
            namespace.to_string()
        } else {
            format!("{namespace}:")
        };
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn namespaced_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn storage(&self) -> Result<Rc<dyn StorageBackend>, StorageError> {
        match self.host.storage_slot()? {
            NativeSlot::Present(storage) => Ok(storage),
            NativeSlot::Absent => Err(StorageError::Unavailable),
            NativeSlot::Malformed => Err(StorageError::operation(
                "resolve",
                "storage slot has no getItem",
            )),
        }
    }

    /// Runs `call` against the host storage, or returns `None` when there is
    /// no interactive host or the call failed.
    fn guarded<T>(
        &self,
        operation: &str,
        call: impl FnOnce(&dyn StorageBackend) -> Result<T, StorageError>,
    ) -> Option<T> {
        if !self.host.is_interactive() {
            return None;
        }

        match self.storage().and_then(|storage| call(&*storage)) {
            Ok(value) => Some(value),
            Err(err) => {
                self.sink.report(operation, &err);
                None
            }
        }
    }

    /// Returns the value stored under `key`.
    pub fn get_item(&self, key: &str) -> Option<String> {
        let key = self.namespaced_key(key);
        self.guarded("getItem", |storage| storage.get_item(&key))
            .flatten()
    }

    /// Stores `value` under `key`.
    pub fn set_item(&self, key: &str, value: &str) {
        let key = self.namespaced_key(key);
        self.guarded("setItem", |storage| storage.set_item(&key, value));
    }

    /// Removes `key`.
    pub fn remove_item(&self, key: &str) {
        let key = self.namespaced_key(key);
        self.guarded("removeItem", |storage| storage.remove_item(&key));
    }

    /// Removes every entry, or with a namespace set, every entry in it.
    pub fn clear(&self) {
        if self.namespace.is_empty() {
            self.guarded("clear", |storage| storage.clear());
            return;
        }

        self.guarded("clear", |storage| {
            let mut doomed = Vec::new();
            for index in 0..storage.length()? {
                if let Some(key) = storage.key(index)? {
                    if key.starts_with(&self.namespace) {
                        doomed.push(key);
                    }
                }
            }
            for key in doomed {
                storage.remove_item(&key)?;
            }
            Ok(())
        });
    }

    /// Reads and deserializes a JSON value.
    /// Values that fail to parse are reported and read as `None`.
    #[cfg(feature = "serde")]
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_item(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                self.sink.report("getItem", &StorageError::from(err));
                None
            }
        }
    }

    /// Serializes `value` as JSON and stores it.
    #[cfg(feature = "serde")]
    pub fn set_typed<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if !self.host.is_interactive() {
            return;
        }
        match serde_json::to_string(value) {
            Ok(raw) => self.set_item(key, &raw),
            Err(err) => self.sink.report("setItem", &StorageError::from(err)),
        }
    }
}
