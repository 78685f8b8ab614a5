//! Host environment abstraction.
//!
//! A host decides whether there is an interactive surface (a browser window)
//! and owns the storage slot the rest of the application reads from. The
//! installer and the guarded accessor only ever talk to a [`Host`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::store::MemoryStorage;

/// What a host's storage slot currently holds.
#[derive(Clone)]
pub enum NativeSlot {
    /// Nothing is bound.
    Absent,
    /// Something is bound but it does not expose a `get` operation.
    Malformed,
    /// A storage facility with the expected shape.
    Present(Rc<dyn StorageBackend>),
}

impl NativeSlot {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl core::fmt::Debug for NativeSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Absent => write!(f, "Absent"),
            Self::Malformed => write!(f, "Malformed"),
            Self::Present(_) => write!(f, "Present(..)"),
        }
    }
}

/// The execution environment the storage lives in.
pub trait Host {
    /// Whether an interactive (window-like) context exists.
    fn is_interactive(&self) -> bool;

    /// Whether a non-interactive global execution context exists.
    fn has_global_context(&self) -> bool;

    /// Reads the interactive context's storage slot.
    ///
    /// Reading can itself fail on hosts that guard the slot behind a security
    /// check.
    fn storage_slot(&self) -> Result<NativeSlot, StorageError>;

    /// Replaces the storage slot with `storage`, leaving the slot writable
    /// and reconfigurable.
    fn define_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError>;

    /// Replaces the storage slot by plain assignment.
    fn assign_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError>;

    /// The store bound to the global execution context, if any.
    fn global_storage(&self) -> Option<Rc<dyn StorageBackend>>;

    /// Binds `storage` to the global execution context.
    fn bind_global_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError>;
}

impl<H: Host + ?Sized> Host for &H {
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }

    fn has_global_context(&self) -> bool {
        (**self).has_global_context()
    }

    fn storage_slot(&self) -> Result<NativeSlot, StorageError> {
        (**self).storage_slot()
    }

    fn define_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        (**self).define_storage(storage)
    }

    fn assign_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        (**self).assign_storage(storage)
    }

    fn global_storage(&self) -> Option<Rc<dyn StorageBackend>> {
        (**self).global_storage()
    }

    fn bind_global_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        (**self).bind_global_storage(storage)
    }
}

thread_local! {
    static GLOBAL_STORAGE: RefCell<Option<Rc<MemoryStorage>>> = const { RefCell::new(None) };
}

/// The native, non-interactive host: a server process.
///
/// There is no window, so [`storage_slot`](Host::storage_slot) is always
/// absent and the interactive replacement steps are refused. The global
/// execution context is per thread, matching the single-threaded model where
/// each execution context gets its own store.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessHost;

impl ProcessHost {
    pub fn new() -> Self {
        Self
    }

    /// The store bound to this thread's global context, if any.
    pub fn bound(&self) -> Option<Rc<MemoryStorage>> {
        GLOBAL_STORAGE.with(|slot| slot.borrow().clone())
    }

    /// Unbinds this thread's global store.
    pub fn reset(&self) {
        GLOBAL_STORAGE.with(|slot| slot.borrow_mut().take());
    }
}

impl Host for ProcessHost {
    fn is_interactive(&self) -> bool {
        false
    }

    fn has_global_context(&self) -> bool {
        true
    }

    fn storage_slot(&self) -> Result<NativeSlot, StorageError> {
        Ok(NativeSlot::Absent)
    }

    fn define_storage(&self, _storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        Err(StorageError::NotConfigurable("no window in a server process".into()))
    }

    fn assign_storage(&self, _storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        Err(StorageError::NotConfigurable("no window in a server process".into()))
    }

    fn global_storage(&self) -> Option<Rc<dyn StorageBackend>> {
        self.bound().map(|store| store as Rc<dyn StorageBackend>)
    }

    fn bind_global_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        GLOBAL_STORAGE.with(|slot| {
            let mut slot = slot
                .try_borrow_mut()
                .map_err(|e| StorageError::NotConfigurable(e.to_string()))?;
            *slot = Some(storage);
            Ok(())
        })
    }
}
