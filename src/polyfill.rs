//! Environment-aware storage fallback.
//!
//! [`Polyfill::install`] makes sure the host's storage slot holds something
//! that works. Broken or missing host storage is swapped for a
//! [`MemoryStorage`]; a server process gets one bound to its global context.
//! Installation never fails: the worst case is that nothing changes.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::StorageError;
use crate::host::{Host, NativeSlot};
use crate::store::MemoryStorage;

/// Key read when probing host storage. Its value is never used.
pub const DEFAULT_PROBE_KEY: &str = "test";

/// Why the host's storage was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceReason {
    /// The slot was empty.
    Missing,
    /// The slot held something without a `get` operation.
    Malformed,
    /// The slot looked right but failed when read.
    ProbeFailed,
}

/// What [`Polyfill::install`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Neither an interactive nor a global context exists.
    NoEnvironment,
    /// A fallback was bound to the global context.
    GlobalBound,
    /// The global context already had a store that passed the probe.
    GlobalKept,
    /// The host's own storage passed the probe and was left alone.
    NativeKept,
    /// The slot was redefined to hold a fallback.
    Replaced(ReplaceReason),
    /// Redefining failed; the fallback was assigned directly.
    Assigned,
    /// Every way of installing failed. Nothing changed.
    Abandoned,
    /// [`install_once`] already ran in this execution context.
    AlreadyInstalled,
}

impl InstallOutcome {
    /// Whether a new fallback store now sits in a slot.
    pub fn installed_fallback(&self) -> bool {
        matches!(self, Self::GlobalBound | Self::Replaced(_) | Self::Assigned)
    }
}

/// Installs a fallback store into a [`Host`] when needed.
#[derive(Debug, Clone)]
pub struct Polyfill<H> {
    host: H,
    probe_key: String,
    quota: Option<usize>,
}

impl<H: Host> Polyfill<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            probe_key: DEFAULT_PROBE_KEY.to_string(),
            quota: None,
        }
    }

    /// Sets the key read when probing host storage.
    pub fn with_probe_key(mut self, key: &str) -> Self {
        self.probe_key = key.to_string();
        self
    }

    /// Caps the fallback store at `bytes` of key and value text.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Checks the host and installs a fallback where required.
    pub fn install(&self) -> InstallOutcome {
        if !self.host.is_interactive() {
            return self.install_global();
        }

        match self.replace_if_broken() {
            Ok(outcome) => {
                log::debug!("storage install: {outcome:?}");
                outcome
            }
            Err(err) => {
                log::debug!("storage slot could not be redefined ({err}), assigning instead");
                self.assign()
            }
        }
    }

    fn fallback(&self) -> Rc<MemoryStorage> {
        let store = MemoryStorage::new();
        Rc::new(match self.quota {
            Some(bytes) => store.with_quota(bytes),
            None => store,
        })
    }

    fn install_global(&self) -> InstallOutcome {
        if !self.host.has_global_context() {
            log::debug!("storage install: no interactive or global context");
            return InstallOutcome::NoEnvironment;
        }
        if let Some(existing) = self.host.global_storage() {
            match existing.get_item(&self.probe_key) {
                Ok(_) => return InstallOutcome::GlobalKept,
                Err(err) => log::debug!("global storage probe failed: {err}"),
            }
        }

        match self.host.bind_global_storage(self.fallback()) {
            Ok(()) => {
                log::debug!("storage install: bound in-memory store to global context");
                InstallOutcome::GlobalBound
            }
            Err(err) => {
                log::warn!("storage install abandoned: {err}");
                InstallOutcome::Abandoned
            }
        }
    }

    fn replace_if_broken(&self) -> Result<InstallOutcome, StorageError> {
        let reason = match self.host.storage_slot()? {
            NativeSlot::Absent => ReplaceReason::Missing,
            NativeSlot::Malformed => ReplaceReason::Malformed,
            NativeSlot::Present(storage) => match storage.get_item(&self.probe_key) {
                Ok(_) => return Ok(InstallOutcome::NativeKept),
                Err(err) => {
                    log::debug!("storage probe failed: {err}");
                    ReplaceReason::ProbeFailed
                }
            },
        };

        self.host.define_storage(self.fallback())?;
        Ok(InstallOutcome::Replaced(reason))
    }

    fn assign(&self) -> InstallOutcome {
        match self.host.assign_storage(self.fallback()) {
            Ok(()) => InstallOutcome::Assigned,
            Err(err) => {
                log::warn!("storage install abandoned: {err}");
                InstallOutcome::Abandoned
            }
        }
    }
}

thread_local! {
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Runs [`Polyfill::install`] with default settings the first time it is
/// called in this execution context. Later calls return
/// [`InstallOutcome::AlreadyInstalled`] without touching the host.
pub fn install_once<H: Host>(host: H) -> InstallOutcome {
    if INSTALLED.with(|flag| flag.replace(true)) {
        return InstallOutcome::AlreadyInstalled;
    }
    Polyfill::new(host).install()
}
