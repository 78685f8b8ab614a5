//! Installer and accessor scenarios against a scripted host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::{
    Host, InstallOutcome, MemorySink, MemoryStorage, NativeSlot, Polyfill, ProcessHost,
    ReplaceReason, SafeStorage, StorageBackend, StorageError, install_once,
};

/// Storage that throws on every call, like a privacy-mode browser.
struct BrokenStorage;

impl StorageBackend for BrokenStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::SecurityRestricted("access denied".into()))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::SecurityRestricted("access denied".into()))
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::SecurityRestricted("access denied".into()))
    }

    fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::SecurityRestricted("access denied".into()))
    }

    fn length(&self) -> Result<usize, StorageError> {
        Err(StorageError::SecurityRestricted("access denied".into()))
    }

    fn key(&self, _index: usize) -> Result<Option<String>, StorageError> {
        Err(StorageError::SecurityRestricted("access denied".into()))
    }
}

/// Storage that reads fine but rejects every write.
#[derive(Default)]
struct FullStorage {
    inner: MemoryStorage,
}

impl StorageBackend for FullStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::QuotaExceeded)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key)
    }

    fn clear(&self) -> Result<(), StorageError> {
        StorageBackend::clear(&self.inner)
    }

    fn length(&self) -> Result<usize, StorageError> {
        self.inner.length()
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        StorageBackend::key(&self.inner, index)
    }
}

#[derive(Default)]
struct ScriptedHost {
    interactive: bool,
    global: bool,
    slot_unreadable: bool,
    define_fails: bool,
    assign_fails: bool,
    bind_fails: bool,
    slot: RefCell<Option<NativeSlot>>,
    global_store: RefCell<Option<Rc<dyn StorageBackend>>>,
    defines: Cell<u32>,
    assigns: Cell<u32>,
}

impl ScriptedHost {
    fn browser(slot: NativeSlot) -> Self {
        Self {
            interactive: true,
            global: true,
            slot: RefCell::new(Some(slot)),
            ..Self::default()
        }
    }

    fn server() -> Self {
        Self {
            global: true,
            ..Self::default()
        }
    }

    fn working() -> (Self, Rc<MemoryStorage>) {
        let native = Rc::new(MemoryStorage::new());
        (Self::browser(NativeSlot::Present(native.clone())), native)
    }

    fn current(&self) -> Rc<dyn StorageBackend> {
        match self.slot.borrow().clone() {
            Some(NativeSlot::Present(storage)) => storage,
            other => panic!("expected a present slot, got {other:?}"),
        }
    }
}

impl Host for ScriptedHost {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn has_global_context(&self) -> bool {
        self.global
    }

    fn storage_slot(&self) -> Result<NativeSlot, StorageError> {
        if self.slot_unreadable {
            return Err(StorageError::SecurityRestricted("slot getter threw".into()));
        }
        Ok(self.slot.borrow().clone().unwrap_or(NativeSlot::Absent))
    }

    fn define_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        self.defines.set(self.defines.get() + 1);
        if self.define_fails {
            return Err(StorageError::NotConfigurable("non-configurable".into()));
        }
        *self.slot.borrow_mut() = Some(NativeSlot::Present(storage));
        Ok(())
    }

    fn assign_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        self.assigns.set(self.assigns.get() + 1);
        if self.assign_fails {
            return Err(StorageError::NotConfigurable("read-only".into()));
        }
        *self.slot.borrow_mut() = Some(NativeSlot::Present(storage));
        Ok(())
    }

    fn global_storage(&self) -> Option<Rc<dyn StorageBackend>> {
        self.global_store.borrow().clone()
    }

    fn bind_global_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        if self.bind_fails {
            return Err(StorageError::NotConfigurable("global is frozen".into()));
        }
        *self.global_store.borrow_mut() = Some(storage as Rc<dyn StorageBackend>);
        Ok(())
    }
}

#[test]
fn test_missing_storage_gets_fallback() {
    let host = ScriptedHost::browser(NativeSlot::Absent);
    let outcome = Polyfill::new(&host).install();
    assert_eq!(outcome, InstallOutcome::Replaced(ReplaceReason::Missing));
    assert!(outcome.installed_fallback());

    let storage = SafeStorage::new(&host);
    storage.set_item("a", "1");
    assert_eq!(storage.get_item("a").as_deref(), Some("1"));
}

#[test]
fn test_broken_storage_is_replaced() {
    let host = ScriptedHost::browser(NativeSlot::Present(Rc::new(BrokenStorage)));
    let outcome = Polyfill::new(&host).install();
    assert_eq!(outcome, InstallOutcome::Replaced(ReplaceReason::ProbeFailed));

    let sink = MemorySink::new();
    let storage = SafeStorage::new(&host).with_sink(&sink);
    storage.set_item("a", "1");
    storage.set_item("b", "2");
    assert_eq!(storage.get_item("b").as_deref(), Some("2"));

    storage.clear();
    assert_eq!(host.current().length().unwrap(), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_malformed_slot_is_replaced() {
    let host = ScriptedHost::browser(NativeSlot::Malformed);
    assert_eq!(
        Polyfill::new(&host).install(),
        InstallOutcome::Replaced(ReplaceReason::Malformed)
    );
    assert_eq!(host.defines.get(), 1);
    assert_eq!(host.assigns.get(), 0);
}

#[test]
fn test_working_storage_is_kept() {
    let (host, native) = ScriptedHost::working();
    native.set("existing", "value");

    assert_eq!(Polyfill::new(&host).install(), InstallOutcome::NativeKept);
    assert_eq!(host.defines.get(), 0);

    let storage = SafeStorage::new(&host);
    assert_eq!(storage.get_item("existing").as_deref(), Some("value"));
    storage.set_item("new", "entry");
    assert_eq!(native.get("new").as_deref(), Some("entry"));
}

#[test]
fn test_reinstall_keeps_installed_fallback() {
    let host = ScriptedHost::browser(NativeSlot::Absent);
    let polyfill = Polyfill::new(&host);
    assert!(polyfill.install().installed_fallback());

    let storage = SafeStorage::new(&host);
    storage.set_item("a", "1");

    assert_eq!(polyfill.install(), InstallOutcome::NativeKept);
    assert_eq!(storage.get_item("a").as_deref(), Some("1"));
    assert_eq!(host.defines.get(), 1);
}

#[test]
fn test_define_failure_falls_back_to_assignment() {
    let host = ScriptedHost {
        define_fails: true,
        ..ScriptedHost::browser(NativeSlot::Present(Rc::new(BrokenStorage)))
    };
    assert_eq!(Polyfill::new(&host).install(), InstallOutcome::Assigned);
    assert_eq!(host.assigns.get(), 1);

    let storage = SafeStorage::new(&host);
    storage.set_item("a", "1");
    assert_eq!(storage.get_item("a").as_deref(), Some("1"));
}

#[test]
fn test_unreadable_slot_falls_back_to_assignment() {
    let host = ScriptedHost {
        slot_unreadable: true,
        ..ScriptedHost::browser(NativeSlot::Absent)
    };
    assert_eq!(Polyfill::new(&host).install(), InstallOutcome::Assigned);
    assert_eq!(host.defines.get(), 0);
}

#[test]
fn test_install_gives_up_silently() {
    let host = ScriptedHost {
        define_fails: true,
        assign_fails: true,
        ..ScriptedHost::browser(NativeSlot::Present(Rc::new(BrokenStorage)))
    };
    let outcome = Polyfill::new(&host).install();
    assert_eq!(outcome, InstallOutcome::Abandoned);
    assert!(!outcome.installed_fallback());

    // the broken store is still bound; the accessor absorbs its failures
    let sink = MemorySink::new();
    let storage = SafeStorage::new(&host).with_sink(&sink);
    assert_eq!(storage.get_item("a"), None);
    storage.set_item("a", "1");
    storage.remove_item("a");
    storage.clear();

    let operations: Vec<String> = sink.reports().into_iter().map(|(op, _)| op).collect();
    assert_eq!(operations, vec!["getItem", "setItem", "removeItem", "clear"]);
    assert!(matches!(
        sink.reports()[0].1,
        StorageError::SecurityRestricted(_)
    ));
}

#[test]
fn test_server_binds_global_store_once() {
    let host = ScriptedHost::server();
    let polyfill = Polyfill::new(&host);
    assert_eq!(polyfill.install(), InstallOutcome::GlobalBound);

    host.global_storage().unwrap().set_item("k", "v").unwrap();
    assert_eq!(polyfill.install(), InstallOutcome::GlobalKept);
    assert_eq!(
        host.global_storage().unwrap().get_item("k").unwrap().as_deref(),
        Some("v")
    );
    assert_eq!(host.defines.get() + host.assigns.get(), 0);
}

#[test]
fn test_server_replaces_broken_global_store() {
    let host = ScriptedHost::server();
    *host.global_store.borrow_mut() = Some(Rc::new(BrokenStorage));

    assert_eq!(Polyfill::new(&host).install(), InstallOutcome::GlobalBound);

    let global = host.global_storage().unwrap();
    global.set_item("k", "v").unwrap();
    assert_eq!(global.get_item("k").unwrap().as_deref(), Some("v"));
}

#[test]
fn test_server_bind_failure_is_absorbed() {
    let host = ScriptedHost {
        bind_fails: true,
        ..ScriptedHost::server()
    };
    assert_eq!(Polyfill::new(&host).install(), InstallOutcome::Abandoned);
}

#[test]
fn test_no_environment_at_all() {
    let host = ScriptedHost::default();
    assert_eq!(Polyfill::new(&host).install(), InstallOutcome::NoEnvironment);
    assert!(host.global_storage().is_none());
}

#[test]
fn test_non_interactive_accessor_is_a_no_op() {
    let host = ScriptedHost::server();
    Polyfill::new(&host).install();

    let sink = MemorySink::new();
    let storage = SafeStorage::new(&host).with_sink(&sink);
    assert_eq!(storage.get_item("x"), None);
    storage.set_item("x", "1");
    storage.remove_item("x");
    storage.clear();

    assert_eq!(storage.get_item("x"), None);
    assert_eq!(host.global_storage().unwrap().length().unwrap(), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_process_host_accessor_is_a_no_op() {
    let host = ProcessHost::new();
    host.reset();
    assert_eq!(Polyfill::new(host).install(), InstallOutcome::GlobalBound);

    let storage = SafeStorage::new(host);
    storage.set_item("x", "1");
    assert_eq!(storage.get_item("x"), None);
    assert!(host.bound().unwrap().is_empty());
    host.reset();
}

#[test]
fn test_install_once_runs_once_per_context() {
    std::thread::spawn(|| {
        let host = ScriptedHost::browser(NativeSlot::Absent);
        assert_eq!(
            install_once(&host),
            InstallOutcome::Replaced(ReplaceReason::Missing)
        );
        assert_eq!(install_once(&host), InstallOutcome::AlreadyInstalled);
        assert_eq!(host.defines.get(), 1);
    })
    .join()
    .unwrap();
}

#[test]
fn test_absent_storage_is_reported() {
    let host = ScriptedHost::browser(NativeSlot::Absent);
    let sink = MemorySink::new();
    let storage = SafeStorage::new(&host).with_sink(&sink);

    assert_eq!(storage.get_item("a"), None);
    assert_eq!(sink.reports(), vec![("getItem".to_string(), StorageError::Unavailable)]);
}

#[test]
fn test_quota_failure_is_reported() {
    let host = ScriptedHost::browser(NativeSlot::Present(Rc::new(FullStorage::default())));
    assert_eq!(Polyfill::new(&host).install(), InstallOutcome::NativeKept);

    let sink = MemorySink::new();
    let storage = SafeStorage::new(&host).with_sink(&sink);
    storage.set_item("big", "value");

    assert_eq!(storage.get_item("big"), None);
    assert_eq!(
        sink.reports(),
        vec![("setItem".to_string(), StorageError::QuotaExceeded)]
    );
}

#[test]
fn test_remove_missing_key_is_silent() {
    let (host, _native) = ScriptedHost::working();
    let sink = MemorySink::new();
    let storage = SafeStorage::new(&host).with_sink(&sink);

    storage.remove_item("never-written");
    assert!(sink.is_empty());
}

#[test]
fn test_empty_value_reads_back_as_empty() {
    let host = ScriptedHost::browser(NativeSlot::Absent);
    Polyfill::new(&host).install();

    let storage = SafeStorage::new(&host);
    storage.set_item("e", "");
    assert_eq!(storage.get_item("e").as_deref(), Some(""));
    assert_eq!(storage.get_item("missing"), None);
}

#[test]
fn test_clear_removes_every_written_key() {
    let (host, native) = ScriptedHost::working();
    let storage = SafeStorage::new(&host);
    let keys = ["a", "b", "c"];
    for key in keys {
        storage.set_item(key, "v");
    }
    assert_eq!(native.len(), 3);

    storage.clear();
    for key in keys {
        assert_eq!(storage.get_item(key), None);
    }
}

#[test]
fn test_namespace_functionality() {
    let (host, native) = ScriptedHost::working();
    native.set("other", "kept");

    let storage = SafeStorage::new(&host).with_namespace("app1");
    storage.set_item("username", "alice");
    storage.set_item("count", "42");

    assert_eq!(native.get("app1:username").as_deref(), Some("alice"));
    assert_eq!(storage.get_item("username").as_deref(), Some("alice"));

    storage.clear();
    assert_eq!(native.keys(), vec!["other".to_string()]);
}

#[test]
fn test_fallback_quota_applies() {
    let host = ScriptedHost::browser(NativeSlot::Absent);
    Polyfill::new(&host).with_quota(4).install();

    let storage = SafeStorage::new(&host);
    storage.set_item("a", "1");
    storage.set_item("long", "value");

    assert_eq!(storage.get_item("a").as_deref(), Some("1"));
    assert_eq!(storage.get_item("long"), None);
}

#[test]
fn test_custom_probe_key() {
    let (host, native) = ScriptedHost::working();
    let polyfill = Polyfill::new(&host).with_probe_key("__probe__");
    assert_eq!(polyfill.install(), InstallOutcome::NativeKept);
    assert!(native.is_empty());
}

#[cfg(feature = "serde")]
#[test]
fn test_typed_values() {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Prefs {
        theme: String,
        font_size: u8,
    }

    let (host, native) = ScriptedHost::working();
    let sink = MemorySink::new();
    let storage = SafeStorage::new(&host).with_sink(&sink);

    let prefs = Prefs {
        theme: "dark".into(),
        font_size: 14,
    };
    storage.set_typed("prefs", &prefs);
    assert_eq!(storage.get_typed::<Prefs>("prefs"), Some(prefs));

    native.set("prefs", "{not json");
    assert_eq!(storage.get_typed::<Prefs>("prefs"), None);
    assert!(matches!(
        sink.reports().as_slice(),
        [(op, StorageError::Serialization(_))] if op == "getItem"
    ));
}

#[cfg(feature = "serde")]
#[test]
fn test_typed_values_on_server() {
    let host = ScriptedHost::server();
    let storage = SafeStorage::new(&host);
    storage.set_typed("n", &1u32);
    assert_eq!(storage.get_typed::<u32>("n"), None);
}
