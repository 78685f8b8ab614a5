//! WASM-specific bindings: the browser host and the JS-facing classes.

use std::rc::Rc;

use js_sys::{Object, Reflect};
use wasm_bindgen::{JsCast, prelude::*};

use crate::backend::StorageBackend;
use crate::diagnostics::ConsoleSink;
use crate::error::StorageError;
use crate::guard::SafeStorage;
use crate::host::{Host, NativeSlot};
use crate::polyfill::install_once;
use crate::store::MemoryStorage;

const STORAGE_SLOT: &str = "localStorage";

#[wasm_bindgen]
extern "C" {
    /// Whatever object currently sits in a `localStorage` slot.
    #[derive(Debug, Clone)]
    pub type JsStorage;

    #[wasm_bindgen(method, structural, catch, js_name = getItem)]
    fn get_item(this: &JsStorage, key: &str) -> Result<Option<String>, JsValue>;

    #[wasm_bindgen(method, structural, catch, js_name = setItem)]
    fn set_item(this: &JsStorage, key: &str, value: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, structural, catch, js_name = removeItem)]
    fn remove_item(this: &JsStorage, key: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, structural, catch, js_name = clear)]
    fn clear_all(this: &JsStorage) -> Result<(), JsValue>;

    #[wasm_bindgen(method, structural, catch, getter)]
    fn length(this: &JsStorage) -> Result<u32, JsValue>;

    #[wasm_bindgen(method, structural, catch, js_name = key)]
    fn key_at(this: &JsStorage, index: u32) -> Result<Option<String>, JsValue>;
}

/// Maps a thrown JS value onto a [`StorageError`], using the DOMException
/// name where there is one.
fn js_error(op: &'static str) -> impl Fn(JsValue) -> StorageError {
    move |err| {
        let field = |name: &str| {
            Reflect::get(&err, &JsValue::from_str(name))
                .ok()
                .and_then(|v| v.as_string())
        };
        let message = field("message").unwrap_or_else(|| format!("{err:?}"));
        match field("name").as_deref() {
            Some("SecurityError") => StorageError::SecurityRestricted(message),
            Some("QuotaExceededError") => StorageError::QuotaExceeded,
            _ => StorageError::operation(op, message),
        }
    }
}

/// Adapts a JS storage object to [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct WebStorage {
    inner: JsStorage,
}

impl WebStorage {
    fn from_value(value: JsValue) -> Self {
        Self {
            inner: value.unchecked_into(),
        }
    }
}

impl StorageBackend for WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key).map_err(js_error("getItem"))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set_item(key, value).map_err(js_error("setItem"))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key).map_err(js_error("removeItem"))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear_all().map_err(js_error("clear"))
    }

    fn length(&self) -> Result<usize, StorageError> {
        self.inner
            .length()
            .map(|len| len as usize)
            .map_err(js_error("length"))
    }

    fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.inner.key_at(index).map_err(js_error("key"))
    }
}

/// Reads the storage slot off `target` and classifies it.
fn read_slot(target: &JsValue) -> Result<NativeSlot, StorageError> {
    let value = Reflect::get(target, &JsValue::from_str(STORAGE_SLOT))
        .map_err(js_error(STORAGE_SLOT))?;
    if value.is_undefined() || value.is_null() {
        return Ok(NativeSlot::Absent);
    }
    // primitives have no getItem, and Reflect.get throws on them
    if !value.is_object() && !value.is_function() {
        return Ok(NativeSlot::Malformed);
    }

    let getter = Reflect::get(&value, &JsValue::from_str("getItem"))
        .map_err(js_error(STORAGE_SLOT))?;
    if !getter.is_function() {
        return Ok(NativeSlot::Malformed);
    }
    Ok(NativeSlot::Present(Rc::new(WebStorage::from_value(value))))
}

fn assign_slot(target: &JsValue, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
    let value = JsValue::from(FallbackStorage { inner: storage });
    match Reflect::set(target, &JsValue::from_str(STORAGE_SLOT), &value) {
        Ok(true) => Ok(()),
        Ok(false) => Err(StorageError::NotConfigurable("assignment refused".into())),
        Err(err) => Err(StorageError::NotConfigurable(format!("{err:?}"))),
    }
}

/// The browser (or any JS runtime) as a [`Host`].
///
/// A `window` global marks an interactive context; otherwise `globalThis`
/// is the global execution context, as in server-side rendering on Node.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserHost;

impl BrowserHost {
    pub fn new() -> Self {
        Self
    }

    fn window(&self) -> Option<JsValue> {
        let window = Reflect::get(&js_sys::global(), &JsValue::from_str("window")).ok()?;
        if window.is_undefined() || window.is_null() {
            None
        } else {
            Some(window)
        }
    }
}

impl Host for BrowserHost {
    fn is_interactive(&self) -> bool {
        self.window().is_some()
    }

    fn has_global_context(&self) -> bool {
        !js_sys::global().is_undefined()
    }

    fn storage_slot(&self) -> Result<NativeSlot, StorageError> {
        match self.window() {
            Some(window) => read_slot(&window),
            None => Ok(NativeSlot::Absent),
        }
    }

    fn define_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        let window = self.window().ok_or(StorageError::Unavailable)?;

        let descriptor = Object::new();
        let set = |name: &str, value: &JsValue| {
            Reflect::set(&descriptor, &JsValue::from_str(name), value)
                .map_err(|err| StorageError::NotConfigurable(format!("{err:?}")))
        };
        set("value", &JsValue::from(FallbackStorage { inner: storage }))?;
        set("writable", &JsValue::TRUE)?;
        set("configurable", &JsValue::TRUE)?;

        let key = JsValue::from_str(STORAGE_SLOT);
        match Reflect::define_property::<JsValue>(window.unchecked_ref(), &key, &descriptor) {
            Ok(true) => Ok(()),
            Ok(false) => Err(StorageError::NotConfigurable("defineProperty refused".into())),
            Err(err) => Err(StorageError::NotConfigurable(format!("{err:?}"))),
        }
    }

    fn assign_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        let window = self.window().ok_or(StorageError::Unavailable)?;
        assign_slot(&window, storage)
    }

    fn global_storage(&self) -> Option<Rc<dyn StorageBackend>> {
        match read_slot(&js_sys::global()) {
            Ok(NativeSlot::Present(storage)) => Some(storage),
            _ => None,
        }
    }

    fn bind_global_storage(&self, storage: Rc<MemoryStorage>) -> Result<(), StorageError> {
        assign_slot(&js_sys::global(), storage)
    }
}

/// Coerces any JS value to text the way `String(value)` would for the
/// common cases.
fn to_text(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if value.is_null() {
        return "null".to_string();
    }
    if value.is_undefined() {
        return "undefined".to_string();
    }
    value.unchecked_ref::<Object>().to_string().into()
}

/// The in-memory store as seen from JS, shaped like `Storage`.
#[wasm_bindgen]
pub struct FallbackStorage {
    inner: Rc<MemoryStorage>,
}

#[wasm_bindgen]
impl FallbackStorage {
    #[wasm_bindgen(constructor)]
    pub fn new() -> FallbackStorage {
        FallbackStorage {
            inner: Rc::new(MemoryStorage::new()),
        }
    }

    #[wasm_bindgen(js_name = "getItem")]
    pub fn get_item(&self, key: JsValue) -> Option<String> {
        self.inner.get(&to_text(&key))
    }

    #[wasm_bindgen(js_name = "setItem")]
    pub fn set_item(&self, key: JsValue, value: JsValue) {
        self.inner.set(&to_text(&key), to_text(&value));
    }

    #[wasm_bindgen(js_name = "removeItem")]
    pub fn remove_item(&self, key: JsValue) {
        self.inner.remove(&to_text(&key));
    }

    #[wasm_bindgen(js_name = "clear")]
    pub fn clear(&self) {
        MemoryStorage::clear(&self.inner);
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> u32 {
        self.inner.len() as u32
    }

    #[wasm_bindgen(js_name = "key")]
    pub fn key(&self, index: u32) -> Option<String> {
        MemoryStorage::key(&self.inner, index as usize)
    }
}

impl Default for FallbackStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Guarded `localStorage` access for JS callers.
#[wasm_bindgen]
pub struct SafeLocalStorage {
    inner: SafeStorage<BrowserHost, ConsoleSink>,
}

#[wasm_bindgen]
impl SafeLocalStorage {
    #[wasm_bindgen(constructor)]
    pub fn new() -> SafeLocalStorage {
        SafeLocalStorage {
            inner: SafeStorage::new(BrowserHost).with_sink(ConsoleSink),
        }
    }

    #[wasm_bindgen(js_name = "getItem")]
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }

    #[wasm_bindgen(js_name = "setItem")]
    pub fn set_item(&self, key: &str, value: &str) {
        self.inner.set_item(key, value)
    }

    #[wasm_bindgen(js_name = "removeItem")]
    pub fn remove_item(&self, key: &str) {
        self.inner.remove_item(key)
    }

    #[wasm_bindgen(js_name = "clear")]
    pub fn clear(&self) {
        self.inner.clear()
    }
}

impl Default for SafeLocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the storage fallback for this JS realm, once.
/// Returns a short description of what happened.
#[wasm_bindgen(js_name = "installStorageFallback")]
pub fn install_storage_fallback() -> String {
    format!("{:?}", install_once(BrowserHost))
}

/// Installs the fallback as soon as the module is instantiated.
#[cfg(feature = "auto-install")]
#[wasm_bindgen(start)]
pub fn auto_install() {
    if install_once(BrowserHost) == crate::polyfill::InstallOutcome::Abandoned {
        log::warn!("localStorage fallback could not be installed");
    }
}
