//! # safestore
//!
//! Key-value storage access that never fails, for applications rendered both
//! on a server and in a browser.
//!
//! Two pieces work together:
//!
//! - [`Polyfill`] checks the host once at startup. If the browser's storage
//!   is missing, malformed, or throws when read, it is replaced with an
//!   in-memory [`MemoryStorage`]. A server process gets a `MemoryStorage`
//!   bound to its global context instead.
//! - [`SafeStorage`] guards each call site: outside a browser every
//!   operation is a no-op, and inside one any failure is reported to a
//!   [`DiagnosticSink`] rather than returned.
//!
//! ```
//! use safestore::{InstallOutcome, Polyfill, ProcessHost, SafeStorage};
//!
//! let outcome = Polyfill::new(ProcessHost::new()).install();
//! assert!(matches!(outcome, InstallOutcome::GlobalBound | InstallOutcome::GlobalKept));
//!
//! // No window on a server: reads come back empty, writes do nothing.
//! let storage = SafeStorage::new(ProcessHost::new());
//! storage.set_item("theme", "dark");
//! assert_eq!(storage.get_item("theme"), None);
//! ```
//!
//! ## Features
//!
//! - `serde` (default): typed JSON access through `get_typed` / `set_typed`.
//! - `wasm`: [`BrowserHost`](wasm::BrowserHost) and the JS-facing classes.
//! - `auto-install`: run the installer when the WASM module starts.

mod backend;
mod diagnostics;
mod error;
mod guard;
mod host;
mod polyfill;
mod store;

#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(test)]
mod tests;

pub use backend::StorageBackend;
#[cfg(feature = "wasm")]
pub use diagnostics::ConsoleSink;
pub use diagnostics::{DiagnosticSink, LogSink, MemorySink};
pub use error::StorageError;
pub use guard::SafeStorage;
pub use host::{Host, NativeSlot, ProcessHost};
pub use polyfill::{DEFAULT_PROBE_KEY, InstallOutcome, Polyfill, ReplaceReason, install_once};
pub use store::MemoryStorage;
