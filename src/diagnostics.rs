//! Side channel for failures the accessor absorbs.

use std::cell::RefCell;

use crate::error::StorageError;

/// Receives every storage failure that was swallowed instead of returned.
pub trait DiagnosticSink {
    /// `operation` is the accessor operation name, such as `"getItem"`.
    fn report(&self, operation: &str, error: &StorageError);
}

/// Forwards diagnostics to the `log` facade at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, operation: &str, error: &StorageError) {
        log::warn!("storage.{operation} failed: {error}");
    }
}

/// Forwards diagnostics to the browser console.
#[cfg(feature = "wasm")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[cfg(feature = "wasm")]
impl DiagnosticSink for ConsoleSink {
    fn report(&self, operation: &str, error: &StorageError) {
        web_sys::console::warn_2(
            &format!("localStorage.{operation} failed:").into(),
            &error.to_string().into(),
        );
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: RefCell<Vec<(String, StorageError)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far, oldest first.
    pub fn reports(&self) -> Vec<(String, StorageError)> {
        self.reports.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.reports.borrow_mut().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, operation: &str, error: &StorageError) {
        if let Ok(mut reports) = self.reports.try_borrow_mut() {
            reports.push((operation.to_string(), error.clone()));
        }
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for std::rc::Rc<S> {
    fn report(&self, operation: &str, error: &StorageError) {
        (**self).report(operation, error)
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn report(&self, operation: &str, error: &StorageError) {
        (**self).report(operation, error)
    }
}
