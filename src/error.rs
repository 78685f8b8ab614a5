//! Error types for storage operations.
//!
//! These errors never escape the public accessor or the installer; they are
//! carried between a host backend and the diagnostic sink.

/// The one failure kind a storage host can produce: the underlying operation
/// did not complete. Variants describe why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The host exposes no usable storage slot.
    Unavailable,
    /// The host refused access (privacy mode, cross-origin frame, disabled storage).
    SecurityRestricted(String),
    /// The write would exceed the host's storage quota.
    QuotaExceeded,
    /// The storage slot could not be redefined or assigned.
    NotConfigurable(String),
    /// Any other failure raised by a storage operation.
    Operation {
        op: &'static str,
        message: String,
    },
    /// A typed value could not be converted to or from its text form.
    Serialization(String),
}

impl StorageError {
    /// Shorthand for an [`StorageError::Operation`] failure.
    pub fn operation(op: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            op,
            message: message.into(),
        }
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage is unavailable"),
            Self::SecurityRestricted(msg) => write!(f, "storage access denied: {msg}"),
            Self::QuotaExceeded => write!(f, "storage quota exceeded"),
            Self::NotConfigurable(msg) => write!(f, "storage slot not configurable: {msg}"),
            Self::Operation { op, message } => write!(f, "{op} failed: {message}"),
            Self::Serialization(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}
