//! Error types for polystore
//!
//! Every public operation in this crate reports failure through
//! [`StorageError`] rather than panicking. Conditions with a defined
//! idempotent outcome (removing an absent file, creating an existing
//! bucket directory) are normalized to success by the adapters and never
//! surface here.

use thiserror::Error;

/// Main error type for storage operations
///
/// The enum is `Clone` so that a construction-time configuration error can
/// be stored on the adapter and replayed on every subsequent call
/// (fail-once, fail-consistently).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Configuration is malformed or missing a required field
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend type tag does not match any registered adapter
    #[error("unsupported storage type: {0}")]
    UnsupportedType(String),

    /// An operation was attempted before `init()`
    #[error("adapter is not initialized; call init() first")]
    NotInitialized,

    /// The connectivity self-test failed; credentials or endpoint are suspect
    #[error("configuration suspect: {0}")]
    ConfigurationSuspect(String),

    /// A file or bucket was absent where presence was required
    #[error("not found: {0}")]
    NotFound(String),

    /// A resolved path would leave the bucket root
    #[error("path escapes storage root: {0}")]
    PathEscape(String),

    /// Underlying filesystem or network failure, message preserved verbatim
    #[error("I/O failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<object_store::Error> for StorageError {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::Io(other.to_string()),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StorageError>;
