//! Error types for the storage module.

use thiserror::Error;

/// Errors returned by object stores.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// No object under this key.
    #[error("Object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    /// Container has not been created yet.
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// Key is empty, absolute, or escapes the container.
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Backend I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Backend cannot be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}
