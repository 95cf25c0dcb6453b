//! Trait definitions for the storage module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Listing entry for a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A flat key/value object store organised in containers.
///
/// Writes overwrite. A write into a missing container fails with
/// [`StorageError::ContainerNotFound`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Create the container if it does not exist.
    async fn ensure_container(&self, container: &str) -> Result<(), StorageError>;

    /// Write an object, returning its location.
    async fn write(
        &self,
        container: &str,
        key: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    /// Read an object.
    async fn read(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// List objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;
}

/// Reject keys that are empty, absolute, or contain `.`/`..`/empty segments.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");

    if invalid {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}
