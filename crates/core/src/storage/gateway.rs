//! Container-bound access to an object store.

use std::sync::Arc;
use tracing::info;

use super::error::StorageError;
use super::traits::{ObjectInfo, ObjectStore};

/// An [`ObjectStore`] bound to one container.
///
/// Writes that hit a missing container create it and retry once.
#[derive(Clone)]
pub struct StoreGateway {
    store: Arc<dyn ObjectStore>,
    container: String,
}

impl StoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn ensure_container(&self) -> Result<(), StorageError> {
        self.store.ensure_container(&self.container).await
    }

    /// Write an object, creating the container if needed. Returns the location.
    pub async fn write(
        &self,
        key: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        match self
            .store
            .write(&self.container, key, content_type, bytes)
            .await
        {
            Err(StorageError::ContainerNotFound(_)) => {
                info!(container = %self.container, "Creating missing container");
                self.store.ensure_container(&self.container).await?;
                self.store
                    .write(&self.container, key, content_type, bytes)
                    .await
            }
            other => other,
        }
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.store.read(&self.container, key).await
    }

    /// List objects under `prefix`. A missing container lists as empty.
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        match self.store.list(&self.container, prefix).await {
            Err(StorageError::ContainerNotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }
}
