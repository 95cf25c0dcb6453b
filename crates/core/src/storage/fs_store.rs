//! File system object store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::StorageError;
use super::traits::{validate_key, ObjectInfo, ObjectStore};

/// Prefix of in-progress write files; never listed.
const TEMP_PREFIX: &str = ".tmp-";

/// Stores each container as a directory under `root` and each object as a
/// file at its key path. Writes go through a temp file and a rename, so a
/// reader never sees a partial object.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, StorageError> {
        if container.contains('/') {
            return Err(StorageError::InvalidKey(container.to_string()));
        }
        validate_key(container)?;
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        let mut path = self.container_dir(container)?;
        for segment in key.split('/') {
            path.push(segment);
        }
        Ok(path)
    }

    async fn container_exists(&self, container: &str) -> Result<bool, StorageError> {
        let dir = self.container_dir(container)?;
        match fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `bytes` to `temp`, flush it to disk and move it over `path`.
    async fn write_via_temp(temp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(temp, path).await
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        let dir = self.container_dir(container)?;
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn write(
        &self,
        container: &str,
        key: &str,
        _content_type: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let path = self.object_path(container, key)?;
        if !self.container_exists(container).await? {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }

        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent).await?;

        let temp = parent.join(format!("{}{}", TEMP_PREFIX, uuid::Uuid::new_v4()));
        if let Err(e) = Self::write_via_temp(&temp, &path, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(container, key, bytes = bytes.len(), "Wrote object");
        Ok(format!("{}/{}", container, key))
    }

    async fn read(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(container, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.container_exists(container).await? {
                    Err(StorageError::NotFound {
                        container: container.to_string(),
                        key: key.to_string(),
                    })
                } else {
                    Err(StorageError::ContainerNotFound(container.to_string()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let base = self.container_dir(container)?;
        if !self.container_exists(container).await? {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }

        let mut objects = Vec::new();
        let mut pending: Vec<(PathBuf, String)> = vec![(base, String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with(TEMP_PREFIX) {
                    continue;
                }
                let key = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };

                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    // Only descend into directories that can still match.
                    let dir_key = format!("{}/", key);
                    if dir_key.starts_with(prefix) || prefix.starts_with(&dir_key) {
                        pending.push((entry.path(), key));
                    }
                } else if key.starts_with(prefix) {
                    objects.push(ObjectInfo {
                        key,
                        size: meta.len(),
                        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    });
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}
