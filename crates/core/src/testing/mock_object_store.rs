//! Mock object store for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{ObjectInfo, ObjectStore, StorageError};

/// In-memory implementation of the ObjectStore trait.
///
/// Provides controllable behavior for testing:
/// - Per-key write failures
/// - Whole-store outage
/// - Simulated write latency
/// - In-flight write instrumentation (current and peak)
/// - A missing container that must be created before writes succeed
#[derive(Debug)]
pub struct MockObjectStore {
    /// Objects keyed by (container, key).
    objects: Arc<RwLock<BTreeMap<(String, String), Vec<u8>>>>,
    /// Containers that exist. Ignored when `auto_containers` is set.
    containers: Arc<RwLock<HashSet<String>>>,
    auto_containers: bool,
    /// Keys whose writes fail.
    failing_keys: Arc<RwLock<HashSet<String>>>,
    unavailable: AtomicBool,
    write_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    writes: AtomicUsize,
    ensure_calls: AtomicUsize,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStore {
    /// Store in which every container already exists.
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            containers: Arc::new(RwLock::new(HashSet::new())),
            auto_containers: true,
            failing_keys: Arc::new(RwLock::new(HashSet::new())),
            unavailable: AtomicBool::new(false),
            write_delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            ensure_calls: AtomicUsize::new(0),
        }
    }

    /// Containers must be created with `ensure_container` before use.
    pub fn without_container(mut self) -> Self {
        self.auto_containers = false;
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Make writes to `key` fail.
    pub async fn fail_key(&self, key: &str) {
        self.failing_keys.write().await.insert(key.to_string());
    }

    /// Make every operation fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn get(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn contains(&self, container: &str, key: &str) -> bool {
        self.get(container, key).await.is_some()
    }

    /// Stored keys in `container`, sorted.
    pub async fn keys(&self, container: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn object_count(&self, container: &str) -> usize {
        self.keys(container).await.len()
    }

    /// Highest number of writes observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Total write calls, including failed ones.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn ensure_container_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("mock store offline".to_string()))
        } else {
            Ok(())
        }
    }

    async fn container_exists(&self, container: &str) -> bool {
        self.auto_containers || self.containers.read().await.contains(container)
    }
}

/// Decrements the in-flight counter when a write ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.containers.write().await.insert(container.to_string());
        Ok(())
    }

    async fn write(
        &self,
        container: &str,
        key: &str,
        _content_type: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        self.check_available()?;
        if !self.container_exists(container).await {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }
        if self.failing_keys.read().await.contains(key) {
            return Err(StorageError::Io(format!("injected write failure for {}", key)));
        }

        self.objects
            .write()
            .await
            .insert((container.to_string(), key.to_string()), bytes.to_vec());
        Ok(format!("mock://{}/{}", container, key))
    }

    async fn read(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.check_available()?;
        if !self.container_exists(container).await {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }
        self.get(container, key).await.ok_or_else(|| StorageError::NotFound {
            container: container.to_string(),
            key: key.to_string(),
        })
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        self.check_available()?;
        if !self.container_exists(container).await {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }
        let now = Utc::now();
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|((c, k), _)| c == container && k.starts_with(prefix))
            .map(|((_, k), v)| ObjectInfo {
                key: k.clone(),
                size: v.len() as u64,
                last_modified: Some(now),
            })
            .collect())
    }
}
