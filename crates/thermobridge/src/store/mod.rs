//! Object store access.
//!
//! [`ObjectStore`] is the raw capability (list, get, put) implemented by the
//! memory, filesystem and S3 backends. [`RecordStore`] sits on top of it and
//! turns a partition listing into parsed records on a best-effort basis:
//! one unreadable object is logged and counted, never fatal. Only a failed
//! listing aborts the batch.

pub mod filesystem;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::observation::{Observation, RawRecord, RecordKey};

pub use filesystem::FsStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Errors from the object store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Why a single record was skipped.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch failed: {0}")]
    Transport(#[from] StoreError),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw key/value capability of an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All keys starting with `prefix`, in the backend's listing order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Full contents of one object.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or replace one object.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Short description for startup logs.
    fn describe(&self) -> String;
}

/// Limits applied to per-key fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of objects fetched at once within one partition.
    pub concurrency: usize,
    /// Per-object fetch deadline in milliseconds.
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout_ms: 5000,
        }
    }
}

impl FetchConfig {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Result of a best-effort batch: the readable items and how many were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: 0,
        }
    }
}

/// Record-level view over an [`ObjectStore`].
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn ObjectStore>,
    fetch: FetchConfig,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn ObjectStore>, fetch: FetchConfig) -> Self {
        Self { backend, fetch }
    }

    /// Enumerate every key under a partition. An empty partition is not an error.
    pub async fn list_partition(&self, prefix: &str) -> Result<Vec<RecordKey>> {
        let keys = self.backend.list(prefix).await?;
        if keys.is_empty() {
            log::info!("No objects found in prefix: {}", prefix);
        }
        Ok(keys.into_iter().map(RecordKey::new).collect())
    }

    /// Fetch one object and parse it as an [`Observation`].
    pub async fn fetch_and_parse(
        &self,
        key: &RecordKey,
    ) -> std::result::Result<Observation, FetchError> {
        let bytes = self.fetch_bytes(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Every readable observation under `prefix`, in listing order.
    pub async fn fetch_all_in_partition(&self, prefix: &str) -> Result<Collected<Observation>> {
        let keys = self.list_partition(prefix).await?;
        Ok(self
            .collect(keys, |_, bytes| serde_json::from_slice::<Observation>(bytes))
            .await)
    }

    /// Every readable JSON document under `prefix`, tagged with its key.
    ///
    /// Documents are returned as stored; they need not be observations.
    pub async fn fetch_all_raw(&self, prefix: &str) -> Result<Collected<RawRecord>> {
        let keys = self.list_partition(prefix).await?;
        Ok(self
            .collect(keys, |key, bytes| {
                serde_json::from_slice(bytes).map(|data| RawRecord {
                    key: key.clone(),
                    data,
                })
            })
            .await)
    }

    /// Serialize an observation and write it at `key`.
    pub async fn put_observation(&self, key: &RecordKey, observation: &Observation) -> Result<()> {
        let body = serde_json::to_vec(observation)?;
        self.backend
            .put(key.as_str(), body, "application/json")
            .await
    }

    async fn fetch_bytes(&self, key: &RecordKey) -> std::result::Result<Vec<u8>, FetchError> {
        let timeout = self.fetch.timeout();
        match tokio::time::timeout(timeout, self.backend.get(key.as_str())).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    /// Fetch `keys` with bounded concurrency and parse each one.
    ///
    /// `buffered` yields in input order, so the output follows the listing
    /// regardless of which fetch completes first.
    async fn collect<T, F>(&self, keys: Vec<RecordKey>, parse: F) -> Collected<T>
    where
        F: Fn(&RecordKey, &[u8]) -> std::result::Result<T, serde_json::Error>,
    {
        let concurrency = self.fetch.concurrency.max(1);
        let fetched: Vec<(RecordKey, std::result::Result<Vec<u8>, FetchError>)> =
            futures::stream::iter(keys)
                .map(|key| async move {
                    let bytes = self.fetch_bytes(&key).await;
                    (key, bytes)
                })
                .buffered(concurrency)
                .collect()
                .await;

        let mut collected = Collected::default();
        for (key, bytes) in fetched {
            let parsed = bytes.and_then(|bytes| parse(&key, &bytes).map_err(FetchError::from));
            match parsed {
                Ok(item) => collected.items.push(item),
                Err(e) => {
                    log::warn!("Error fetching object {}: {}", key, e);
                    collected.skipped += 1;
                }
            }
        }
        collected
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
