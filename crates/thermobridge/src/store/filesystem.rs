//! Object store backed by a local directory.
//!
//! Each key maps to the file at `root/<key>`. Listing walks the tree with each
//! directory sorted by file name, so the order is stable between requests.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use super::{ObjectStore, Result, StoreError};

/// Directory-backed object store.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Map a key to a path under the root, rejecting keys that could escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.ends_with('/') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Write through a uniquely named dot file in the same directory, then
    /// rename it over the target. Concurrent writers of one key never share a
    /// temporary file.
    fn put_blocking(path: &Path, body: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".put-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        tmp.write_all(body)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn list_blocking(root: &Path, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            // Skip in-flight temporary files.
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || Self::list_blocking(&root, &prefix))
            .await
            .map_err(|e| StoreError::Backend(format!("listing task failed: {}", e)))?
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::task::spawn_blocking(move || Self::put_blocking(&path, &body))
            .await
            .map_err(|e| StoreError::Backend(format!("write task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        format!("filesystem ({})", self.root.display())
    }
}
