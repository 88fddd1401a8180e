//! Durable key/value blob storage for the leaderboard
//!
//! The leaderboard lives under a single key whose value is a JSON document.
//! Two backends are provided:
//! - `FileBlobStore` keeps one file per key inside a data directory
//! - `MemoryBlobStore` keeps values in process memory (tests, ephemeral runs)
//!
//! Reads distinguish a missing key (`StorageError::NotFound`) from every
//! other failure so callers can treat "no data yet" as an empty leaderboard.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors returned by blob store backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Asynchronous string blob storage addressed by key
pub trait BlobStore: Send + Sync {
    /// Reads the value stored under `key`, failing with `NotFound` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Overwrites the value stored under `key`.
    fn set(&self, key: &str, value: String)
        -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Stores each key as a `.json` file in a directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps a key to its file, replacing characters that aren't safe in file names.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<String, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write next to the target and rename so readers never see a torn file
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, value).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

/// In-process store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `value` under `key`.
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    pub fn insert(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    /// Current value under `key`, if any.
    pub fn value(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }
}

impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<String, StorageError> {
        self.value(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| std::io::Error::new(ErrorKind::Other, "memory store lock poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
