//! Key-value snapshot persistence for the live cache.
//!
//! The coordinator writes its whole cache as a single JSON blob under one
//! key after every publish and reads it back on startup. Three stores are
//! provided: in-memory, a local directory, and the object store.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;
use storage::{Storage, StorageError};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Future type for snapshot store operations.
pub type PersistFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + Send + 'a>>;

/// Durable key-value store for snapshot blobs.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Read a blob. A missing key is `Ok(None)`.
    fn get<'a>(&'a self, key: &'a str) -> PersistFuture<'a, Option<Value>>;

    /// Overwrite a blob.
    fn put<'a>(&'a self, key: &'a str, value: Value) -> PersistFuture<'a, ()>;
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid snapshot key: {0:?}")]
    InvalidKey(String),

    #[error("Snapshot store unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    /// The blob exists but is not valid JSON.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            PersistenceError::Json(_) | PersistenceError::Storage(StorageError::Json(_))
        )
    }
}

/// Which store holds the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotBackend {
    /// Lost on restart. For tests and throwaway instances.
    Memory,
    /// JSON files in a local directory.
    File { dir: PathBuf },
    /// The configured blob store, under `live/`.
    ObjectStore,
}

impl Default for SnapshotBackend {
    fn default() -> Self {
        SnapshotBackend::File {
            dir: PathBuf::from("./data/live"),
        }
    }
}

/// Build the snapshot store selected by `backend`.
pub async fn open_snapshot_store(
    backend: &SnapshotBackend,
    storage: &Storage,
) -> Result<Arc<dyn SnapshotStore>, PersistenceError> {
    let store: Arc<dyn SnapshotStore> = match backend {
        SnapshotBackend::Memory => Arc::new(MemorySnapshotStore::new()),
        SnapshotBackend::File { dir } => {
            let store = FileSnapshotStore::new(dir);
            store.init().await?;
            Arc::new(store)
        }
        SnapshotBackend::ObjectStore => Arc::new(storage.clone()),
    };
    Ok(store)
}

fn check_key(key: &str) -> Result<(), PersistenceError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidKey(key.to_string()))
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemorySnapshotStore {
    blobs: Mutex<HashMap<String, Value>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_blobs<T>(&self, f: impl FnOnce(&mut HashMap<String, Value>) -> T) -> Result<T, PersistenceError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store lock poisoned".into()))?;
        Ok(f(&mut blobs))
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get<'a>(&'a self, key: &'a str) -> PersistFuture<'a, Option<Value>> {
        let result = self.with_blobs(|blobs| blobs.get(key).cloned());
        Box::pin(async move { result })
    }

    fn put<'a>(&'a self, key: &'a str, value: Value) -> PersistFuture<'a, ()> {
        let result = check_key(key).and_then(|()| {
            self.with_blobs(|blobs| {
                blobs.insert(key.to_string(), value);
            })
        });
        Box::pin(async move { result })
    }
}

/// Snapshot files in a local directory, one `{key}.json` per key.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write leaves the previous snapshot intact.
pub struct FileSnapshotStore {
    base_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Ensure the base directory exists.
    pub async fn init(&self) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        check_key(key)?;
        let path = self.base_dir.join(format!("{}.json", key));
        let json = serde_json::to_vec(value)?;

        let temp_path = self.base_dir.join(format!("{}.json.tmp", key));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Saved snapshot to {:?}", path);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        check_key(key)?;
        let path = self.base_dir.join(format!("{}.json", key));

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut json = String::new();
        file.read_to_string(&mut json).await?;

        tracing::debug!("Loaded snapshot from {:?}", path);
        Ok(Some(serde_json::from_str(&json)?))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get<'a>(&'a self, key: &'a str) -> PersistFuture<'a, Option<Value>> {
        Box::pin(self.load(key))
    }

    fn put<'a>(&'a self, key: &'a str, value: Value) -> PersistFuture<'a, ()> {
        Box::pin(async move { self.save(key, &value).await })
    }
}

impl SnapshotStore for Storage {
    fn get<'a>(&'a self, key: &'a str) -> PersistFuture<'a, Option<Value>> {
        Box::pin(async move {
            check_key(key)?;
            Ok(self.try_get_json_value(&format!("live/{key}.json")).await?)
        })
    }

    fn put<'a>(&'a self, key: &'a str, value: Value) -> PersistFuture<'a, ()> {
        Box::pin(async move {
            check_key(key)?;
            Ok(self.put_json_value(&format!("live/{key}.json"), &value).await?)
        })
    }
}
