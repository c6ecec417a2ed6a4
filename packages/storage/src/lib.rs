//! Blob storage for uploaded media and JSON blobs.
//!
//! Backends:
//! - S3-compatible storage in production/staging
//! - On-disk storage for local dev
//! - In-memory storage for tests
//!
//! This is a small wrapper around `object_store`, which already provides
//! S3, local filesystem, and in-memory backends. Media blobs are exposed
//! through a public base URL; the gateway serves them under `/media`
//! unless a CDN URL is configured.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ObjectStore(object_store::Error::NotFound { .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    S3,
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::S3 => "s3",
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Defaults to true when `endpoint` is plain http.
    #[serde(default)]
    pub allow_http: Option<bool>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub virtual_hosted_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageBackendConfig {
    S3(S3Config),
    #[serde(alias = "fs")]
    Filesystem { root: PathBuf },
    #[serde(alias = "mem")]
    Memory,
}

impl Default for StorageBackendConfig {
    fn default() -> Self {
        StorageBackendConfig::Filesystem {
            root: PathBuf::from("./data/media"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendConfig,
    /// Optional key prefix applied to all object keys.
    pub prefix: Option<String>,
    /// Base of the public URL returned for stored media.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendConfig::default(),
            prefix: None,
            public_base_url: "/media".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackendConfig::Memory,
            ..Default::default()
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackendConfig::Filesystem { root: root.into() },
            ..Default::default()
        }
    }

    pub fn s3(cfg: S3Config) -> Self {
        Self {
            backend: StorageBackendConfig::S3(cfg),
            ..Default::default()
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }
}

#[derive(Clone)]
pub struct Storage {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    public_base_url: String,
}

impl Storage {
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub async fn new(cfg: StorageConfig) -> Result<Self, StorageError> {
        let (kind, store) = match cfg.backend {
            StorageBackendConfig::S3(s3) => (StorageKind::S3, Arc::new(build_s3(s3)?) as _),
            StorageBackendConfig::Filesystem { root } => {
                ensure_dir(&root)?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                (StorageKind::Filesystem, Arc::new(fs) as _)
            }
            StorageBackendConfig::Memory => {
                let mem = object_store::memory::InMemory::new();
                (StorageKind::Memory, Arc::new(mem) as _)
            }
        };

        tracing::info!("Blob storage backend: {}", kind.as_str());

        Ok(Self {
            kind,
            store,
            prefix: cfg.prefix.and_then(non_empty),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn to_path(&self, key: &str) -> Result<Path, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() || key.split('/').any(|seg| seg == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let joined = match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{key}"),
            _ => key.to_string(),
        };

        Ok(Path::from(joined))
    }

    /// Public URL under which a stored media key is reachable.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }

    /// Store a media blob and return its public URL.
    pub async fn put_media(&self, key: &str, bytes: Bytes) -> Result<String, StorageError> {
        let size = bytes.len();
        self.put_bytes(key, bytes).await?;
        tracing::debug!("Stored media {} ({} bytes)", key, size);
        Ok(self.public_url(key))
    }

    pub async fn put_bytes(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        self.store
            .put(&path, object_store::PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    pub async fn get_bytes(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.to_path(key)?;
        let res = self.store.get(&path).await?;
        Ok(res.bytes().await?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        self.store.delete(&path).await?;
        Ok(())
    }

    pub async fn put_json_value(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        self.put_bytes(key, Bytes::from(bytes)).await
    }

    pub async fn get_json_value(&self, key: &str) -> Result<serde_json::Value, StorageError> {
        let bytes = self.get_bytes(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Like [`get_json_value`](Self::get_json_value), but a missing object is `None`.
    pub async fn try_get_json_value(
        &self,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        match self.get_json_value(key).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Object key for an uploaded file: `{folder/}{owner_id}.{ext}`.
///
/// The extension comes from the client's file name and falls back to `bin`
/// when it is missing or not a short alphanumeric string.
pub fn media_key(folder: Option<&str>, owner_id: &str, file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());

    match folder {
        Some(folder) => format!("{folder}/{owner_id}.{ext}"),
        None => format!("{owner_id}.{ext}"),
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn build_s3(cfg: S3Config) -> Result<object_store::aws::AmazonS3, StorageError> {
    if cfg.bucket.trim().is_empty() {
        return Err(StorageError::InvalidConfig(
            "bucket is required for s3 backend".into(),
        ));
    }

    let allow_http = cfg.allow_http.unwrap_or_else(|| {
        cfg.endpoint
            .as_deref()
            .is_some_and(|e| e.trim_start().to_ascii_lowercase().starts_with("http://"))
    });

    let mut builder = object_store::aws::AmazonS3Builder::new()
        .with_bucket_name(cfg.bucket)
        .with_region(cfg.region)
        .with_virtual_hosted_style_request(cfg.virtual_hosted_style)
        .with_allow_http(allow_http);

    if let Some(endpoint) = cfg.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    if let Some(access_key_id) = cfg.access_key_id.and_then(non_empty) {
        builder = builder.with_access_key_id(access_key_id);
    }
    if let Some(secret_access_key) = cfg.secret_access_key.and_then(non_empty) {
        builder = builder.with_secret_access_key(secret_access_key);
    }
    if let Some(session_token) = cfg.session_token.and_then(non_empty) {
        builder = builder.with_token(session_token);
    }

    Ok(builder.build()?)
}
