//! Database connection management with lazy initialization.

use std::sync::LazyLock;

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Global database instance using lazy initialization.
static DB: LazyLock<OnceCell<Surreal<Any>>> = LazyLock::new(OnceCell::new);

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Connection endpoint: "mem://", "file://path" or "rocksdb://path".
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Optional root credentials.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "pigmap".to_string(),
            database: "main".to_string(),
            username: None,
            password: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for file-based persistence.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("file://{}", path.into()),
            ..Default::default()
        }
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not initialized - call init_db first")]
    NotInitialized,
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Initialize the database connection.
///
/// Only the first call connects; later calls return the existing handle.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    DB.get_or_try_init(|| async {
        tracing::info!("Connecting to database: {}", config.endpoint);

        let db = connect(&config.endpoint).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(&config.namespace).use_db(&config.database).await?;

        tracing::info!(
            "Connected to database: {}/{}",
            config.namespace,
            config.database
        );

        Ok(db)
    })
    .await
}

/// Get the database connection.
pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}
