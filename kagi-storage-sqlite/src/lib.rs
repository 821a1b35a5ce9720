//! SQLite storage backend for the kagi token store
//!
//! Records live in a `remember_tokens` table keyed by uid. Call
//! [`RepositoryProvider::migrate`] once before use to create the schema.
//!
//! ```rust,no_run
//! use kagi_core::repositories::RepositoryProvider;
//! use kagi_storage_sqlite::SqliteRepositoryProvider;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kagi_core::Error> {
//! let provider = SqliteRepositoryProvider::connect("sqlite://tokens.db?mode=rwc").await?;
//! provider.migrate().await?;
//! # Ok(())
//! # }
//! ```
use std::sync::Arc;

use async_trait::async_trait;
use kagi_core::{
    Error,
    error::StorageError,
    repositories::{RepositoryProvider, TokenRepositoryProvider},
};
use kagi_migration::MigrationManager;
use sqlx::sqlite::SqlitePoolOptions;

pub mod migrations;
pub mod repositories;

pub use repositories::SqliteTokenRepository;
pub use sqlx::SqlitePool;

use migrations::SqliteMigrationManager;

/// Repository provider implementation for SQLite
#[derive(Clone)]
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    token: Arc<SqliteTokenRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let token = Arc::new(SqliteTokenRepository::new(pool.clone()));
        Self { pool, token }
    }

    /// Open a pool for `database_url`.
    ///
    /// An in-memory database exists per connection, so `:memory:` URLs get a single
    /// connection that is never recycled; otherwise every pooled connection would see its
    /// own empty database.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = options.connect(database_url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite");
            Error::Storage(StorageError::Connection(e.to_string()))
        })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl TokenRepositoryProvider for SqliteRepositoryProvider {
    type TokenRepo = SqliteTokenRepository;

    fn token(&self) -> &Self::TokenRepo {
        &self.token
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(format!(
                "Failed to run migrations: {e}"
            )))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
