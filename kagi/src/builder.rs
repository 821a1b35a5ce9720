//! Builder pattern for constructing Kagi instances
//!
//! This module provides a type-safe builder for creating [`Kagi`] instances with
//! compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use kagi::KagiBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let kagi = KagiBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or keep tokens in memory
//!     let kagi = KagiBuilder::new().with_memory().build().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use kagi_core::{CleanupConfig, MemoryRepositoryProvider, RepositoryProvider};

use crate::Kagi;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Kagi instance.
#[derive(Debug, thiserror::Error)]
pub enum KagiBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`KagiBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Kagi`] instances.
///
/// Storage must be chosen before `build` becomes available.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
pub struct KagiBuilder<Storage> {
    storage: Storage,
    cleanup_config: CleanupConfig,
    apply_migrations: bool,
}

impl Default for KagiBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl KagiBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Cleanup: disabled, hourly when enabled
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            cleanup_config: CleanupConfig::default(),
            apply_migrations: false,
        }
    }

    /// Keep tokens in process memory.
    ///
    /// Tokens are lost when the last [`Kagi`] clone is dropped.
    pub fn with_memory(self) -> KagiBuilder<WithStorage<MemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(MemoryRepositoryProvider::new()))
    }

    /// Use an existing repository provider.
    ///
    /// This is how custom storage backends are plugged in.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> KagiBuilder<WithStorage<R>> {
        KagiBuilder {
            storage: WithStorage { repositories },
            cleanup_config: self.cleanup_config,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl KagiBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://tokens.db?mode=rwc")
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use kagi::KagiBuilder;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let kagi = KagiBuilder::new()
    ///     .with_sqlite("sqlite::memory:")
    ///     .await?
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<KagiBuilder<WithStorage<crate::SqliteRepositoryProvider>>, KagiBuilderError> {
        let repositories = crate::SqliteRepositoryProvider::connect(url)
            .await
            .map_err(|e| KagiBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(repositories)))
    }

    /// Configure SQLite storage with an existing connection pool.
    ///
    /// Note that each connection to `sqlite::memory:` opens its own database, so a shared
    /// in-memory pool should be limited to a single connection.
    pub fn with_sqlite_pool(
        self,
        pool: kagi_storage_sqlite::SqlitePool,
    ) -> KagiBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> KagiBuilder<WithStorage<R>> {
    /// Configure background removal of expired records.
    ///
    /// Default: disabled. Start the task with [`Kagi::spawn_cleanup`] after building.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use kagi::{CleanupConfig, KagiBuilder};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let kagi = KagiBuilder::new()
    ///     .with_memory()
    ///     .with_cleanup(CleanupConfig::default().enabled(true).interval(Duration::from_secs(600)))
    ///     .build()
    ///     .await?;
    ///
    /// let cleanup = kagi.spawn_cleanup()?;
    /// assert!(cleanup.is_some());
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_cleanup(mut self, config: CleanupConfig) -> Self {
        self.cleanup_config = config;
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    ///
    /// When `false`, call [`Kagi::migrate`] before the first store operation.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the Kagi instance.
    ///
    /// Fails with [`KagiBuilderError::InvalidConfiguration`] when the cleanup interval is
    /// zero, and with [`KagiBuilderError::Migration`] when requested migrations fail.
    pub async fn build(self) -> Result<Kagi<R>, KagiBuilderError> {
        self.cleanup_config
            .validate()
            .map_err(|e| KagiBuilderError::InvalidConfiguration(e.to_string()))?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| KagiBuilderError::Migration(e.to_string()))?;
        }

        Ok(Kagi::new(self.storage.repositories).with_cleanup_config(self.cleanup_config))
    }
}
