//! # Kagi
//!
//! Kagi stores short-lived, single-active authentication tokens for "remember me" and
//! passwordless login flows. Each user identifier holds at most one token at a time: storing a
//! new token replaces the previous one, which stops authenticating immediately.
//!
//! A caller registers a token with a time-to-live and an optional referrer (the location to
//! return the user to), later checks a presented token, and can invalidate a single user or
//! every user at once.
//!
//! ## Storage Support
//!
//! - In-memory (always available)
//! - SQLite (`sqlite` feature, enabled by default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Duration;
//! use kagi::{KagiBuilder, generate_secure_token};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kagi = KagiBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let token = generate_secure_token();
//!     kagi.store_or_update(&token, "user@example.com", Duration::days(14), Some("/inbox"))
//!         .await?;
//!
//!     let auth = kagi.authenticate(&token, "user@example.com").await?;
//!     assert_eq!(auth.referrer(), Some("/inbox"));
//!
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use chrono::Duration;
use kagi_core::{repositories::TokenRepositoryAdapter, services::TokenService};
use tokio::{sync::watch, task::JoinHandle};

pub mod builder;

pub use builder::{KagiBuilder, KagiBuilderError, NoStorage, WithStorage};

/// Re-export core types from kagi_core
///
/// These types are commonly used when working with the Kagi API.
pub use kagi_core::{
    Authentication, CleanupConfig, Error, MemoryRepositoryProvider, NewToken, NewTokenBuilder,
    RepositoryProvider, TokenRecord,
    crypto::generate_secure_token,
    error::{StorageError, ValidationError},
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use kagi_storage_sqlite::SqliteRepositoryProvider;

/// The main token store coordinator
///
/// `Kagi` ties a repository provider to the token service and exposes the store operations
/// together with storage lifecycle calls. It is cheap to clone; clones share the same
/// storage.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chrono::Duration;
/// use kagi::{Kagi, MemoryRepositoryProvider};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), kagi::Error> {
/// let kagi = Kagi::new(Arc::new(MemoryRepositoryProvider::new()));
///
/// kagi.store_or_update("t1", "alice", Duration::minutes(5), None).await?;
/// assert_eq!(kagi.length().await?, 1);
///
/// kagi.invalidate_user("alice").await?;
/// assert!(!kagi.authenticate("t1", "alice").await?.is_valid());
/// # Ok(())
/// # }
/// ```
pub struct Kagi<R: RepositoryProvider> {
    repositories: Arc<R>,
    token_service: Arc<TokenService<TokenRepositoryAdapter<R>>>,
}

impl<R: RepositoryProvider> Kagi<R> {
    /// Create a new Kagi instance with a repository provider and cleanup disabled
    pub fn new(repositories: Arc<R>) -> Self {
        let token_repo = Arc::new(TokenRepositoryAdapter::new(repositories.clone()));

        Self {
            repositories,
            token_service: Arc::new(TokenService::new(token_repo)),
        }
    }

    /// Set the expired-record cleanup configuration
    ///
    /// The configuration takes effect when [`Kagi::spawn_cleanup`] is called.
    pub fn with_cleanup_config(self, config: CleanupConfig) -> Self {
        let token_repo = Arc::new(TokenRepositoryAdapter::new(self.repositories.clone()));

        Self {
            repositories: self.repositories,
            token_service: Arc::new(TokenService::new(token_repo).with_cleanup_config(config)),
        }
    }

    pub fn cleanup_config(&self) -> &CleanupConfig {
        self.token_service.cleanup_config()
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Store `token` as the only valid token of `uid` for `ttl`
    ///
    /// Any previous token of `uid` stops authenticating once this returns.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when `token` or `uid` is empty; nothing is stored in that case.
    pub async fn store_or_update(
        &self,
        token: &str,
        uid: &str,
        ttl: Duration,
        referrer: Option<&str>,
    ) -> Result<(), Error> {
        self.token_service
            .store_or_update(token, uid, ttl, referrer)
            .await
    }

    /// Store a token built with [`NewToken::builder`]
    pub async fn store(&self, new_token: NewToken) -> Result<(), Error> {
        self.token_service.store(new_token).await
    }

    /// Check a presented token
    ///
    /// Returns [`Authentication::Valid`] with the stored referrer (or `""`) when `token` is the
    /// current unexpired token of `uid`, and [`Authentication::Invalid`] otherwise.
    pub async fn authenticate(&self, token: &str, uid: &str) -> Result<Authentication, Error> {
        self.token_service.authenticate(token, uid).await
    }

    /// Remove the token of `uid`, if any
    pub async fn invalidate_user(&self, uid: &str) -> Result<(), Error> {
        self.token_service.invalidate_user(uid).await
    }

    /// Remove every stored token
    pub async fn clear(&self) -> Result<(), Error> {
        self.token_service.clear().await
    }

    /// Number of users currently holding a token record
    pub async fn length(&self) -> Result<usize, Error> {
        self.token_service.length().await
    }

    pub async fn find_record(&self, uid: &str) -> Result<Option<TokenRecord>, Error> {
        self.token_service.find_record(uid).await
    }

    /// Remove expired records now, returning how many were removed
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, Error> {
        self.token_service.cleanup_expired_tokens().await
    }

    /// Spawn the background cleanup task if cleanup is enabled
    ///
    /// Returns `Ok(None)` when the cleanup configuration is disabled, and
    /// [`Error::Validation`] when it is enabled with a zero interval. Must be called from
    /// within a tokio runtime.
    pub fn spawn_cleanup(&self) -> Result<Option<CleanupHandle>, Error> {
        if !self.cleanup_config().enabled {
            return Ok(None);
        }

        let (shutdown, receiver) = watch::channel(false);
        let task = self.token_service.start_cleanup_task(receiver)?;

        tracing::info!(
            interval_ms = self.cleanup_config().interval.as_millis() as u64,
            "Started token cleanup task"
        );

        Ok(Some(CleanupHandle { shutdown, task }))
    }
}

impl<R: RepositoryProvider> Clone for Kagi<R> {
    fn clone(&self) -> Self {
        Self {
            repositories: Arc::clone(&self.repositories),
            token_service: Arc::clone(&self.token_service),
        }
    }
}

/// Handle to a running cleanup task
///
/// Dropping the handle also stops the task, because the task exits once the shutdown
/// channel closes.
pub struct CleanupHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signal the task to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Token cleanup task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
