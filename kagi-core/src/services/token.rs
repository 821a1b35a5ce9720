//! Single-active token service.
//!
//! Each uid moves through a small state machine:
//!
//! - `Absent -> Active` when a token is stored
//! - `Active -> Active` when a token is stored again; the previous token stops working at once
//! - `Active -> Expired` implicitly, observed only when a token is presented after its expiry
//! - `Active | Expired -> Absent` on invalidation, on clear, or when cleanup collects it
//!
//! Expired and absent records authenticate identically, so collecting expired records is an
//! optimisation that never changes an authentication result.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Duration;
//! use kagi_core::{MemoryTokenRepository, TokenService};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kagi_core::Error> {
//! let service = TokenService::new(Arc::new(MemoryTokenRepository::new()));
//!
//! service
//!     .store_or_update("first", "user@example.com", Duration::minutes(15), None)
//!     .await?;
//! service
//!     .store_or_update("second", "user@example.com", Duration::minutes(15), Some("/home"))
//!     .await?;
//!
//! assert!(!service.authenticate("first", "user@example.com").await?.is_valid());
//! assert_eq!(
//!     service.authenticate("second", "user@example.com").await?.referrer(),
//!     Some("/home")
//! );
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    Error,
    repositories::TokenRepository,
    storage::{Authentication, CleanupConfig, NewToken, TokenRecord},
    validation::{validate_token, validate_uid},
};

/// Service enforcing the token contract on top of a [`TokenRepository`].
///
/// Every operation validates its arguments before touching the repository, so a
/// [`Error::Validation`] guarantees nothing was read or written. Repository failures come back
/// as [`Error::Storage`].
///
/// # Thread Safety
///
/// The service holds only an `Arc` to the repository and can be shared across tasks.
pub struct TokenService<R: TokenRepository> {
    repository: Arc<R>,
    cleanup: CleanupConfig,
}

impl<R: TokenRepository> TokenService<R> {
    /// Create a new TokenService with the given repository and cleanup disabled
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            cleanup: CleanupConfig::default(),
        }
    }

    pub fn with_cleanup_config(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn cleanup_config(&self) -> &CleanupConfig {
        &self.cleanup
    }

    /// Store `token` as the only valid token for `uid`, replacing any previous one.
    ///
    /// The record expires `ttl` after now. A zero or negative ttl stores a record that is
    /// already expired. `referrer` is optional; `Some("")` is kept as an empty referrer.
    pub async fn store_or_update(
        &self,
        token: &str,
        uid: &str,
        ttl: Duration,
        referrer: Option<&str>,
    ) -> Result<(), Error> {
        let new_token = NewToken::new(token, uid, ttl, referrer)?;
        self.store(new_token).await
    }

    /// Store a token built with [`NewToken::builder`].
    pub async fn store(&self, new_token: NewToken) -> Result<(), Error> {
        let record = TokenRecord::issue(&new_token, Utc::now());

        tracing::debug!(
            uid = %record.uid,
            expires_at = %record.expires_at,
            has_referrer = record.referrer.is_some(),
            "Storing token"
        );

        self.repository.upsert(record).await
    }

    /// Check whether `token` is the current, unexpired token of `uid`.
    ///
    /// An unknown uid, a different token, a token belonging to another uid and an expired
    /// token all yield [`Authentication::Invalid`]. Authentication does not consume the token.
    pub async fn authenticate(&self, token: &str, uid: &str) -> Result<Authentication, Error> {
        validate_token(token)?;
        validate_uid(uid)?;

        let authentication = match self.repository.find_by_uid(uid).await? {
            Some(record) => record.authenticate(token, uid, Utc::now()),
            None => Authentication::Invalid,
        };

        tracing::debug!(uid = %uid, valid = authentication.is_valid(), "Authenticated token");

        Ok(authentication)
    }

    /// Remove the token of `uid`. Unknown uids succeed without effect.
    pub async fn invalidate_user(&self, uid: &str) -> Result<(), Error> {
        validate_uid(uid)?;

        tracing::debug!(uid = %uid, "Invalidating user token");

        self.repository.delete_by_uid(uid).await
    }

    /// Remove the tokens of every user
    pub async fn clear(&self) -> Result<(), Error> {
        tracing::debug!("Clearing all tokens");
        self.repository.delete_all().await
    }

    /// Number of uids currently holding a record, including records that have expired but
    /// have not been collected yet
    pub async fn length(&self) -> Result<usize, Error> {
        self.repository.count().await
    }

    /// The stored record for `uid`, without evaluating expiry
    pub async fn find_record(&self, uid: &str) -> Result<Option<TokenRecord>, Error> {
        validate_uid(uid)?;
        self.repository.find_by_uid(uid).await
    }

    /// Remove every expired record now, returning how many were removed
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, Error> {
        let removed = self.repository.cleanup_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(count = removed, "Cleaned up expired tokens");
        }
        Ok(removed)
    }

    /// Start the background cleanup task.
    ///
    /// Spawns a task that removes expired records every `cleanup_config().interval` until
    /// `shutdown` changes. The first pass runs immediately.
    ///
    /// Fails with [`Error::Validation`] when the interval is zero; nothing is spawned then.
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<tokio::task::JoinHandle<()>, Error> {
        self.cleanup.validate()?;

        let repository = Arc::clone(&self.repository);
        let interval = self.cleanup.interval;

        Ok(tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match repository.cleanup_expired(Utc::now()).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Cleaned up expired tokens");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to clean up expired tokens");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down token cleanup task");
                        break;
                    }
                }
            }
        }))
    }
}

impl<R: TokenRepository> Clone for TokenService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cleanup: self.cleanup.clone(),
        }
    }
}
