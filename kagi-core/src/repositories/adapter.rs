use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    repositories::{RepositoryProvider, TokenRepository},
    storage::TokenRecord,
};

/// Adapter that wraps a RepositoryProvider and implements [`TokenRepository`]
///
/// This lets a service own an `Arc` to the whole provider while only depending on the
/// token repository trait.
pub struct TokenRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> TokenRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> TokenRepository for TokenRepositoryAdapter<R> {
    async fn upsert(&self, record: TokenRecord) -> Result<(), Error> {
        self.provider.token().upsert(record).await
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<TokenRecord>, Error> {
        self.provider.token().find_by_uid(uid).await
    }

    async fn delete_by_uid(&self, uid: &str) -> Result<(), Error> {
        self.provider.token().delete_by_uid(uid).await
    }

    async fn delete_all(&self) -> Result<(), Error> {
        self.provider.token().delete_all().await
    }

    async fn count(&self) -> Result<usize, Error> {
        self.provider.token().count().await
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.token().cleanup_expired(now).await
    }
}
