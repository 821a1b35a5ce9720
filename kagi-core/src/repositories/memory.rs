//! In-process token storage backed by a concurrent map.
//!
//! Records live only as long as the provider. Useful for single-node deployments that can
//! afford to log everyone out on restart, and as the reference backend in tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    Error,
    repositories::{RepositoryProvider, TokenRepository, TokenRepositoryProvider},
    storage::TokenRecord,
};

/// Token repository holding records in a [`DashMap`].
///
/// `insert` swaps the whole value under the shard lock and reads clone the value out under
/// the same lock, so readers never observe a partially replaced record.
#[derive(Debug, Default)]
pub struct MemoryTokenRepository {
    records: DashMap<String, TokenRecord>,
}

impl MemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepository for MemoryTokenRepository {
    async fn upsert(&self, record: TokenRecord) -> Result<(), Error> {
        self.records.insert(record.uid.clone(), record);
        Ok(())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<TokenRecord>, Error> {
        Ok(self.records.get(uid).map(|entry| entry.value().clone()))
    }

    async fn delete_by_uid(&self, uid: &str) -> Result<(), Error> {
        self.records.remove(uid);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), Error> {
        self.records.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, Error> {
        Ok(self.records.len())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

/// Repository provider for the in-memory backend
#[derive(Debug, Clone, Default)]
pub struct MemoryRepositoryProvider {
    token: Arc<MemoryTokenRepository>,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenRepositoryProvider for MemoryRepositoryProvider {
    type TokenRepo = MemoryTokenRepository;

    fn token(&self) -> &Self::TokenRepo {
        &self.token
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
