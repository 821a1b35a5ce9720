use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, storage::TokenRecord};

/// Repository for single-active token records, keyed by uid
///
/// Arguments reaching a repository have already been validated by the service layer.
/// Implementations must make [`TokenRepository::upsert`] an atomic whole-record replace:
/// a concurrent [`TokenRepository::find_by_uid`] sees either the previous record or the new
/// one, never a mix of their fields.
#[async_trait]
pub trait TokenRepository: Send + Sync + 'static {
    /// Create the record for `record.uid`, or replace the existing one
    async fn upsert(&self, record: TokenRecord) -> Result<(), Error>;

    /// Find the record currently held for a uid, expired or not
    async fn find_by_uid(&self, uid: &str) -> Result<Option<TokenRecord>, Error>;

    /// Remove the record for a uid. Removing an unknown uid is not an error.
    async fn delete_by_uid(&self, uid: &str) -> Result<(), Error>;

    /// Remove every record
    async fn delete_all(&self) -> Result<(), Error>;

    /// Number of uids currently holding a record
    async fn count(&self) -> Result<usize, Error>;

    /// Remove records whose expiry is at or before `now`, returning how many were removed
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}
