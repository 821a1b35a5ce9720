use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kagi_core::{
    Error,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::TokenRepository,
    storage::TokenRecord,
};
use sqlx::{SqlitePool, error::ErrorKind};

pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteTokenRecord {
    uid: String,
    token_hash: String,
    referrer: Option<String>,
    created_at: i64,
    expires_at: i64,
}

impl TryFrom<SqliteTokenRecord> for TokenRecord {
    type Error = Error;

    fn try_from(row: SqliteTokenRecord) -> Result<Self, Self::Error> {
        Ok(TokenRecord::new(
            row.uid,
            row.token_hash,
            row.referrer,
            from_millis(row.created_at)?,
            from_millis(row.expires_at)?,
        ))
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        Error::Storage(StorageError::Database(format!(
            "Invalid timestamp: {millis}"
        )))
    })
}

/// Map a failed write, keeping schema constraint violations apart from other driver errors
fn map_write_err(context: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| match &e {
        sqlx::Error::Database(db)
            if matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ) =>
        {
            tracing::error!(error = %e, "{context}");
            Error::Storage(StorageError::Constraint(format!("{context}: {e}")))
        }
        _ => Error::Storage(StorageError::Database(format!("{context}: {e}"))),
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn upsert(&self, record: TokenRecord) -> Result<(), Error> {
        // A single statement keeps the replace atomic for concurrent readers
        sqlx::query(
            r#"
            INSERT INTO remember_tokens (uid, token_hash, referrer, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(uid) DO UPDATE SET
                token_hash = excluded.token_hash,
                referrer = excluded.referrer,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&record.uid)
        .bind(&record.token_hash)
        .bind(&record.referrer)
        .bind(record.created_at.timestamp_millis())
        .bind(record.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_write_err("Failed to store token"))?;

        Ok(())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<TokenRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteTokenRecord>(
            r#"
            SELECT uid, token_hash, referrer, created_at, expires_at
            FROM remember_tokens
            WHERE uid = ?1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_db_err()?;

        row.map(TokenRecord::try_from).transpose()
    }

    async fn delete_by_uid(&self, uid: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM remember_tokens WHERE uid = ?1")
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete token")?;

        Ok(())
    }

    async fn delete_all(&self) -> Result<(), Error> {
        sqlx::query("DELETE FROM remember_tokens")
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to clear tokens")?;

        Ok(())
    }

    async fn count(&self) -> Result<usize, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM remember_tokens")
            .fetch_one(&self.pool)
            .await
            .map_db_err()?;

        usize::try_from(count).map_db_err()
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM remember_tokens WHERE expires_at <= ?1")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to clean up expired tokens")?;

        Ok(result.rows_affected())
    }
}
