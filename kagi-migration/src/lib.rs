//! Schema migration traits shared by the SQL storage backends
//!
//! A backend defines its schema as an ordered list of [`Migration`]s and implements
//! [`MigrationManager`] to apply them, recording each applied version in a tracking table.
use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: i64, // unix timestamp since no database can agree on a datetime type
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        "_kagi_migrations"
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations in the order given
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Roll back applied migrations, newest first
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;

    /// Versions from `migrations` that have not been applied yet
    async fn pending(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<Vec<i64>> {
        let mut pending = Vec::new();
        for migration in migrations {
            if !self.is_applied(migration.version()).await? {
                pending.push(migration.version());
            }
        }
        Ok(pending)
    }
}

/// Reject a migration list whose versions are not strictly increasing.
///
/// Managers apply migrations in slice order, so an out-of-order or duplicated version would
/// leave the tracking table disagreeing with the schema.
pub fn check_order<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    for pair in migrations.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if next.version() <= previous.version() {
            return Err(MigrationError::Migration(format!(
                "migration {} ({}) must have a version greater than {} ({})",
                next.name(),
                next.version(),
                previous.name(),
                previous.version()
            )));
        }
    }
    Ok(())
}
