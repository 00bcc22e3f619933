//! SQLite connection factory.
//!
//! Every connection handed out by [`Database`] runs with WAL journaling,
//! enforced foreign keys, `synchronous=NORMAL` and a busy timeout, so
//! cascades and concurrent readers behave the same in every caller.

use crate::error::{StorageError, StorageResult};
use crate::schema;
use campuskubo_core::constants::{DEFAULT_DATABASE_FILE, SQLITE_BUSY_TIMEOUT_SECONDS};
use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Where the database lives and how the pool around it is sized.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file, created with its parent directory when missing
    pub database_path: String,

    pub max_connections: u32,

    /// Idle connections kept open
    pub min_connections: u32,

    /// Connections older than this are recycled
    pub max_lifetime: Duration,

    /// Wait limit when the pool is exhausted
    pub acquire_timeout: Duration,

    /// Wait limit when another connection holds the write lock
    pub busy_timeout: Duration,

    pub create_if_missing: bool,

    /// Run [`schema::migrate`] before the pool is returned
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_FILE.to_string(),
            max_connections: 5,
            min_connections: 1,
            max_lifetime: Duration::from_secs(30 * 60),
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECONDS),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }

    /// Per-connection pragmas for the configured file.
    fn connect_options(&self) -> StorageResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", self.database_path))
            .map_err(|e| {
                StorageError::Configuration(format!(
                    "Invalid database path '{}': {e}",
                    self.database_path
                ))
            })?;

        Ok(options
            .create_if_missing(self.create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .disable_statement_logging())
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .max_lifetime(Some(self.max_lifetime))
            .acquire_timeout(self.acquire_timeout)
    }

    fn ensure_parent_dir(&self) -> StorageResult<()> {
        let Some(parent) = Path::new(&self.database_path).parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || parent.exists() {
            return Ok(());
        }

        std::fs::create_dir_all(parent).map_err(|e| {
            StorageError::Configuration(format!(
                "Cannot create database directory {}: {e}",
                parent.display()
            ))
        })
    }
}

/// Shared connection pool.
///
/// A repository call holds a connection for one statement or one
/// transaction, never across calls.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and by default migrate) the configured database file.
    ///
    /// Seeding is not done here; see [`crate::Store::open`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use campuskubo_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(DatabaseConfig::new("data/campuskubo.db").max_connections(2)).await?;
    /// db.health_check().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        config.ensure_parent_dir()?;

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await?;
        info!(path = %config.database_path, "Database opened");

        let db = Self { pool };
        if config.auto_migrate {
            db.migrate().await?;
        }

        Ok(db)
    }

    /// Fresh, migrated in-memory database for tests.
    ///
    /// The pool holds exactly one connection that is never recycled, since the
    /// data lives and dies with it.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        debug!("In-memory database opened");

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Idempotent; see [`schema::migrate`].
    pub async fn migrate(&self) -> StorageResult<()> {
        schema::migrate(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = DatabaseConfig::default();

        assert_eq!(config.database_path, "campuskubo.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_lifetime, Duration::from_secs(1800));
        assert_eq!(config.busy_timeout, Duration::from_secs(30));
        assert!(config.create_if_missing);
        assert!(config.auto_migrate);
    }

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("kubo.db")
            .max_connections(2)
            .min_connections(0)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(false)
            .auto_migrate(false);

        assert_eq!(config.database_path, "kubo.db");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(!config.create_if_missing);
        assert!(!config.auto_migrate);
    }

    #[tokio::test]
    async fn test_in_memory_enforces_foreign_keys() {
        let db = Database::in_memory().await.unwrap();

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_file_database_uses_wal_in_new_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("kubo.db");

        let db = Database::new(DatabaseConfig::new(path.to_string_lossy()))
            .await
            .unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
        db.close().await;
    }

    #[tokio::test]
    async fn test_missing_file_without_create_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");

        let config = DatabaseConfig::new(path.to_string_lossy()).create_if_missing(false);
        let result = Database::new(config).await;
        assert!(result.is_err());
    }
}
