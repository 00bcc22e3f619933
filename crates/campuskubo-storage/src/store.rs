use crate::activity::ActivityLog;
use crate::auth::Authenticator;
use crate::config::{AuthConfig, StorageConfig};
use crate::connection::Database;
use crate::credentials::CredentialManager;
use crate::error::StorageResult;
use crate::reporting::Reporting;
use crate::repositories::{
    SqliteListingRepository, SqliteMessageRepository, SqliteNotificationRepository,
    SqlitePaymentRepository, SqliteProfileRepository, SqliteReportRepository,
    SqliteReservationRepository, SqliteResetTokenRepository, SqliteReviewRepository,
    SqliteSavedListingRepository, SqliteUserRepository,
};
use crate::schema;
use crate::throttle::LoginThrottle;
use sqlx::SqlitePool;
use tracing::info;

/// Entry point to the storage layer.
///
/// Built once at startup and shared. Repository handles are cheap to create:
/// each holds a clone of the pool plus the shared credential manager and
/// activity log.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
    auth: AuthConfig,
    credentials: CredentialManager,
    activity: ActivityLog,
}

impl Store {
    /// Open the configured database, migrate it and seed it when empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use campuskubo_storage::{Store, StorageConfig};
    /// use campuskubo_storage::repositories::ListingRepository;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = Store::open(StorageConfig::from_env()?).await?;
    /// let approved = store
    ///     .listings()
    ///     .list_by_status(campuskubo_core::ListingStatus::Approved)
    ///     .await?;
    /// println!("{} listings open for booking", approved.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(config: StorageConfig) -> StorageResult<Self> {
        let credentials = CredentialManager::new(config.auth.hash_scheme, config.auth.argon2)?;
        let db = Database::new(config.database.auto_migrate(false)).await?;
        schema::init_db(db.pool(), &credentials, config.force_seed).await?;

        info!(scheme = ?credentials.scheme(), "Store ready");
        Ok(Self::assemble(db, config.auth, credentials))
    }

    /// Migrated in-memory store without demo data.
    pub async fn in_memory(auth: AuthConfig) -> StorageResult<Self> {
        let credentials = CredentialManager::new(auth.hash_scheme, auth.argon2)?;
        let db = Database::in_memory().await?;
        Ok(Self::assemble(db, auth, credentials))
    }

    fn assemble(db: Database, auth: AuthConfig, credentials: CredentialManager) -> Self {
        let activity = ActivityLog::new(db.pool().clone());
        Self {
            db,
            auth,
            credentials,
            activity,
        }
    }

    /// Raw pool for ad-hoc reporting queries.
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    fn pool_clone(&self) -> SqlitePool {
        self.db.pool().clone()
    }

    pub fn users(&self) -> SqliteUserRepository {
        SqliteUserRepository::new(
            self.pool_clone(),
            self.credentials.clone(),
            self.activity.clone(),
        )
    }

    pub fn listings(&self) -> SqliteListingRepository {
        SqliteListingRepository::new(self.pool_clone(), self.activity.clone())
    }

    pub fn reservations(&self) -> SqliteReservationRepository {
        SqliteReservationRepository::new(self.pool_clone(), self.activity.clone())
    }

    pub fn payments(&self) -> SqlitePaymentRepository {
        SqlitePaymentRepository::new(self.pool_clone(), self.activity.clone())
    }

    pub fn notifications(&self) -> SqliteNotificationRepository {
        SqliteNotificationRepository::new(self.pool_clone())
    }

    pub fn saved_listings(&self) -> SqliteSavedListingRepository {
        SqliteSavedListingRepository::new(self.pool_clone())
    }

    pub fn reviews(&self) -> SqliteReviewRepository {
        SqliteReviewRepository::new(self.pool_clone(), self.activity.clone())
    }

    pub fn messages(&self) -> SqliteMessageRepository {
        SqliteMessageRepository::new(self.pool_clone())
    }

    pub fn reports(&self) -> SqliteReportRepository {
        SqliteReportRepository::new(self.pool_clone(), self.activity.clone())
    }

    pub fn profiles(&self) -> SqliteProfileRepository {
        SqliteProfileRepository::new(self.pool_clone())
    }

    pub fn reset_tokens(&self) -> SqliteResetTokenRepository {
        SqliteResetTokenRepository::new(self.pool_clone(), self.auth.reset_token_rate_limit)
    }

    pub fn throttle(&self) -> LoginThrottle {
        LoginThrottle::new(self.pool_clone())
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn reporting(&self) -> Reporting {
        Reporting::new(self.pool_clone())
    }

    /// Login and password-reset flows
    pub fn auth(&self) -> Authenticator {
        Authenticator::new(
            self.pool_clone(),
            self.credentials.clone(),
            self.activity.clone(),
            self.auth.clone(),
        )
    }

    /// Close the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
