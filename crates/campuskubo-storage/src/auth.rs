//! Login and password-reset flows.
//!
//! [`Authenticator`] ties the user repository, the credential manager, the
//! login throttle and the reset-token store together. Every login attempt
//! is recorded; an email that is locked is rejected before its account is
//! even looked up.

use crate::activity::ActivityLog;
use crate::config::AuthConfig;
use crate::credentials::{CredentialManager, generate_reset_token};
use crate::error::{StorageError, StorageResult};
use crate::models::User;
use crate::repositories::{
    ResetTokenRepository, SqliteResetTokenRepository, SqliteUserRepository, UserRepository,
};
use crate::throttle::LoginThrottle;
use campuskubo_core::password::{normalize_email, validate_password};
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Result of a login attempt.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(User),
    /// Unknown email or wrong password
    InvalidCredentials,
    /// Too many recent failures
    Locked { unlock_at: Option<DateTime<Utc>> },
    /// Correct password for a deactivated or deleted account
    Inactive,
}

impl LoginOutcome {
    /// The signed-in user, if any
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Client details recorded with a login attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientInfo<'a> {
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

pub struct Authenticator {
    users: SqliteUserRepository,
    reset_tokens: SqliteResetTokenRepository,
    credentials: CredentialManager,
    throttle: LoginThrottle,
    activity: ActivityLog,
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(
        pool: SqlitePool,
        credentials: CredentialManager,
        activity: ActivityLog,
        config: AuthConfig,
    ) -> Self {
        Self {
            users: SqliteUserRepository::new(pool.clone(), credentials.clone(), activity.clone()),
            reset_tokens: SqliteResetTokenRepository::new(
                pool.clone(),
                config.reset_token_rate_limit,
            ),
            credentials,
            throttle: LoginThrottle::new(pool),
            activity,
            config,
        }
    }

    /// Check `email` and `password` without client details.
    pub async fn validate_user(&self, email: &str, password: &str) -> StorageResult<LoginOutcome> {
        self.login(email, password, ClientInfo::default()).await
    }

    /// Check credentials, honouring the lockout.
    ///
    /// On success prior failures are cleared and a legacy SHA-256 hash is
    /// replaced with one of the configured scheme. A failed rehash is logged
    /// and does not fail the login.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: ClientInfo<'_>,
    ) -> StorageResult<LoginOutcome> {
        let email = normalize_email(email);

        let lock = self
            .throttle
            .lock_status(&email, self.config.max_login_attempts, self.config.lockout_window)
            .await?;
        if lock.locked {
            debug!(email = %email, "Login refused while locked");
            return Ok(LoginOutcome::Locked {
                unlock_at: lock.unlock_at,
            });
        }

        let user = match self.users.find_by_email(&email).await? {
            Some(user) if self.credentials.verify_password(&user.password, password) => user,
            _ => {
                self.throttle
                    .log_attempt(&email, false, client.ip_address, client.user_agent)
                    .await;
                return Ok(LoginOutcome::InvalidCredentials);
            }
        };

        if !user.can_login() {
            self.throttle
                .log_attempt(&email, false, client.ip_address, client.user_agent)
                .await;
            return Ok(LoginOutcome::Inactive);
        }

        self.throttle
            .log_attempt(&email, true, client.ip_address, client.user_agent)
            .await;
        self.throttle.clear_failures(&email).await?;

        let user = self.upgrade_hash(user, password).await;

        self.activity.log(Some(user.id), "login", None).await;
        Ok(LoginOutcome::Authenticated(user))
    }

    async fn upgrade_hash(&self, mut user: User, password: &str) -> User {
        if !self.credentials.needs_upgrade(&user.password) {
            return user;
        }

        let upgraded = match self.credentials.hash_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(user_id = user.id, "Could not rehash legacy password: {}", e);
                return user;
            }
        };

        match self.users.set_password_hash(user.id, &upgraded).await {
            Ok(()) => {
                info!(user_id = user.id, "Upgraded legacy password hash");
                user.password = upgraded;
            }
            Err(e) => warn!(user_id = user.id, "Could not store upgraded hash: {}", e),
        }
        user
    }

    /// Issue a reset token for an active account and return the raw token.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or inactive accounts, `RateLimited` when a
    /// token was issued too recently.
    pub async fn request_password_reset(&self, email: &str) -> StorageResult<String> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .filter(User::can_login)
            .ok_or_else(|| StorageError::not_found("User", "email", &email))?;

        let ttl = TimeDelta::from_std(self.config.reset_token_ttl).map_err(|_| {
            StorageError::Configuration("Reset token lifetime is too large".to_string())
        })?;

        let token = generate_reset_token();
        self.reset_tokens
            .create(user.id, &token, Utc::now() + ttl)
            .await?;

        self.activity
            .log(Some(user.id), "password_reset_requested", None)
            .await;
        Ok(token)
    }

    /// Set a new password using a reset token.
    ///
    /// The token is consumed together with the password change, so a token
    /// stays usable when the new password is rejected or cannot be hashed.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> StorageResult<()> {
        validate_password(new_password)?;

        let invalid = || StorageError::validation("Invalid or expired reset token");
        if self.reset_tokens.verify(token).await?.is_none() {
            return Err(invalid());
        }

        let hash = self.credentials.hash_password(new_password)?;
        let user_id = self
            .reset_tokens
            .redeem(token, &hash)
            .await?
            .ok_or_else(invalid)?;

        if let Some(user) = self.users.find_by_id(user_id).await? {
            self.throttle.clear_failures(&user.email).await?;
        }

        info!(user_id, "Password reset");
        self.activity
            .log(Some(user_id), "password_reset", None)
            .await;
        Ok(())
    }
}
