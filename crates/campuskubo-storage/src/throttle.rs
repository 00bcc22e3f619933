//! Failed-login throttling.
//!
//! An email is locked once it collects `max_attempts` failures inside the
//! trailing window. The lock lifts by itself when the most recent failure
//! leaves the window, or at once when [`LoginThrottle::clear_failures`] runs
//! after a successful login or password reset.

use crate::error::{StorageError, StorageResult};
use crate::models::LockStatus;
use campuskubo_core::password::normalize_email;
use chrono::{TimeDelta, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LoginThrottle {
    pool: SqlitePool,
}

impl LoginThrottle {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one attempt. Failures are logged, never returned.
    pub async fn log_attempt(
        &self,
        email: &str,
        success: bool,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) {
        let email = normalize_email(email);
        let result = sqlx::query(
            r#"
            INSERT INTO login_attempts (email, attempt_time, success, ip_address, user_agent)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&email)
        .bind(Utc::now())
        .bind(success)
        .bind(ip_address)
        .bind(user_agent)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(email = %email, success, "Failed to record login attempt: {}", e);
        }
    }

    /// Lock state of `email` for the given threshold and window.
    pub async fn lock_status(
        &self,
        email: &str,
        max_attempts: u32,
        window: Duration,
    ) -> StorageResult<LockStatus> {
        let email = normalize_email(email);
        let window = to_time_delta(window)?;
        let since = Utc::now() - window;

        let (failures, latest): (i64, Option<chrono::DateTime<Utc>>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), MAX(attempt_time)
            FROM login_attempts
            WHERE email = ? AND success = 0 AND attempt_time > ?
            "#,
        )
        .bind(&email)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        if failures < i64::from(max_attempts.max(1)) {
            return Ok(LockStatus::unlocked(failures));
        }

        let unlock_at = latest.map(|t| t + window);
        debug!(email = %email, failures, ?unlock_at, "Account locked");

        Ok(LockStatus {
            locked: true,
            unlock_at,
            failed_attempts: failures,
        })
    }

    /// Delete the failed attempts of `email`. Returns the number removed.
    pub async fn clear_failures(&self, email: &str) -> StorageResult<u64> {
        let email = normalize_email(email);
        let result = sqlx::query("DELETE FROM login_attempts WHERE email = ? AND success = 0")
            .bind(&email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn to_time_delta(window: Duration) -> StorageResult<TimeDelta> {
    TimeDelta::from_std(window)
        .map_err(|_| StorageError::Configuration(format!("Lockout window {window:?} is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;

    const WINDOW: Duration = Duration::from_secs(30);

    async fn setup() -> (Database, LoginThrottle) {
        let db = Database::in_memory().await.unwrap();
        let throttle = LoginThrottle::new(db.pool().clone());
        (db, throttle)
    }

    #[tokio::test]
    async fn test_locks_at_threshold() {
        let (_db, throttle) = setup().await;

        for _ in 0..4 {
            throttle.log_attempt("jane@x.com", false, None, None).await;
        }
        let status = throttle.lock_status("jane@x.com", 5, WINDOW).await.unwrap();
        assert!(!status.locked);
        assert_eq!(status.failed_attempts, 4);

        throttle.log_attempt("jane@x.com", false, None, None).await;
        let status = throttle.lock_status("jane@x.com", 5, WINDOW).await.unwrap();
        assert!(status.locked);
        let unlock_at = status.unlock_at.unwrap();
        assert!(unlock_at > Utc::now());
        assert!(unlock_at <= Utc::now() + TimeDelta::seconds(30));
    }

    #[tokio::test]
    async fn test_email_normalized() {
        let (_db, throttle) = setup().await;

        for _ in 0..3 {
            throttle.log_attempt("  Jane@X.com ", false, None, None).await;
        }
        let status = throttle.lock_status("jane@x.com", 3, WINDOW).await.unwrap();
        assert!(status.locked);
    }

    #[tokio::test]
    async fn test_successes_do_not_count() {
        let (_db, throttle) = setup().await;

        for _ in 0..5 {
            throttle.log_attempt("jane@x.com", true, Some("127.0.0.1"), None).await;
        }
        let status = throttle.lock_status("jane@x.com", 5, WINDOW).await.unwrap();
        assert!(!status.locked);
        assert_eq!(status.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_failures_outside_window_expire() {
        let (db, throttle) = setup().await;

        for _ in 0..5 {
            throttle.log_attempt("jane@x.com", false, None, None).await;
        }
        sqlx::query("UPDATE login_attempts SET attempt_time = ?")
            .bind(Utc::now() - TimeDelta::seconds(31))
            .execute(db.pool())
            .await
            .unwrap();

        let status = throttle.lock_status("jane@x.com", 5, WINDOW).await.unwrap();
        assert!(!status.locked);
    }

    #[tokio::test]
    async fn test_clear_failures_unlocks() {
        let (_db, throttle) = setup().await;

        for _ in 0..5 {
            throttle.log_attempt("jane@x.com", false, None, None).await;
        }
        throttle.log_attempt("jane@x.com", true, None, None).await;

        assert_eq!(throttle.clear_failures("JANE@x.com").await.unwrap(), 5);
        let status = throttle.lock_status("jane@x.com", 5, WINDOW).await.unwrap();
        assert!(!status.locked);
    }
}
