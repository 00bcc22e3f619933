use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored password-reset token.
///
/// Only the SHA-256 digest of the token is persisted. A token is usable
/// while `used` is false and `expires_at` lies in the future; expiry is
/// derived from time and never written back.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}

/// One recorded login attempt. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoginAttempt {
    pub id: i64,
    pub email: String,
    pub attempt_time: DateTime<Utc>,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Lockout state of one email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    pub locked: bool,
    /// Most recent failure plus the lockout window, when locked
    pub unlock_at: Option<DateTime<Utc>>,
    /// Failures inside the window
    pub failed_attempts: i64,
}

impl LockStatus {
    pub fn unlocked(failed_attempts: i64) -> Self {
        Self {
            locked: false,
            unlock_at: None,
            failed_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_at: DateTime<Utc>, used: bool) -> PasswordResetToken {
        PasswordResetToken {
            id: 1,
            user_id: 1,
            token_hash: "digest".to_string(),
            expires_at,
            used,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_usable_until_expiry() {
        let now = Utc::now();
        assert!(token(now + Duration::minutes(15), false).is_usable(now));
        assert!(!token(now, false).is_usable(now));
        assert!(!token(now - Duration::seconds(1), false).is_usable(now));
    }

    #[test]
    fn test_used_token_not_usable() {
        let now = Utc::now();
        assert!(!token(now + Duration::minutes(15), true).is_usable(now));
    }
}
