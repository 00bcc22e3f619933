#![allow(async_fn_in_trait)]

use crate::credentials::hash_token;
use crate::error::{StorageError, StorageResult};
use crate::models::PasswordResetToken;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info};

/// Password-reset token storage.
///
/// Tokens are addressed by their raw value; only the SHA-256 digest reaches
/// the database.
pub trait ResetTokenRepository: Send + Sync {
    /// Store `token` for `user_id`, replacing the user's unused tokens.
    ///
    /// Fails with `RateLimited` when an unused token was issued to the user
    /// less than the rate-limit interval ago.
    async fn create(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// User id of an unused, unexpired token
    async fn verify(&self, token: &str) -> StorageResult<Option<i64>>;

    /// Consume a token. Returns false when no unused token matched.
    async fn mark_used(&self, token: &str) -> StorageResult<bool>;

    /// Consume an unused, unexpired token and store `password_hash` for its
    /// user in one transaction. Returns the user id, or `None` (and changes
    /// nothing) when the token is not redeemable.
    async fn redeem(&self, token: &str, password_hash: &str) -> StorageResult<Option<i64>>;

    /// Delete expired tokens, returning how many were removed
    async fn cleanup_expired(&self) -> StorageResult<u64>;

    /// Tokens of one user, newest first
    async fn list_for_user(&self, user_id: i64) -> StorageResult<Vec<PasswordResetToken>>;
}

pub struct SqliteResetTokenRepository {
    pool: SqlitePool,
    rate_limit: TimeDelta,
}

impl SqliteResetTokenRepository {
    pub fn new(pool: SqlitePool, rate_limit: Duration) -> Self {
        Self {
            pool,
            rate_limit: TimeDelta::from_std(rate_limit).unwrap_or(TimeDelta::MAX),
        }
    }
}

impl ResetTokenRepository for SqliteResetTokenRepository {
    async fn create(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(created_at) FROM password_reset_tokens WHERE user_id = ? AND used = 0",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(created) = latest
            && now.signed_duration_since(created) < self.rate_limit
        {
            return Err(StorageError::RateLimited(
                "A reset link was sent recently. Please wait before requesting another."
                    .to_string(),
            ));
        }

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = ? AND used = 0")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at, used, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id, %expires_at, "Reset token issued");
        Ok(())
    }

    async fn verify(&self, token: &str) -> StorageResult<Option<i64>> {
        let user_id = sqlx::query_scalar(
            r#"
            SELECT user_id FROM password_reset_tokens
            WHERE token_hash = ? AND used = 0 AND expires_at > ?
            "#,
        )
        .bind(hash_token(token))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn mark_used(&self, token: &str) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used = 1 WHERE token_hash = ? AND used = 0",
        )
        .bind(hash_token(token))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn redeem(&self, token: &str, password_hash: &str) -> StorageResult<Option<i64>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let user_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE password_reset_tokens SET used = 1
            WHERE token_hash = ? AND used = 0 AND expires_at > ?
            RETURNING user_id
            "#,
        )
        .bind(hash_token(token))
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        let updated = sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::not_found("User", "id", user_id));
        }

        tx.commit().await?;
        debug!(user_id, "Reset token redeemed");
        Ok(Some(user_id))
    }

    async fn cleanup_expired(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, "Expired reset tokens deleted");
        }
        Ok(removed)
    }

    async fn list_for_user(&self, user_id: i64) -> StorageResult<Vec<PasswordResetToken>> {
        let tokens = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, used, created_at
            FROM password_reset_tokens
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use crate::credentials::generate_reset_token;
    use crate::error::ErrorKind;

    async fn setup() -> (Database, SqliteResetTokenRepository, i64) {
        let db = Database::in_memory().await.unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (email, password, role, created_at) VALUES ('jane@x.com', 'x', 'tenant', ?)",
        )
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap()
        .last_insert_rowid();
        let repo = SqliteResetTokenRepository::new(db.pool().clone(), Duration::from_secs(300));
        (db, repo, user_id)
    }

    fn in_minutes(minutes: i64) -> DateTime<Utc> {
        Utc::now() + TimeDelta::minutes(minutes)
    }

    async fn backdate_created(db: &Database, seconds: i64) {
        sqlx::query("UPDATE password_reset_tokens SET created_at = ?")
            .bind(Utc::now() - TimeDelta::seconds(seconds))
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let (_db, repo, user_id) = setup().await;
        let token = generate_reset_token();

        repo.create(user_id, &token, in_minutes(15)).await.unwrap();
        assert_eq!(repo.verify(&token).await.unwrap(), Some(user_id));

        assert!(repo.mark_used(&token).await.unwrap());
        assert_eq!(repo.verify(&token).await.unwrap(), None);
        assert!(!repo.mark_used(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_raw_token_not_stored() {
        let (_db, repo, user_id) = setup().await;
        let token = generate_reset_token();

        repo.create(user_id, &token, in_minutes(15)).await.unwrap();
        let stored = repo.list_for_user(user_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0].token_hash, token);
        assert_eq!(stored[0].token_hash, hash_token(&token));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (_db, repo, user_id) = setup().await;
        let token = generate_reset_token();

        repo.create(user_id, &token, in_minutes(-1)).await.unwrap();
        assert_eq!(repo.verify(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let (_db, repo, _) = setup().await;
        assert_eq!(repo.verify("not-a-token").await.unwrap(), None);
        assert!(!repo.mark_used("not-a-token").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_request_rate_limited() {
        let (_db, repo, user_id) = setup().await;
        let first = generate_reset_token();
        repo.create(user_id, &first, in_minutes(15)).await.unwrap();

        let err = repo
            .create(user_id, &generate_reset_token(), in_minutes(15))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RateLimited(_)));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(repo.verify(&first).await.unwrap(), Some(user_id));
    }

    #[tokio::test]
    async fn test_new_token_replaces_unused_after_interval() {
        let (db, repo, user_id) = setup().await;
        let first = generate_reset_token();
        repo.create(user_id, &first, in_minutes(15)).await.unwrap();
        backdate_created(&db, 301).await;

        let second = generate_reset_token();
        repo.create(user_id, &second, in_minutes(15)).await.unwrap();

        assert_eq!(repo.verify(&first).await.unwrap(), None);
        assert_eq!(repo.verify(&second).await.unwrap(), Some(user_id));
        assert_eq!(repo.list_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_used_token_does_not_rate_limit() {
        let (_db, repo, user_id) = setup().await;
        let first = generate_reset_token();
        repo.create(user_id, &first, in_minutes(15)).await.unwrap();
        repo.mark_used(&first).await.unwrap();

        repo.create(user_id, &generate_reset_token(), in_minutes(15))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (db, repo, user_id) = setup().await;
        repo.create(user_id, &generate_reset_token(), in_minutes(-5))
            .await
            .unwrap();
        sqlx::query("UPDATE password_reset_tokens SET used = 1")
            .execute(db.pool())
            .await
            .unwrap();
        let live = generate_reset_token();
        repo.create(user_id, &live, in_minutes(15)).await.unwrap();

        assert_eq!(repo.cleanup_expired().await.unwrap(), 1);
        assert_eq!(repo.cleanup_expired().await.unwrap(), 0);
        assert_eq!(repo.verify(&live).await.unwrap(), Some(user_id));
    }

    async fn stored_password(db: &Database, user_id: i64) -> String {
        sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_redeem_consumes_token_with_password_change() {
        let (db, repo, user_id) = setup().await;
        let token = generate_reset_token();
        repo.create(user_id, &token, in_minutes(15)).await.unwrap();

        assert_eq!(repo.redeem(&token, "new-hash").await.unwrap(), Some(user_id));
        assert_eq!(stored_password(&db, user_id).await, "new-hash");
        assert_eq!(repo.verify(&token).await.unwrap(), None);

        assert_eq!(repo.redeem(&token, "other-hash").await.unwrap(), None);
        assert_eq!(stored_password(&db, user_id).await, "new-hash");
    }

    #[tokio::test]
    async fn test_redeem_expired_token_changes_nothing() {
        let (db, repo, user_id) = setup().await;
        let token = generate_reset_token();
        repo.create(user_id, &token, in_minutes(-1)).await.unwrap();

        assert_eq!(repo.redeem(&token, "new-hash").await.unwrap(), None);
        assert_eq!(stored_password(&db, user_id).await, "x");
        let stored = repo.list_for_user(user_id).await.unwrap();
        assert!(!stored[0].used);
    }
}
