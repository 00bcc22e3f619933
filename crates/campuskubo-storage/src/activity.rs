//! Append-only audit trail.
//!
//! Appending never fails the caller: the activity row is a side record of a
//! mutation that has already committed, so errors are logged and dropped.

use crate::error::StorageResult;
use crate::models::ActivityEntry;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Handle to the `activity_logs` table.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    pool: SqlitePool,
}

impl ActivityLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record `action` performed by `user_id` (`None` for system actions).
    ///
    /// Must not be called while a transaction on the same pool is open.
    pub async fn log(&self, user_id: Option<i64>, action: &str, details: Option<&str>) {
        let result = sqlx::query(
            "INSERT INTO activity_logs (user_id, action, details, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(action)
        .bind(details)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => debug!(?user_id, action, "Activity recorded"),
            Err(e) => warn!(?user_id, action, "Failed to record activity: {}", e),
        }
    }

    /// Most recent entries first, joined with the actor's name and email.
    pub async fn recent(&self, limit: i64) -> StorageResult<Vec<ActivityEntry>> {
        let entries = sqlx::query_as::<_, ActivityEntry>(
            r#"
            SELECT a.id, a.user_id, a.action, a.details, a.created_at,
                   u.full_name AS user_name, u.email AS user_email
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Most recent entries of one actor.
    pub async fn for_user(&self, user_id: i64, limit: i64) -> StorageResult<Vec<ActivityEntry>> {
        let entries = sqlx::query_as::<_, ActivityEntry>(
            r#"
            SELECT a.id, a.user_id, a.action, a.details, a.created_at,
                   u.full_name AS user_name, u.email AS user_email
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.user_id = ?
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
