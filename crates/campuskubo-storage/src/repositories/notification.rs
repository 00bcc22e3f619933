#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::{NewNotification, Notification};
use chrono::Utc;
use sqlx::SqlitePool;

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, category, message, is_read, reference_id, \
                                    reference_type, created_at, read_at";

/// In-app notifications
///
/// Notifications are not audited; they are themselves a side effect of
/// audited mutations.
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> StorageResult<i64>;

    /// Notifications of one user, newest first
    async fn list_for_user(&self, user_id: i64, unread_only: bool)
    -> StorageResult<Vec<Notification>>;

    async fn unread_count(&self, user_id: i64) -> StorageResult<i64>;

    /// Mark one notification read. Already-read notifications are left as is.
    async fn mark_read(&self, id: i64, user_id: i64) -> StorageResult<()>;

    /// Mark every unread notification of a user read, returning the count
    async fn mark_all_read(&self, user_id: i64) -> StorageResult<u64>;

    async fn delete(&self, id: i64, user_id: i64) -> StorageResult<()>;
}

pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for SqliteNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> StorageResult<i64> {
        if notification.message.trim().is_empty() {
            return Err(StorageError::validation("Notification message is required"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, type, category, message, reference_id, reference_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.category)
        .bind(notification.message.trim())
        .bind(notification.reference_id)
        .bind(&notification.reference_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> StorageResult<Vec<Notification>> {
        let filter = if unread_only { " AND is_read = 0" } else { "" };
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = ?{filter} \
             ORDER BY created_at DESC, id DESC"
        );
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    async fn unread_count(&self, user_id: i64) -> StorageResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = 1, read_at = COALESCE(read_at, ?)
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Notification", "id", id));
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64) -> StorageResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = ? WHERE user_id = ? AND is_read = 0",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64, user_id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Notification", "id", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support;

    #[tokio::test]
    async fn test_read_flow() {
        let store = test_support::store().await;
        let user = test_support::tenant(&store, "t@x.com").await;
        let notifications = store.notifications();

        let first = notifications
            .create(&NewNotification::new(user, "info", "Welcome to CampusKubo").category("system"))
            .await
            .unwrap();
        notifications
            .create(&NewNotification::new(user, "alert", "Payment due").reference(7, "payment"))
            .await
            .unwrap();
        assert_eq!(notifications.unread_count(user).await.unwrap(), 2);

        notifications.mark_read(first, user).await.unwrap();
        let unread = notifications.list_for_user(user, true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, "alert");

        let all = notifications.list_for_user(user, false).await.unwrap();
        let read = all.iter().find(|n| n.id == first).unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());

        assert_eq!(notifications.mark_all_read(user).await.unwrap(), 1);
        assert_eq!(notifications.unread_count(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_users_notifications_untouchable() {
        let store = test_support::store().await;
        let owner = test_support::tenant(&store, "a@x.com").await;
        let other = test_support::tenant(&store, "b@x.com").await;
        let notifications = store.notifications();

        let id = notifications
            .create(&NewNotification::new(owner, "info", "Hello"))
            .await
            .unwrap();

        let err = notifications.mark_read(id, other).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(notifications.delete(id, other).await.unwrap_err().kind(), ErrorKind::NotFound);
        notifications.delete(id, owner).await.unwrap();
        assert!(notifications.list_for_user(owner, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let store = test_support::store().await;
        let user = test_support::tenant(&store, "t@x.com").await;

        let err = store
            .notifications()
            .create(&NewNotification::new(user, "info", "  "))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
