#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::Message;
use chrono::Utc;
use sqlx::SqlitePool;

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, listing_id, body, is_read, created_at";

/// Direct messages between users
pub trait MessageRepository: Send + Sync {
    async fn send(
        &self,
        sender_id: i64,
        receiver_id: i64,
        listing_id: Option<i64>,
        body: &str,
    ) -> StorageResult<i64>;

    /// Both directions between two users, oldest first
    async fn conversation(&self, user_a: i64, user_b: i64) -> StorageResult<Vec<Message>>;

    /// Messages received by a user, newest first
    async fn inbox(&self, user_id: i64) -> StorageResult<Vec<Message>>;

    /// Mark a received message read
    async fn mark_read(&self, id: i64, user_id: i64) -> StorageResult<()>;
}

pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl MessageRepository for SqliteMessageRepository {
    async fn send(
        &self,
        sender_id: i64,
        receiver_id: i64,
        listing_id: Option<i64>,
        body: &str,
    ) -> StorageResult<i64> {
        let body = body.trim();
        if body.is_empty() {
            return Err(StorageError::validation("Message cannot be empty"));
        }
        if sender_id == receiver_id {
            return Err(StorageError::validation("Cannot send a message to yourself"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, listing_id, body, is_read, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(listing_id)
        .bind(body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn conversation(&self, user_a: i64, user_b: i64) -> StorageResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?) \
             ORDER BY created_at, id"
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(user_a)
            .bind(user_b)
            .bind(user_b)
            .bind(user_a)
            .fetch_all(&self.pool)
            .await?;

        Ok(messages)
    }

    async fn inbox(&self, user_id: i64) -> StorageResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver_id = ? ORDER BY created_at DESC, id DESC"
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(messages)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> StorageResult<()> {
        let result = sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ? AND receiver_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Message", "id", id));
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
    async fn test_conversation_both_directions() {
        let store = test_support::store().await;
        let tenant = test_support::tenant(&store, "t@x.com").await;
        let pm = test_support::pm(&store, "pm@x.com").await;
        let other = test_support::tenant(&store, "o@x.com").await;
        let messages = store.messages();

        messages.send(tenant, pm, None, "Is the room available?").await.unwrap();
        let reply = messages.send(pm, tenant, None, "Yes, from June.").await.unwrap();
        messages.send(other, pm, None, "Hello").await.unwrap();

        let thread = messages.conversation(pm, tenant).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].body, "Is the room available?");
        assert_eq!(thread[1].id, reply);

        assert_eq!(messages.inbox(pm).await.unwrap().len(), 2);

        assert_eq!(messages.mark_read(reply, pm).await.unwrap_err().kind(), ErrorKind::NotFound);
        messages.mark_read(reply, tenant).await.unwrap();
        assert!(messages.inbox(tenant).await.unwrap()[0].is_read);
    }

    #[tokio::test]
    async fn test_invalid_messages_rejected() {
        let store = test_support::store().await;
        let tenant = test_support::tenant(&store, "t@x.com").await;
        let messages = store.messages();

        assert_eq!(
            messages.send(tenant, tenant, None, "hi").await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            messages.send(tenant, 999, None, "  ").await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            messages.send(tenant, 999, None, "hi").await.unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }
}
