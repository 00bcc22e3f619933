use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-app notification for one user.
///
/// `reference_id`/`reference_type` point at the entity the notification is
/// about (for example a reservation id and `"reservation"`).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub category: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub reference_id: Option<i64>,
    pub reference_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Input for [`crate::repositories::NotificationRepository::create`].
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: String,
    pub category: Option<String>,
    pub message: String,
    pub reference_id: Option<i64>,
    pub reference_type: Option<String>,
}

impl NewNotification {
    pub fn new(user_id: i64, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            kind: kind.into(),
            category: None,
            message: message.into(),
            reference_id: None,
            reference_type: None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn reference(mut self, id: i64, kind: impl Into<String>) -> Self {
        self.reference_id = Some(id);
        self.reference_type = Some(kind.into());
        self
    }
}
