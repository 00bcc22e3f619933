use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit-trail entry joined with the acting user's identity.
///
/// `user_id`, `user_name` and `user_email` are `None` for system actions and
/// for actors whose account has since been hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl ActivityEntry {
    /// Display label for the actor
    pub fn actor(&self) -> &str {
        self.user_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.user_email.as_deref())
            .unwrap_or("System")
    }
}
