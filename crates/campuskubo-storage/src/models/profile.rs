use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Postal address of a user. At most one per user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAddress {
    pub user_id: i64,
    pub street: Option<String>,
    pub barangay: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-user preferences. Users without a row get [`UserSettings::defaults_for`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: i64,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub dark_mode: bool,
    pub language: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserSettings {
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            email_notifications: true,
            sms_notifications: false,
            dark_mode: false,
            language: "en".to_string(),
            updated_at: None,
        }
    }
}

/// Global key/value setting managed by administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    pub updated_at: Option<DateTime<Utc>>,
}
