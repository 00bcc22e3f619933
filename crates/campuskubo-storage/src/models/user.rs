use campuskubo_core::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account: tenant, property manager or administrator.
///
/// # Fields
///
/// * `id` - Auto-increment primary key
/// * `email` - Unique, stored trimmed and lower-cased
/// * `password` - Argon2 PHC string or legacy SHA-256 hex digest
/// * `role` - Normalised role, decoded straight into [`Role`]
/// * `full_name` - Display name
/// * `phone` - Optional contact number
/// * `is_active` - False once deactivated or soft-deleted
/// * `is_verified` - Approval gate for property managers
/// * `avatar` - Path or URL of the profile picture
/// * `created_at` / `updated_at` - Timestamps
/// * `deleted_at` - Soft-delete marker
///
/// # Deletion
///
/// A user can be soft-deleted (`deleted_at` set, `is_active` cleared) or
/// hard-deleted. A hard delete cascades to listings, reservations, reset
/// tokens, addresses, settings, notifications, saved listings, reviews,
/// messages and payments, and nulls the actor of their activity-log rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    pub email: String,

    /// Never serialised
    #[serde(skip_serializing, default)]
    pub password: String,

    #[sqlx(try_from = "String")]
    pub role: Role,

    pub full_name: String,

    pub phone: Option<String>,

    pub is_active: bool,

    pub is_verified: bool,

    pub avatar: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,

    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether the account has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the account may sign in
    pub fn can_login(&self) -> bool {
        self.is_active && !self.is_deleted()
    }

    /// Whether the account is a property manager
    pub fn is_property_manager(&self) -> bool {
        self.role.is_property_manager()
    }

    /// Whether the account is an administrator
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Input for [`crate::repositories::UserRepository::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    /// Plaintext; hashed before it reaches the database
    pub password: String,
    /// Free text, normalised on write
    pub role: String,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            password: password.into(),
            role: role.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user() -> User {
        User {
            id: 1,
            email: "jane@x.com".to_string(),
            password: "hash".to_string(),
            role: Role::Tenant,
            full_name: "Jane Doe".to_string(),
            phone: None,
            is_active: true,
            is_verified: true,
            avatar: None,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn test_active_user_can_login() {
        assert!(create_test_user().can_login());
    }

    #[test]
    fn test_soft_deleted_user_cannot_login() {
        let mut user = create_test_user();
        user.deleted_at = Some(Utc::now());
        assert!(user.is_deleted());
        assert!(!user.can_login());
    }

    #[test]
    fn test_inactive_user_cannot_login() {
        let mut user = create_test_user();
        user.is_active = false;
        assert!(!user.can_login());
    }

    #[test]
    fn test_password_not_serialized() {
        let json = serde_json::to_string(&create_test_user()).unwrap();
        assert!(!json.contains("hash"));
        assert!(json.contains("\"role\":\"tenant\""));
    }
}
