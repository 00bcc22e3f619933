#![allow(async_fn_in_trait)]

use crate::activity::ActivityLog;
use crate::credentials::CredentialManager;
use crate::error::{StorageError, StorageResult};
use crate::models::{NewUser, ProfileUpdate, User};
use campuskubo_core::password::{normalize_email, validate_email_format, validate_password};
use campuskubo_core::Role;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteQueryResult;
use tracing::{debug, info};

const USER_COLUMNS: &str = "id, email, password, role, full_name, phone, is_active, is_verified, \
                            avatar, created_at, updated_at, deleted_at";

/// Repository trait for user accounts
///
/// Emails are normalised (trimmed, lower-cased) before every lookup and
/// write. Roles are normalised into [`Role`] on write, so reads never see
/// free text.
pub trait UserRepository: Send + Sync {
    /// Register a new account and return its id.
    ///
    /// Validates the name, the email (format and uniqueness), the password
    /// policy and the role. Property managers start unverified.
    async fn create_user(&self, user: &NewUser) -> StorageResult<i64>;

    /// Find a user by id, including soft-deleted accounts
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<User>>;

    /// Find a user by email, case-insensitively
    async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    /// Check whether an email is already registered
    async fn exists_by_email(&self, email: &str) -> StorageResult<bool>;

    /// Check the email format, then that it is not registered yet
    async fn validate_email(&self, email: &str) -> StorageResult<()>;

    /// List users, optionally restricted to one role
    async fn list_users(&self, role: Option<Role>, include_deleted: bool)
    -> StorageResult<Vec<User>>;

    /// Update name, email and phone
    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> StorageResult<()>;

    /// Change a user's role
    async fn update_role(&self, id: i64, role: Role) -> StorageResult<()>;

    /// Activate or deactivate an account
    async fn set_active(&self, id: i64, active: bool) -> StorageResult<()>;

    /// Approve (or revoke approval of) an account
    async fn set_verified(&self, id: i64, verified: bool) -> StorageResult<()>;

    /// Check the policy, hash and store a new password
    async fn update_password(&self, id: i64, new_password: &str) -> StorageResult<()>;

    /// Store an already computed password hash
    async fn set_password_hash(&self, id: i64, hash: &str) -> StorageResult<()>;

    /// Set or clear the avatar path
    async fn update_avatar(&self, id: i64, avatar: Option<&str>) -> StorageResult<()>;

    /// Mark an account deleted without removing it
    async fn soft_delete(&self, id: i64) -> StorageResult<()>;

    /// Remove an account and everything that cascades from it
    async fn delete(&self, id: i64) -> StorageResult<()>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
    credentials: CredentialManager,
    activity: ActivityLog,
}

impl SqliteUserRepository {
    /// Create a new SQLite user repository
    pub fn new(pool: SqlitePool, credentials: CredentialManager, activity: ActivityLog) -> Self {
        Self {
            pool,
            credentials,
            activity,
        }
    }

    async fn require(&self, id: i64) -> StorageResult<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::not_found("User", "id", id))
    }

    async fn email_taken_by_other(&self, email: &str, id: i64) -> StorageResult<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }
}

/// Turn an UPDATE that touched no row into not-found.
fn ensure_updated(result: SqliteQueryResult, id: i64) -> StorageResult<()> {
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("User", "id", id));
    }

    Ok(())
}

impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: &NewUser) -> StorageResult<i64> {
        let full_name = user.full_name.trim();
        if full_name.is_empty() {
            return Err(StorageError::validation("Full name is required"));
        }

        self.validate_email(&user.email).await?;
        validate_password(&user.password)?;

        let role = Role::normalize(&user.role).ok_or_else(|| {
            StorageError::validation(format!("Invalid role: {}", user.role.trim()))
        })?;

        let email = normalize_email(&user.email);
        let hash = self.credentials.hash_password(&user.password)?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password, role, full_name, phone, is_active, is_verified, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&email)
        .bind(&hash)
        .bind(role.as_str())
        .bind(full_name)
        .bind(user.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()))
        .bind(!role.is_property_manager())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(user_id = id, role = %role, "User registered");
        self.activity
            .log(Some(id), "signup", Some(&format!("Registered {role} account {email}")))
            .await;

        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn exists_by_email(&self, email: &str) -> StorageResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn validate_email(&self, email: &str) -> StorageResult<()> {
        validate_email_format(email)?;

        if self.exists_by_email(email).await? {
            return Err(StorageError::validation("Email is already registered"));
        }

        Ok(())
    }

    async fn list_users(
        &self,
        role: Option<Role>,
        include_deleted: bool,
    ) -> StorageResult<Vec<User>> {
        let mut sql = format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1");
        if role.is_some() {
            sql.push_str(" AND role = ?");
        }
        if !include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query_as::<_, User>(&sql);
        if let Some(role) = role {
            query = query.bind(role.as_str());
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> StorageResult<()> {
        let current = self.require(id).await?;

        let full_name = match update.full_name.as_deref().map(str::trim) {
            Some("") => return Err(StorageError::validation("Full name is required")),
            Some(name) => name.to_string(),
            None => current.full_name,
        };

        let email = match update.email.as_deref() {
            Some(raw) => {
                validate_email_format(raw)?;
                let email = normalize_email(raw);
                if self.email_taken_by_other(&email, id).await? {
                    return Err(StorageError::validation("Email is already registered"));
                }
                email
            }
            None => current.email,
        };

        let phone = match update.phone.as_deref().map(str::trim) {
            Some("") => None,
            Some(phone) => Some(phone.to_string()),
            None => current.phone,
        };

        sqlx::query(
            "UPDATE users SET full_name = ?, email = ?, phone = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&full_name)
        .bind(&email)
        .bind(&phone)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.activity
            .log(Some(id), "profile_updated", Some(&format!("Updated profile of {email}")))
            .await;
        Ok(())
    }

    async fn update_role(&self, id: i64, role: Role) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_updated(result, id)?;

        debug!(user_id = id, role = %role, "Role changed");
        self.activity
            .log(Some(id), "role_changed", Some(&format!("Role set to {role}")))
            .await;
        Ok(())
    }

    async fn set_active(&self, id: i64, active: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_updated(result, id)?;

        let action = if active { "user_activated" } else { "user_deactivated" };
        self.activity.log(Some(id), action, None).await;
        Ok(())
    }

    async fn set_verified(&self, id: i64, verified: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET is_verified = ?, updated_at = ? WHERE id = ?")
            .bind(verified)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_updated(result, id)?;

        let action = if verified { "user_verified" } else { "user_unverified" };
        self.activity.log(Some(id), action, None).await;
        Ok(())
    }

    async fn update_password(&self, id: i64, new_password: &str) -> StorageResult<()> {
        validate_password(new_password)?;
        let hash = self.credentials.hash_password(new_password)?;
        self.set_password_hash(id, &hash).await?;

        self.activity.log(Some(id), "password_changed", None).await;
        Ok(())
    }

    async fn set_password_hash(&self, id: i64, hash: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_updated(result, id)
    }

    async fn update_avatar(&self, id: i64, avatar: Option<&str>) -> StorageResult<()> {
        let avatar = avatar.map(str::trim).filter(|a| !a.is_empty()).map(str::to_string);
        let result = sqlx::query("UPDATE users SET avatar = ?, updated_at = ? WHERE id = ?")
            .bind(avatar)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_updated(result, id)?;

        self.activity.log(Some(id), "avatar_updated", None).await;
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> StorageResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, is_active = 0, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_updated(result, id)?;

        info!(user_id = id, "User soft-deleted");
        self.activity.log(Some(id), "user_soft_deleted", None).await;
        Ok(())
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        let user = self.require(id).await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(user_id = id, "User deleted");
        self.activity
            .log(None, "user_deleted", Some(&format!("Deleted account {}", user.email)))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support;
    use rstest::rstest;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let store = test_support::store().await;
        let users = store.users();

        let id = users
            .create_user(&NewUser::new("Jane Doe", " Jane@X.com ", "Passw0rd!", "tenant"))
            .await
            .unwrap();

        let user = users.find_by_email("JANE@x.com").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "jane@x.com");
        assert_eq!(user.role, Role::Tenant);
        assert!(user.is_active);
        assert!(user.is_verified);
        assert_ne!(user.password, "Passw0rd!");
    }

    #[rstest]
    #[case("Property Manager", Role::PropertyManager, false)]
    #[case("PM One", Role::PropertyManager, false)]
    #[case("ADMIN", Role::Admin, true)]
    #[case("student tenant", Role::Tenant, true)]
    #[tokio::test]
    async fn test_role_normalized_on_create(
        #[case] raw: &str,
        #[case] expected: Role,
        #[case] verified: bool,
    ) {
        let store = test_support::store().await;
        let users = store.users();

        let id = users
            .create_user(&NewUser::new("Someone", "someone@x.com", "Passw0rd!", raw))
            .await
            .unwrap();

        let user = users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.role, expected);
        assert_eq!(user.is_verified, verified);
    }

    #[rstest]
    #[case(NewUser::new("", "a@x.com", "Passw0rd!", "tenant"))]
    #[case(NewUser::new("A", "not-an-email", "Passw0rd!", "tenant"))]
    #[case(NewUser::new("A", "a@x.com", "weak", "tenant"))]
    #[case(NewUser::new("A", "a@x.com", "Passw0rd!", "janitor"))]
    #[tokio::test]
    async fn test_invalid_signup_rejected(#[case] user: NewUser) {
        let store = test_support::store().await;

        let err = store.users().create_user(&user).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = test_support::store().await;
        let users = store.users();

        users
            .create_user(&NewUser::new("Jane", "jane@x.com", "Passw0rd!", "tenant"))
            .await
            .unwrap();
        let err = users
            .create_user(&NewUser::new("Other Jane", "JANE@X.COM", "Passw0rd!", "tenant"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Validation error: Email is already registered");
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = test_support::store().await;
        let users = store.users();
        let id = test_support::tenant(&store, "jane@x.com").await;
        test_support::tenant(&store, "taken@x.com").await;

        let err = users
            .update_profile(
                id,
                &ProfileUpdate {
                    email: Some("taken@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        users
            .update_profile(
                id,
                &ProfileUpdate {
                    full_name: Some("Jane Q. Doe".to_string()),
                    email: Some("jane.doe@x.com".to_string()),
                    phone: Some("09171234567".to_string()),
                },
            )
            .await
            .unwrap();

        let user = users.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.full_name, "Jane Q. Doe");
        assert_eq!(user.email, "jane.doe@x.com");
        assert_eq!(user.phone.as_deref(), Some("09171234567"));
        assert!(user.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_list_users_by_role() {
        let store = test_support::store().await;
        let users = store.users();
        let tenant = test_support::tenant(&store, "t@x.com").await;
        test_support::pm(&store, "pm@x.com").await;
        test_support::admin(&store, "admin@x.com").await;

        users.soft_delete(tenant).await.unwrap();

        assert_eq!(users.list_users(None, true).await.unwrap().len(), 3);
        assert_eq!(users.list_users(None, false).await.unwrap().len(), 2);
        let pms = users.list_users(Some(Role::PropertyManager), false).await.unwrap();
        assert_eq!(pms.len(), 1);
        assert_eq!(pms[0].email, "pm@x.com");
    }

    #[tokio::test]
    async fn test_soft_delete_twice_is_not_found() {
        let store = test_support::store().await;
        let users = store.users();
        let id = test_support::tenant(&store, "t@x.com").await;

        users.soft_delete(id).await.unwrap();
        let user = users.find_by_id(id).await.unwrap().unwrap();
        assert!(user.is_deleted());
        assert!(!user.can_login());

        let err = users.soft_delete(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_password_enforces_policy() {
        let store = test_support::store().await;
        let users = store.users();
        let id = test_support::tenant(&store, "t@x.com").await;

        let err = users.update_password(id, "password").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        users.update_password(id, "N3w-Secret!").await.unwrap();
        let user = users.find_by_id(id).await.unwrap().unwrap();
        assert!(store.credentials().verify_password(&user.password, "N3w-Secret!"));
    }

    #[tokio::test]
    async fn test_mutations_on_missing_user() {
        let store = test_support::store().await;
        let users = store.users();

        assert_eq!(users.set_active(999, false).await.unwrap_err().kind(), ErrorKind::NotFound);
        let err = users.update_role(999, Role::Admin).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(users.delete(999).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_activity_recorded() {
        let store = test_support::store().await;
        let id = test_support::tenant(&store, "t@x.com").await;
        store.users().set_verified(id, false).await.unwrap();

        let entries = store.activity().for_user(id, 10).await.unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["user_unverified", "signup"]);
    }
}
