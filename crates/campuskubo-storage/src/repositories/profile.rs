#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::{SystemSetting, UserAddress, UserSettings};
use chrono::Utc;
use sqlx::SqlitePool;

/// Per-user address and preferences, plus global system settings
pub trait ProfileRepository: Send + Sync {
    async fn address(&self, user_id: i64) -> StorageResult<Option<UserAddress>>;

    /// Insert or replace the address of `address.user_id`
    async fn upsert_address(&self, address: &UserAddress) -> StorageResult<()>;

    /// Stored preferences, or the defaults when none were saved
    async fn settings(&self, user_id: i64) -> StorageResult<UserSettings>;

    async fn upsert_settings(&self, settings: &UserSettings) -> StorageResult<()>;

    async fn system_setting(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set_system_setting(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn system_settings(&self) -> StorageResult<Vec<SystemSetting>>;
}

pub struct SqliteProfileRepository {
    pool: SqlitePool,
}

impl SqliteProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ProfileRepository for SqliteProfileRepository {
    async fn address(&self, user_id: i64) -> StorageResult<Option<UserAddress>> {
        let address = sqlx::query_as::<_, UserAddress>(
            r#"
            SELECT user_id, street, barangay, city, province, postal_code, updated_at
            FROM user_addresses
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    async fn upsert_address(&self, address: &UserAddress) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_addresses (user_id, street, barangay, city, province, postal_code, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                street = excluded.street,
                barangay = excluded.barangay,
                city = excluded.city,
                province = excluded.province,
                postal_code = excluded.postal_code,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(address.user_id)
        .bind(blank_to_none(&address.street))
        .bind(blank_to_none(&address.barangay))
        .bind(blank_to_none(&address.city))
        .bind(blank_to_none(&address.province))
        .bind(blank_to_none(&address.postal_code))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn settings(&self, user_id: i64) -> StorageResult<UserSettings> {
        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            SELECT user_id, email_notifications, sms_notifications, dark_mode, language, updated_at
            FROM user_settings
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_else(|| UserSettings::defaults_for(user_id)))
    }

    async fn upsert_settings(&self, settings: &UserSettings) -> StorageResult<()> {
        let language = settings.language.trim();
        if language.is_empty() {
            return Err(StorageError::validation("Language is required"));
        }

        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, email_notifications, sms_notifications, dark_mode, language, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                email_notifications = excluded.email_notifications,
                sms_notifications = excluded.sms_notifications,
                dark_mode = excluded.dark_mode,
                language = excluded.language,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settings.user_id)
        .bind(settings.email_notifications)
        .bind(settings.sms_notifications)
        .bind(settings.dark_mode)
        .bind(language)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn system_setting(&self, key: &str) -> StorageResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM system_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn set_system_setting(&self, key: &str, value: &str) -> StorageResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(StorageError::validation("Setting key is required"));
        }

        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn system_settings(&self) -> StorageResult<Vec<SystemSetting>> {
        let settings = sqlx::query_as::<_, SystemSetting>(
            "SELECT key, value, updated_at FROM system_settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn test_address_upsert() {
        let store = test_support::store().await;
        let user = test_support::tenant(&store, "t@x.com").await;
        let profiles = store.profiles();

        assert!(profiles.address(user).await.unwrap().is_none());

        let mut address = UserAddress {
            user_id: user,
            street: Some("12 Katipunan Ave".to_string()),
            barangay: Some("Loyola Heights".to_string()),
            city: Some("Quezon City".to_string()),
            province: Some("Metro Manila".to_string()),
            postal_code: Some("1108".to_string()),
            updated_at: None,
        };
        profiles.upsert_address(&address).await.unwrap();

        address.street = Some("  ".to_string());
        profiles.upsert_address(&address).await.unwrap();

        let stored = profiles.address(user).await.unwrap().unwrap();
        assert_eq!(stored.street, None);
        assert_eq!(stored.city.as_deref(), Some("Quezon City"));
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_settings_default_then_saved() {
        let store = test_support::store().await;
        let user = test_support::tenant(&store, "t@x.com").await;
        let profiles = store.profiles();

        let defaults = profiles.settings(user).await.unwrap();
        assert_eq!(defaults, UserSettings::defaults_for(user));

        let custom = UserSettings {
            dark_mode: true,
            language: "fil".to_string(),
            ..defaults
        };
        profiles.upsert_settings(&custom).await.unwrap();

        let stored = profiles.settings(user).await.unwrap();
        assert!(stored.dark_mode);
        assert_eq!(stored.language, "fil");
        assert!(stored.email_notifications);
    }

    #[tokio::test]
    async fn test_system_settings() {
        let store = test_support::store().await;
        let profiles = store.profiles();

        assert_eq!(profiles.system_setting("maintenance_mode").await.unwrap(), None);
        profiles.set_system_setting("maintenance_mode", "off").await.unwrap();
        profiles.set_system_setting("maintenance_mode", "on").await.unwrap();
        profiles.set_system_setting("currency", "PHP").await.unwrap();

        assert_eq!(
            profiles.system_setting("maintenance_mode").await.unwrap().as_deref(),
            Some("on")
        );
        let keys: Vec<String> = profiles
            .system_settings()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(keys, vec!["currency", "maintenance_mode"]);
    }
}
