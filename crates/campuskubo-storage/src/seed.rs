//! Demo data for fresh databases.
//!
//! Runs from [`crate::schema::init_db`] when the users table is empty or a
//! forced seed is requested. Every insert is `OR IGNORE` and listings are
//! only added to an empty listings table, so running it twice changes
//! nothing.

use crate::credentials::CredentialManager;
use crate::error::StorageResult;
use campuskubo_core::{ListingStatus, Role};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

/// Demo accounts: (full name, email, password, role)
pub const DEMO_USERS: &[(&str, &str, &str, Role)] = &[
    ("Campus Admin", "admin@campuskubo.local", "Admin@1234", Role::Admin),
    ("Maria Santos", "pm@campuskubo.local", "Manager@1234", Role::PropertyManager),
    ("Juan Dela Cruz", "tenant@campuskubo.local", "Tenant@1234", Role::Tenant),
];

/// Demo listings owned by the demo property manager:
/// (address, monthly price, description, lodging details, status)
const DEMO_LISTINGS: &[(&str, f64, &str, &str, ListingStatus)] = &[
    (
        "45 Katipunan Ave, Loyola Heights, Quezon City",
        4500.0,
        "Bedspace five minutes from the university gate",
        "Shared room for 4, free Wi-Fi, curfew 11 PM",
        ListingStatus::Approved,
    ),
    (
        "12 P. Noval St, Sampaloc, Manila",
        6200.0,
        "Private studio with own bathroom",
        "Electricity billed separately, water included",
        ListingStatus::Approved,
    ),
    (
        "8 Gov. Forbes St, Sampaloc, Manila",
        3800.0,
        "Dormitory slot near the LRT station",
        "Female only, laundry area",
        ListingStatus::Pending,
    ),
];

const DEFAULT_SYSTEM_SETTINGS: &[(&str, &str)] = &[
    ("site_name", "CampusKubo"),
    ("currency", "PHP"),
    ("maintenance_mode", "off"),
];

/// Insert the demo accounts, listings and default system settings.
pub async fn seed_demo_data(
    pool: &SqlitePool,
    credentials: &CredentialManager,
) -> StorageResult<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let mut users_added = 0;
    for &(full_name, email, password, role) in DEMO_USERS {
        let hash = credentials.hash_password(password)?;
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (email, password, role, full_name, is_active, is_verified, created_at)
            VALUES (?, ?, ?, ?, 1, 1, ?)
            "#,
        )
        .bind(email)
        .bind(&hash)
        .bind(role.as_str())
        .bind(full_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        users_added += result.rows_affected();
    }

    let existing_listings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
        .fetch_one(&mut *tx)
        .await?;
    let pm_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(DEMO_USERS[1].1)
        .fetch_optional(&mut *tx)
        .await?;

    let mut listings_added = 0;
    if existing_listings == 0
        && let Some(pm_id) = pm_id
    {
        for &(address, price, description, details, status) in DEMO_LISTINGS {
            sqlx::query(
                r#"
                INSERT INTO listings (pm_id, address, price, description, lodging_details, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(pm_id)
            .bind(address)
            .bind(price)
            .bind(description)
            .bind(details)
            .bind(status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
            listings_added += 1;
        }
    }

    for &(key, value) in DEFAULT_SYSTEM_SETTINGS {
        sqlx::query(
            "INSERT OR IGNORE INTO system_settings (key, value, updated_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(users_added, listings_added, "Demo data seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Argon2Cost, HashScheme};
    use crate::connection::Database;

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_seed_twice_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let credentials =
            CredentialManager::new(HashScheme::Argon2, Argon2Cost::minimal()).unwrap();

        seed_demo_data(db.pool(), &credentials).await.unwrap();
        seed_demo_data(db.pool(), &credentials).await.unwrap();

        assert_eq!(count(db.pool(), "users").await, DEMO_USERS.len() as i64);
        assert_eq!(count(db.pool(), "listings").await, DEMO_LISTINGS.len() as i64);
        assert_eq!(count(db.pool(), "system_settings").await, 3);
    }

    #[tokio::test]
    async fn test_demo_passwords_verify() {
        let db = Database::in_memory().await.unwrap();
        let credentials =
            CredentialManager::new(HashScheme::Argon2, Argon2Cost::minimal()).unwrap();
        seed_demo_data(db.pool(), &credentials).await.unwrap();

        for &(_, email, password, _) in DEMO_USERS {
            campuskubo_core::password::validate_password(password).unwrap();
            let hash: String = sqlx::query_scalar("SELECT password FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(db.pool())
                .await
                .unwrap();
            assert!(credentials.verify_password(&hash, password));
        }
    }
}
