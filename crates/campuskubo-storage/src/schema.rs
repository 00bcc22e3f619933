//! Schema creation and in-place migration.
//!
//! Startup runs three idempotent phases:
//!
//! 1. **Base schema**: every `CREATE TABLE/INDEX IF NOT EXISTS` statement of
//!    `migrations/0001_initial_schema.sql`, in one transaction. A failure here
//!    is fatal and rolls the whole phase back.
//! 2. **Evolved columns**: databases created by older releases lack some
//!    columns. Each entry of [`EVOLVED_COLUMNS`] is checked and added with
//!    `ALTER TABLE .. ADD COLUMN`. Failures are logged and ignored, because the
//!    usual cause is a column that another process added first.
//! 3. **Legacy values**: free-text roles and the `Available/Occupied` listing
//!    vocabulary are rewritten to their canonical form.
//!
//! SQL identifiers cannot be bound as parameters, so every table name that
//! reaches a formatted statement must appear in [`ALLOWED_TABLES`].

use crate::credentials::CredentialManager;
use crate::error::{StorageError, StorageResult};
use crate::seed;
use campuskubo_core::{ListingStatus, Role};
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

const BASE_SCHEMA: &str = include_str!("../../../migrations/0001_initial_schema.sql");

/// Tables the introspection helpers accept.
pub const ALLOWED_TABLES: &[&str] = &[
    "users",
    "listings",
    "listing_images",
    "reservations",
    "password_reset_tokens",
    "login_attempts",
    "activity_logs",
    "payments",
    "notifications",
    "saved_listings",
    "reviews",
    "messages",
    "reports",
    "user_addresses",
    "user_settings",
    "tenants",
    "system_settings",
];

/// Allowed tables that carry a `created_at` column.
pub const TIMESTAMPED_TABLES: &[&str] = &[
    "users",
    "listings",
    "listing_images",
    "reservations",
    "password_reset_tokens",
    "activity_logs",
    "payments",
    "notifications",
    "saved_listings",
    "reviews",
    "messages",
    "reports",
    "tenants",
];

/// Columns added after the first release: `(table, column, definition)`.
pub const EVOLVED_COLUMNS: &[(&str, &str, &str)] = &[
    ("users", "phone", "TEXT"),
    ("users", "is_active", "INTEGER NOT NULL DEFAULT 1"),
    ("users", "is_verified", "INTEGER NOT NULL DEFAULT 1"),
    ("users", "avatar", "TEXT"),
    ("users", "updated_at", "TEXT"),
    ("users", "deleted_at", "TEXT"),
    ("listings", "lodging_details", "TEXT"),
    ("listings", "updated_at", "TEXT"),
    ("reservations", "updated_at", "TEXT"),
    ("payments", "reservation_id", "INTEGER"),
    ("payments", "refunded_amount", "REAL NOT NULL DEFAULT 0"),
    ("payments", "refund_reason", "TEXT"),
    ("payments", "payment_method", "TEXT"),
    ("payments", "updated_at", "TEXT"),
    ("notifications", "category", "TEXT"),
    ("notifications", "reference_id", "INTEGER"),
    ("notifications", "reference_type", "TEXT"),
    ("notifications", "read_at", "TEXT"),
    ("messages", "is_read", "INTEGER NOT NULL DEFAULT 0"),
];

/// Bring the schema up to date without seeding.
///
/// # Errors
///
/// Returns an error if the base schema cannot be created (the transaction is
/// rolled back) or if legacy values cannot be rewritten.
pub async fn migrate(pool: &SqlitePool) -> StorageResult<()> {
    debug!("Applying base schema");
    create_base_schema(pool).await.inspect_err(|e| {
        error!("Schema creation failed: {}", e);
    })?;

    for (table, column, definition) in EVOLVED_COLUMNS {
        ensure_column(pool, table, column, definition).await;
    }

    normalize_legacy_values(pool).await?;
    Ok(())
}

/// Migrate, then seed demo data when the database has no users or
/// `force_seed` is set.
pub async fn init_db(
    pool: &SqlitePool,
    credentials: &CredentialManager,
    force_seed: bool,
) -> StorageResult<()> {
    migrate(pool).await?;

    let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if users == 0 || force_seed {
        info!(force_seed, existing_users = users, "Seeding demo data");
        seed::seed_demo_data(pool, credentials).await?;
    }

    Ok(())
}

/// Check whether `table` has a column named `column`.
///
/// # Errors
///
/// Returns `StorageError::Validation` if `table` is not in [`ALLOWED_TABLES`].
pub async fn table_has_column(pool: &SqlitePool, table: &str, column: &str) -> StorageResult<bool> {
    ensure_allowed_table(table)?;

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

pub(crate) fn ensure_allowed_table(table: &str) -> StorageResult<()> {
    if ALLOWED_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(StorageError::validation(format!(
            "Table '{table}' is not allowed"
        )))
    }
}

pub(crate) fn ensure_timestamped_table(table: &str) -> StorageResult<()> {
    if TIMESTAMPED_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(StorageError::validation(format!(
            "Table '{table}' has no creation timestamp"
        )))
    }
}

async fn create_base_schema(pool: &SqlitePool) -> StorageResult<()> {
    let mut tx = pool.begin().await?;

    for statement in sql_statements(BASE_SCHEMA) {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Split a SQL script into statements, dropping `--` comment lines first so
/// a `;` inside a comment never ends a statement.
fn sql_statements(sql: &str) -> Vec<String> {
    let code = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Add `column` to `table` if it is missing. Never fails the caller.
async fn ensure_column(pool: &SqlitePool, table: &str, column: &str, definition: &str) {
    if !column.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        warn!(table, column, "Refusing to add column with unexpected name");
        return;
    }

    match table_has_column(pool, table, column).await {
        Ok(true) => {}
        Ok(false) => {
            let statement = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
            match sqlx::query(&statement).execute(pool).await {
                Ok(_) => info!(table, column, "Added missing column"),
                Err(e) => warn!(table, column, "Could not add column: {}", e),
            }
        }
        Err(e) => warn!(table, column, "Could not inspect table: {}", e),
    }
}

async fn normalize_legacy_values(pool: &SqlitePool) -> StorageResult<()> {
    let roles: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT role FROM users")
        .fetch_all(pool)
        .await?;

    for (raw,) in roles {
        let canonical = match Role::normalize(&raw) {
            Some(role) => role,
            None => {
                warn!(role = %raw, "Unknown role, demoting to tenant");
                Role::Tenant
            }
        };
        if canonical.as_str() != raw {
            sqlx::query("UPDATE users SET role = ? WHERE role = ?")
                .bind(canonical.as_str())
                .bind(&raw)
                .execute(pool)
                .await?;
        }
    }

    let statuses: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT status FROM listings")
        .fetch_all(pool)
        .await?;

    for (raw,) in statuses {
        let canonical = match raw.parse::<ListingStatus>() {
            Ok(status) => status,
            Err(_) => {
                warn!(status = %raw, "Unknown listing status, resetting to pending");
                ListingStatus::Pending
            }
        };
        if canonical.as_str() != raw {
            sqlx::query("UPDATE listings SET status = ? WHERE status = ?")
                .bind(canonical.as_str())
                .bind(&raw)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;

    async fn column_count(pool: &SqlitePool, table: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info(?)")
            .bind(table)
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[test]
    fn test_sql_statements_strip_comments() {
        let script = "-- header; still a comment
CREATE TABLE a (x INTEGER);

-- tail
CREATE TABLE b (
    -- inner; note
    y TEXT
);
";
        let statements = sql_statements(script);
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE a (x INTEGER)".to_string(),
                "CREATE TABLE b (\n    y TEXT\n)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_timestamped_tables_have_created_at() {
        let db = Database::in_memory().await.unwrap();
        for table in TIMESTAMPED_TABLES {
            assert!(ALLOWED_TABLES.contains(table));
            assert!(
                table_has_column(db.pool(), table, "created_at").await.unwrap(),
                "{table} lacks created_at"
            );
        }
    }

    #[test]
    fn test_base_schema_covers_allowed_tables() {
        let statements = sql_statements(BASE_SCHEMA);
        for table in ALLOWED_TABLES {
            let marker = format!("CREATE TABLE IF NOT EXISTS {table} (");
            assert!(
                statements.iter().any(|s| s.starts_with(&marker)),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn test_evolved_columns_target_allowed_tables() {
        for (table, _, _) in EVOLVED_COLUMNS {
            assert!(ensure_allowed_table(table).is_ok());
        }
    }

    #[tokio::test]
    async fn test_migrate_twice_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let before = column_count(db.pool(), "users").await;

        migrate(db.pool()).await.unwrap();
        migrate(db.pool()).await.unwrap();

        assert_eq!(column_count(db.pool(), "users").await, before);

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn test_table_has_column() {
        let db = Database::in_memory().await.unwrap();

        assert!(table_has_column(db.pool(), "users", "email").await.unwrap());
        assert!(!table_has_column(db.pool(), "users", "nickname").await.unwrap());
    }

    #[tokio::test]
    async fn test_table_has_column_rejects_unlisted_table() {
        let db = Database::in_memory().await.unwrap();

        let result = table_has_column(db.pool(), "users; DROP TABLE users", "email").await;
        assert!(matches!(result, Err(StorageError::Validation(_))));

        let result = table_has_column(db.pool(), "sqlite_master", "name").await;
        assert!(matches!(result, Err(StorageError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_columns_are_added() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();

        // Rebuild notifications the way the first release shipped it
        sqlx::query("DROP TABLE notifications").execute(pool).await.unwrap();
        sqlx::query(
            "CREATE TABLE notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type TEXT NOT NULL DEFAULT 'info',
                message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(pool)
        .await
        .unwrap();
        assert!(!table_has_column(pool, "notifications", "read_at").await.unwrap());

        migrate(pool).await.unwrap();

        for column in ["category", "reference_id", "reference_type", "read_at"] {
            assert!(table_has_column(pool, "notifications", column).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_legacy_roles_and_statuses_normalized() {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();

        for (email, role) in [
            ("pm@x.com", "PM One"),
            ("boss@x.com", "Administrator"),
            ("odd@x.com", "janitor"),
        ] {
            sqlx::query(
                "INSERT INTO users (email, password, role, full_name) VALUES (?, 'x', ?, 'Legacy')",
            )
            .bind(email)
            .bind(role)
            .execute(pool)
            .await
            .unwrap();
        }
        let (pm_id,): (i64,) = sqlx::query_as("SELECT id FROM users WHERE email = 'pm@x.com'")
            .fetch_one(pool)
            .await
            .unwrap();
        for status in ["Available", "Occupied"] {
            sqlx::query(
                "INSERT INTO listings (pm_id, address, price, status) VALUES (?, 'Somewhere', 1500, ?)",
            )
            .bind(pm_id)
            .bind(status)
            .execute(pool)
            .await
            .unwrap();
        }

        migrate(pool).await.unwrap();

        let roles: Vec<(String, String)> =
            sqlx::query_as("SELECT email, role FROM users ORDER BY email")
                .fetch_all(pool)
                .await
                .unwrap();
        assert_eq!(
            roles,
            vec![
                ("boss@x.com".to_string(), "admin".to_string()),
                ("odd@x.com".to_string(), "tenant".to_string()),
                ("pm@x.com".to_string(), "pm".to_string()),
            ]
        );

        let statuses: Vec<(String,)> =
            sqlx::query_as("SELECT status FROM listings ORDER BY id")
                .fetch_all(pool)
                .await
                .unwrap();
        assert_eq!(
            statuses,
            vec![("approved".to_string(),), ("occupied".to_string(),)]
        );
    }
}
