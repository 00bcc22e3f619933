//! Storage layer for the CampusKubo student-housing marketplace.
//!
//! This crate owns every table of the marketplace database: accounts,
//! listings and their images, reservations, payments, notifications and the
//! community features (saved listings, reviews, messages, reports). It also
//! owns the security-sensitive pieces around them: password hashing with a
//! legacy SHA-256 fallback, login throttling and password-reset tokens.
//!
//! # Architecture
//!
//! - [`Store`] - Context object built once at startup; hands out repositories
//! - [`Database`] - Connection pool with WAL journaling and enforced foreign keys
//! - [`schema`] - Idempotent schema creation, column evolution and legacy cleanup
//! - [`repositories`] - One trait plus one SQLite implementation per entity
//! - [`Authenticator`] - Login with lockout and lazy hash upgrade, password reset
//! - [`ActivityLog`] - Append-only audit trail for admin dashboards
//! - [`reporting`] - Counts and week-over-week trends
//!
//! # Errors
//!
//! Every fallible call returns [`StorageResult`]. [`StorageError::kind`]
//! classifies failures as validation, not-found, unauthorized, conflict or
//! internal, so callers never match on message text.
//!
//! # Examples
//!
//! ## Sign up and log in
//!
//! ```no_run
//! use campuskubo_storage::{AuthConfig, Store};
//! use campuskubo_storage::models::NewUser;
//! use campuskubo_storage::repositories::UserRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::in_memory(AuthConfig::default()).await?;
//!
//! store
//!     .users()
//!     .create_user(&NewUser::new("Jane Doe", "jane@x.com", "Passw0rd!", "tenant"))
//!     .await?;
//!
//! let outcome = store.auth().validate_user("jane@x.com", "Passw0rd!").await?;
//! if let Some(user) = outcome.user() {
//!     println!("Welcome back, {}", user.full_name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Book a listing
//!
//! ```no_run
//! use campuskubo_storage::{Store, StorageConfig};
//! use campuskubo_storage::models::NewReservation;
//! use campuskubo_storage::repositories::ReservationRepository;
//! use chrono::NaiveDate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open(StorageConfig::from_env()?).await?;
//!
//! let id = store
//!     .reservations()
//!     .create_reservation(&NewReservation {
//!         listing_id: 1,
//!         tenant_id: 3,
//!         start_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
//!         end_date: NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
//!     })
//!     .await?;
//! println!("Reservation #{id} is pending approval");
//! # Ok(())
//! # }
//! ```
//!
//! # Security Considerations
//!
//! - Passwords are hashed with Argon2id. Legacy SHA-256 digests are compared
//!   in constant time via `subtle` and rehashed on the next successful login.
//! - Reset tokens carry 32 random bytes; only their SHA-256 digest is stored.
//! - All values are bound parameters. Table names that must be formatted
//!   into SQL are checked against [`schema::ALLOWED_TABLES`].

pub mod activity;
pub mod auth;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod models;
pub mod reporting;
pub mod repositories;
pub mod schema;
pub mod seed;
pub mod store;
pub mod throttle;

#[cfg(test)]
mod test_support;

pub use activity::ActivityLog;
pub use auth::{Authenticator, ClientInfo, LoginOutcome};
pub use config::{Argon2Cost, AuthConfig, HashScheme, StorageConfig};
pub use connection::{Database, DatabaseConfig};
pub use credentials::CredentialManager;
pub use error::{ErrorKind, StorageError, StorageResult};
pub use reporting::{DashboardStats, Reporting, Trend, compute_trend};
pub use store::Store;
pub use throttle::LoginThrottle;
