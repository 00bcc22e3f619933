//! Constants for authentication, throttling and persistence defaults.
//!
//! Every value here is a default. The storage crate reads its effective
//! settings from `AuthConfig`/`DatabaseConfig`, which start from these.
//!
//! # Usage
//!
//! ```
//! use campuskubo_core::constants::*;
//!
//! assert_eq!(DEFAULT_MAX_LOGIN_ATTEMPTS, 5);
//! assert_eq!(RESET_TOKEN_RATE_LIMIT_SECONDS, 300);
//! ```

// ============================================================================
// Persistence
// ============================================================================

/// Default SQLite database file name.
pub const DEFAULT_DATABASE_FILE: &str = "campuskubo.db";

/// Busy timeout applied to every SQLite connection (seconds).
///
/// This is the only timeout in the storage layer; no operation supports
/// mid-flight cancellation.
pub const SQLITE_BUSY_TIMEOUT_SECONDS: u64 = 30;

/// Environment flag forcing demo data to be seeded on startup.
pub const ENV_FORCE_SEED: &str = "CAMPUSKUBO_FORCE_SEED";

/// Environment variable overriding the database path.
pub const ENV_DATABASE_PATH: &str = "CAMPUSKUBO_DB_PATH";

/// Environment variable overriding the failed-login threshold.
pub const ENV_MAX_LOGIN_ATTEMPTS: &str = "CAMPUSKUBO_MAX_LOGIN_ATTEMPTS";

/// Environment variable overriding the lockout window (seconds).
pub const ENV_LOCKOUT_SECONDS: &str = "CAMPUSKUBO_LOCKOUT_SECONDS";

// ============================================================================
// Login throttle
// ============================================================================

/// Failed attempts inside the window that lock an account.
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Trailing window over which failed attempts are counted (seconds).
///
/// An account locked by [`DEFAULT_MAX_LOGIN_ATTEMPTS`] failures unlocks this
/// many seconds after the most recent failure.
pub const DEFAULT_LOCKOUT_SECONDS: u64 = 30;

// ============================================================================
// Password reset tokens
// ============================================================================

/// Random bytes in a reset token before base64url encoding.
pub const RESET_TOKEN_BYTES: usize = 32;

/// Default lifetime of a reset token (minutes).
pub const RESET_TOKEN_LIFETIME_MINUTES: i64 = 15;

/// Minimum spacing between two token issuances for the same user (seconds).
pub const RESET_TOKEN_RATE_LIMIT_SECONDS: i64 = 300;

// ============================================================================
// Password policy
// ============================================================================

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters accepted as the required "special character".
pub const PASSWORD_SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Marker present in every Argon2 PHC hash string.
///
/// Stored hashes without it are treated as legacy SHA-256 hex digests.
pub const ARGON2_HASH_MARKER: &str = "$argon2";

/// Length of a legacy SHA-256 hex digest.
pub const LEGACY_HASH_LENGTH: usize = 64;

// ============================================================================
// Reviews
// ============================================================================

/// Lowest accepted review rating.
pub const MIN_REVIEW_RATING: i64 = 1;

/// Highest accepted review rating.
pub const MAX_REVIEW_RATING: i64 = 5;
