//! Runtime configuration for the storage layer.
//!
//! Configuration is built once at process start (usually through
//! [`StorageConfig::from_env`]) and handed to [`crate::Store::open`]. Nothing
//! in the crate reads the environment on its own.

use crate::connection::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use campuskubo_core::constants::{
    DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_LOGIN_ATTEMPTS, ENV_DATABASE_PATH, ENV_FORCE_SEED,
    ENV_LOCKOUT_SECONDS, ENV_MAX_LOGIN_ATTEMPTS, RESET_TOKEN_LIFETIME_MINUTES,
    RESET_TOKEN_RATE_LIMIT_SECONDS,
};
use std::time::Duration;

/// Algorithm used for newly written password hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    /// Argon2id PHC strings. Legacy SHA-256 hashes are upgraded on login.
    Argon2,
    /// Unsalted SHA-256 hex digests, the legacy format.
    Sha256,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Cost {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for Argon2Cost {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl Argon2Cost {
    /// Cheap parameters for tests. Never use in production.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Authentication and throttling settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Scheme for newly hashed passwords
    pub hash_scheme: HashScheme,

    /// Argon2 cost parameters
    pub argon2: Argon2Cost,

    /// Failed attempts inside `lockout_window` that lock an account
    pub max_login_attempts: u32,

    /// Trailing window for counting failed attempts
    pub lockout_window: Duration,

    /// Lifetime of an issued reset token
    pub reset_token_ttl: Duration,

    /// Minimum spacing between two reset tokens for one user
    pub reset_token_rate_limit: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hash_scheme: HashScheme::Argon2,
            argon2: Argon2Cost::default(),
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            lockout_window: Duration::from_secs(DEFAULT_LOCKOUT_SECONDS),
            reset_token_ttl: Duration::from_secs(RESET_TOKEN_LIFETIME_MINUTES as u64 * 60),
            reset_token_rate_limit: Duration::from_secs(RESET_TOKEN_RATE_LIMIT_SECONDS as u64),
        }
    }
}

impl AuthConfig {
    /// Defaults with minimal Argon2 cost, for tests.
    pub fn for_tests() -> Self {
        Self {
            argon2: Argon2Cost::minimal(),
            ..Default::default()
        }
    }

    /// Set the hashing scheme
    pub fn hash_scheme(mut self, scheme: HashScheme) -> Self {
        self.hash_scheme = scheme;
        self
    }

    /// Set the failed-attempt threshold
    pub fn max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = attempts;
        self
    }

    /// Set the lockout window
    pub fn lockout_window(mut self, window: Duration) -> Self {
        self.lockout_window = window;
        self
    }
}

/// Complete storage configuration.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,

    /// Seed demo data even when the users table is not empty
    pub force_seed: bool,
}

impl StorageConfig {
    /// Build configuration from the process environment.
    ///
    /// Loads `.env` first when present. Recognised variables:
    /// `CAMPUSKUBO_DB_PATH`, `CAMPUSKUBO_FORCE_SEED`,
    /// `CAMPUSKUBO_MAX_LOGIN_ATTEMPTS`, `CAMPUSKUBO_LOCKOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` when a numeric variable does not
    /// parse.
    pub fn from_env() -> StorageResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            config.database.database_path = path;
        }

        config.force_seed = lookup(ENV_FORCE_SEED)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        if let Some(raw) = lookup(ENV_MAX_LOGIN_ATTEMPTS) {
            config.auth.max_login_attempts = raw.trim().parse().map_err(|_| {
                StorageError::Configuration(format!(
                    "{ENV_MAX_LOGIN_ATTEMPTS} must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        if let Some(raw) = lookup(ENV_LOCKOUT_SECONDS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                StorageError::Configuration(format!(
                    "{ENV_LOCKOUT_SECONDS} must be a number of seconds, got '{raw}'"
                ))
            })?;
            config.auth.lockout_window = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StorageConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.database.database_path, "campuskubo.db");
        assert!(!config.force_seed);
        assert_eq!(config.auth.hash_scheme, HashScheme::Argon2);
        assert_eq!(config.auth.max_login_attempts, 5);
        assert_eq!(config.auth.lockout_window, Duration::from_secs(30));
        assert_eq!(config.auth.reset_token_ttl, Duration::from_secs(900));
        assert_eq!(config.auth.reset_token_rate_limit, Duration::from_secs(300));
    }

    #[test]
    fn test_environment_overrides() {
        let config = StorageConfig::from_lookup(lookup_from(&[
            ("CAMPUSKUBO_DB_PATH", "/tmp/kubo.db"),
            ("CAMPUSKUBO_FORCE_SEED", "true"),
            ("CAMPUSKUBO_MAX_LOGIN_ATTEMPTS", "3"),
            ("CAMPUSKUBO_LOCKOUT_SECONDS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.database.database_path, "/tmp/kubo.db");
        assert!(config.force_seed);
        assert_eq!(config.auth.max_login_attempts, 3);
        assert_eq!(config.auth.lockout_window, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_number_is_configuration_error() {
        let result =
            StorageConfig::from_lookup(lookup_from(&[("CAMPUSKUBO_LOCKOUT_SECONDS", "soon")]));
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[rstest]
    #[case("1", true)]
    #[case("YES", true)]
    #[case(" true ", true)]
    #[case("0", false)]
    #[case("", false)]
    fn test_parse_flag(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(parse_flag(raw), expected);
    }
}
