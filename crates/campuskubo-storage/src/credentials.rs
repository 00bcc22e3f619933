//! Password hashing and reset-token material.
//!
//! Two on-disk hash formats coexist:
//!
//! - Argon2id PHC strings (`$argon2id$v=19$...`), written by current releases
//! - 64-character SHA-256 hex digests, written by early releases
//!
//! [`CredentialManager::verify_password`] branches on the `$argon2` marker.
//! A legacy hash that verifies is reported by
//! [`CredentialManager::needs_upgrade`] so the login path can rehash it
//! (see [`crate::auth::Authenticator::validate_user`]).

use crate::config::{Argon2Cost, HashScheme};
use crate::error::{StorageError, StorageResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use campuskubo_core::constants::{ARGON2_HASH_MARKER, LEGACY_HASH_LENGTH, RESET_TOKEN_BYTES};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hashes and verifies passwords according to the configured scheme.
#[derive(Debug, Clone)]
pub struct CredentialManager {
    scheme: HashScheme,
    params: Params,
}

impl CredentialManager {
    /// Create a manager for `scheme` with the given Argon2 cost.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` when the Argon2 parameters are
    /// out of range.
    pub fn new(scheme: HashScheme, cost: Argon2Cost) -> StorageResult<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| StorageError::Configuration(format!("Invalid Argon2 parameters: {e}")))?;
        Ok(Self { scheme, params })
    }

    /// Scheme used for new hashes.
    pub fn scheme(&self) -> HashScheme {
        self.scheme
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with the configured scheme.
    pub fn hash_password(&self, password: &str) -> StorageResult<String> {
        match self.scheme {
            HashScheme::Argon2 => {
                let salt_bytes: [u8; 16] = rand::rng().random();
                let salt = SaltString::encode_b64(&salt_bytes)
                    .map_err(|e| StorageError::PasswordHash(e.to_string()))?;
                let hash = self
                    .argon2()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| StorageError::PasswordHash(e.to_string()))?;
                Ok(hash.to_string())
            }
            HashScheme::Sha256 => Ok(sha256_hex(password)),
        }
    }

    /// Verify `password` against a stored hash of either format.
    ///
    /// Malformed hashes never verify.
    pub fn verify_password(&self, stored_hash: &str, password: &str) -> bool {
        if is_argon2_hash(stored_hash) {
            let parsed = match PasswordHash::new(stored_hash) {
                Ok(h) => h,
                Err(_) => return false,
            };
            // Parameters come from the PHC string, not from self.params
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        } else {
            let candidate = sha256_hex(password);
            let stored = stored_hash.trim().to_lowercase();
            stored.len() == LEGACY_HASH_LENGTH
                && bool::from(stored.as_bytes().ct_eq(candidate.as_bytes()))
        }
    }

    /// Whether a verified hash should be rewritten with the current scheme.
    pub fn needs_upgrade(&self, stored_hash: &str) -> bool {
        self.scheme == HashScheme::Argon2 && !is_argon2_hash(stored_hash)
    }
}

/// Whether `stored_hash` is an Argon2 PHC string.
pub fn is_argon2_hash(stored_hash: &str) -> bool {
    stored_hash.contains(ARGON2_HASH_MARKER)
}

/// Legacy password digest: lowercase SHA-256 hex.
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a URL-safe reset token carrying 32 random bytes.
pub fn generate_reset_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; RESET_TOKEN_BYTES] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest under which a reset token is stored.
pub fn hash_token(token: &str) -> String {
    sha256_hex(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn argon2_manager() -> CredentialManager {
        CredentialManager::new(HashScheme::Argon2, Argon2Cost::minimal()).unwrap()
    }

    fn legacy_manager() -> CredentialManager {
        CredentialManager::new(HashScheme::Sha256, Argon2Cost::minimal()).unwrap()
    }

    #[rstest]
    #[case("Passw0rd!")]
    #[case("")]
    #[case("ünïcødé-Pässwörd1!")]
    fn test_argon2_round_trip(#[case] password: &str) {
        let manager = argon2_manager();
        let hash = manager.hash_password(password).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(manager.verify_password(&hash, password));
        assert!(!manager.verify_password(&hash, "something else"));
    }

    #[test]
    fn test_argon2_hashes_are_salted() {
        let manager = argon2_manager();
        let a = manager.hash_password("Passw0rd!").unwrap();
        let b = manager.hash_password("Passw0rd!").unwrap();
        assert_ne!(a, b);

        let salt = PasswordHash::new(&a).unwrap().salt.unwrap();
        assert_eq!(salt.as_str().len(), 22);
    }

    #[test]
    fn test_sha256_scheme_writes_legacy_digest() {
        let manager = legacy_manager();
        let hash = manager.hash_password("Passw0rd!").unwrap();

        assert_eq!(hash.len(), 64);
        assert!(!is_argon2_hash(&hash));
        assert!(manager.verify_password(&hash, "Passw0rd!"));
        assert!(!manager.verify_password(&hash, "passw0rd!"));
    }

    #[test]
    fn test_legacy_hash_verifies_under_argon2_scheme() {
        let manager = argon2_manager();
        let legacy = sha256_hex("Passw0rd!");

        assert!(manager.verify_password(&legacy, "Passw0rd!"));
        assert!(manager.verify_password(&legacy.to_uppercase(), "Passw0rd!"));
        assert!(manager.needs_upgrade(&legacy));
    }

    #[test]
    fn test_argon2_hash_verifies_under_legacy_scheme() {
        let hash = argon2_manager().hash_password("Passw0rd!").unwrap();
        let manager = legacy_manager();

        assert!(manager.verify_password(&hash, "Passw0rd!"));
        assert!(!manager.needs_upgrade(&hash));
        assert!(!manager.needs_upgrade(&sha256_hex("Passw0rd!")));
    }

    #[rstest]
    #[case("$argon2id$garbage")]
    #[case("not-a-hash")]
    #[case("")]
    fn test_malformed_hashes_never_verify(#[case] stored: &str) {
        assert!(!argon2_manager().verify_password(stored, "Passw0rd!"));
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_reset_token_shape() {
        let token = generate_reset_token();

        // 32 bytes -> 43 base64url characters without padding
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_reset_token());
        assert_eq!(hash_token(&token).len(), 64);
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let cost = Argon2Cost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            CredentialManager::new(HashScheme::Argon2, cost),
            Err(StorageError::Configuration(_))
        ));
    }
}
