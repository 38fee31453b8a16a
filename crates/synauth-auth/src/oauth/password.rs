//! Credential encoding and verification.
//!
//! Stored credentials (user passwords and client secrets) carry their
//! encoding in a prefix:
//!
//! - `{noop}<plain>`: plaintext, for development bootstrap data
//! - `$argon2...`: an Argon2 PHC string
//!
//! # Security
//!
//! - New hashes use Argon2id with default parameters and an `OsRng` salt
//! - Plaintext credentials are compared by SHA-256 digest in constant time

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::AuthResult;
use crate::error::AuthError;

const NOOP_PREFIX: &str = "{noop}";
const ARGON2_PREFIX: &str = "$argon2";

/// Checks `presented` against an encoded credential.
///
/// # Errors
///
/// Returns `Configuration` if `stored` uses an unknown encoding or is not a
/// valid PHC string.
pub fn verify_credential(stored: &str, presented: &str) -> AuthResult<bool> {
    if let Some(plain) = stored.strip_prefix(NOOP_PREFIX) {
        return Ok(digest_eq(plain.as_bytes(), presented.as_bytes()));
    }

    if stored.starts_with(ARGON2_PREFIX) {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| AuthError::configuration(format!("malformed argon2 hash: {e}")))?;
        return Ok(Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok());
    }

    Err(AuthError::configuration(
        "unsupported credential encoding, expected {noop} or $argon2",
    ))
}

/// [`verify_credential`] for async callers. Argon2 checks run on the
/// blocking pool.
///
/// # Errors
///
/// As [`verify_credential`], plus `Internal` if the blocking task panics.
pub async fn verify_credential_async(stored: &str, presented: &str) -> AuthResult<bool> {
    if !stored.starts_with(ARGON2_PREFIX) {
        return verify_credential(stored, presented);
    }

    let (stored, presented) = (stored.to_owned(), presented.to_owned());
    tokio::task::spawn_blocking(move || verify_credential(&stored, &presented))
        .await
        .map_err(|e| AuthError::internal(format!("credential check task failed: {e}")))?
}

/// Hashes a credential for storage using Argon2id.
///
/// # Errors
///
/// Returns `Internal` if hashing fails.
pub fn hash_credential(plain: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("failed to hash credential: {e}")))
}

/// Returns `true` if `stored` uses an encoding [`verify_credential`] accepts.
#[must_use]
pub fn is_supported_encoding(stored: &str) -> bool {
    stored.starts_with(NOOP_PREFIX) || stored.starts_with(ARGON2_PREFIX)
}

fn digest_eq(a: &[u8], b: &[u8]) -> bool {
    Sha256::digest(a)
        .as_slice()
        .ct_eq(Sha256::digest(b).as_slice())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_credentials() {
        assert!(verify_credential("{noop}926100349", "926100349").unwrap());
        assert!(!verify_credential("{noop}926100349", "92610034").unwrap());
        assert!(!verify_credential("{noop}secret", "").unwrap());
        assert!(verify_credential("{noop}", "").unwrap());
    }

    #[test]
    fn test_argon2_round_trip() {
        let hash = hash_credential("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_credential(&hash, "s3cret").unwrap());
        assert!(!verify_credential(&hash, "wrong").unwrap());
    }

    #[tokio::test]
    async fn test_async_verification() {
        let hash = hash_credential("s3cret").unwrap();
        assert!(verify_credential_async(&hash, "s3cret").await.unwrap());
        assert!(!verify_credential_async(&hash, "wrong").await.unwrap());
        assert!(verify_credential_async("{noop}x", "x").await.unwrap());

        let err = verify_credential_async("$argon2id$garbage", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_encoding_is_configuration_error() {
        let err = verify_credential("{bcrypt}$2a$10$abc", "x").unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));

        let err = verify_credential("$argon2id$garbage", "x").unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_supported_encoding() {
        assert!(is_supported_encoding("{noop}x"));
        assert!(is_supported_encoding("$argon2id$v=19$..."));
        assert!(!is_supported_encoding("plain"));
    }
}
