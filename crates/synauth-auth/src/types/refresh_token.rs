//! Refresh token record.
//!
//! # Security
//!
//! - Refresh tokens are stored as SHA-256 hashes, never plaintext
//! - Revocation is a one-way flag flip so concurrent refreshes can race safely
//! - Expired tokens are purged periodically

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::scope::ScopeSet;

/// Refresh token as held by a [`RefreshTokenStorage`](crate::storage::RefreshTokenStorage).
///
/// The token value itself is never stored. To validate a presented token:
///
/// 1. Hash the incoming token
/// 2. Look up by hash
/// 3. Validate client binding, expiration and revocation status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// SHA-256 hash of the token value.
    pub token_hash: String,

    /// Principal the token was issued on behalf of.
    pub principal_id: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Granted scopes.
    pub scopes: ScopeSet,

    /// When this token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether this token has been revoked.
    pub revoked: bool,
}

impl RefreshToken {
    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the token can be exchanged at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    /// Hash a token value using SHA-256.
    ///
    /// This is used both when storing new tokens and when looking up
    /// tokens for validation.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Generate a cryptographically secure random token value.
    #[must_use]
    pub fn generate_token() -> String {
        super::random_token()
    }
}
