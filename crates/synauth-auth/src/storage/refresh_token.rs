//! Refresh token storage trait.
//!
//! Tokens are keyed by the SHA-256 hash of their value; the plaintext never
//! reaches the store.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::RefreshToken;

/// Storage operations for refresh tokens.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a new refresh token record.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn insert(&self, token: RefreshToken) -> AuthResult<()>;

    /// Finds a token by the hash of its value.
    ///
    /// Revoked and expired tokens are returned too; callers decide.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Marks a token revoked.
    ///
    /// Returns `true` only for the call that flipped the flag, so rotation
    /// can use it as a compare-and-swap. Unknown or already revoked tokens
    /// return `false`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn revoke(&self, token_hash: &str) -> AuthResult<bool>;

    /// Deletes tokens that are expired or revoked at `now`.
    ///
    /// Returns the number of tokens removed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
