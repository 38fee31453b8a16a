//! Authorization code storage trait.
//!
//! # Implementation Notes
//!
//! Implementations must make [`AuthorizationCodeStorage::redeem`] linearizable
//! per code value: the lookup, the checks and the consumed flag flip happen
//! as one step, so two concurrent redemptions of the same code can never
//! both succeed. A single-writer transaction or a compare-and-swap on the
//! consumed flag are both acceptable.
//!
//! # Security Considerations
//!
//! - Never log authorization codes
//! - A failed redemption must leave the code untouched

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::oauth::code::AuthorizationCode;

/// Storage trait for issued authorization codes.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Stores a freshly issued code.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on a duplicate code value, or `ServiceUnavailable`
    /// if the storage operation fails.
    async fn insert(&self, code: AuthorizationCode) -> AuthResult<()>;

    /// Finds a code without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Atomically checks and consumes a code.
    ///
    /// The checks are those of [`AuthorizationCode::check_redeemable`]. On
    /// success the stored code is marked consumed and returned.
    ///
    /// # Errors
    ///
    /// - `InvalidGrant` if the code is unknown
    /// - `CodeAlreadyUsed`, `CodeExpired`, `ClientMismatch` or
    ///   `RedirectUriMismatch` from the redeemability checks
    /// - `ServiceUnavailable` if the storage operation fails
    async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: OffsetDateTime,
    ) -> AuthResult<AuthorizationCode>;

    /// Deletes codes that are expired or consumed at `now`.
    ///
    /// Returns the number of codes removed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
