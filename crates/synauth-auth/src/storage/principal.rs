//! Principal lookup.
//!
//! The authorization server does not own user accounts. It consumes them
//! through this narrow capability, implemented by whatever backing store the
//! deployment uses.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::PrincipalRecord;

/// Resolves usernames to principals with their credentials.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Loads the principal registered under `username`.
    ///
    /// Returns `None` if no such principal exists.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the backing store cannot be reached.
    async fn load_principal(&self, username: &str) -> AuthResult<Option<PrincipalRecord>>;
}
