//! Client storage trait.
//!
//! Defines the interface behind the [`ClientRegistry`](crate::oauth::ClientRegistry).
//! Registrations are written once at bootstrap and only read afterwards.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::RegisteredClient;

/// Storage operations for OAuth 2.0 client registrations.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Find a client by its OAuth client_id.
    ///
    /// Returns `None` if the client doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>>;

    /// Store a new client registration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a client with the same client_id already
    /// exists, or `ServiceUnavailable` if the storage operation fails.
    async fn insert(&self, client: RegisteredClient) -> AuthResult<()>;

    /// Number of registered clients.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the storage operation fails.
    async fn count(&self) -> AuthResult<usize>;
}
