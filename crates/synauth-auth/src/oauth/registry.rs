//! Client registry.
//!
//! Wraps a [`ClientStorage`] with the checks the authorization flow needs:
//! exact redirect URI matching and scope narrowing. Registrations happen at
//! bootstrap; request handling only reads.

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::ClientStorage;
use crate::types::{RegisteredClient, ScopeSet};

/// Read-mostly registry of OAuth clients.
pub struct ClientRegistry {
    storage: Arc<dyn ClientStorage>,
    strict_scopes: bool,
}

impl ClientRegistry {
    /// Creates a registry over `storage`.
    ///
    /// With `strict_scopes`, a request naming any scope outside the client's
    /// registration is rejected instead of narrowed.
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>, strict_scopes: bool) -> Self {
        Self {
            storage,
            strict_scopes,
        }
    }

    /// Registers a client.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the definition is invalid or the client ID
    /// is already registered.
    pub async fn register(&self, client: RegisteredClient) -> AuthResult<()> {
        client.validate().map_err(|e| {
            AuthError::configuration(format!("client '{}': {e}", client.client_id))
        })?;

        let client_id = client.client_id.clone();
        self.storage.insert(client).await?;
        tracing::info!(client_id = %client_id, "Client registered");
        Ok(())
    }

    /// Finds a client by ID.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` on storage failure.
    pub async fn find(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        self.storage.find_by_client_id(client_id).await
    }

    /// Looks up a client that must exist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if no client has this ID.
    pub async fn lookup(&self, client_id: &str) -> AuthResult<RegisteredClient> {
        self.find(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client(format!("unknown client '{client_id}'")))
    }

    /// Returns `true` if `uri` exactly matches a registered redirect URI.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if no client has this ID.
    pub async fn validate_redirect_uri(&self, client_id: &str, uri: &str) -> AuthResult<bool> {
        Ok(self.lookup(client_id).await?.is_redirect_uri_allowed(uri))
    }

    /// Resolves the scopes to grant for a request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if no client has this ID and `InvalidScope`
    /// per [`ClientRegistry::grant_scopes`].
    pub async fn validate_scopes(
        &self,
        client_id: &str,
        requested: &ScopeSet,
    ) -> AuthResult<ScopeSet> {
        let client = self.lookup(client_id).await?;
        self.grant_scopes(&client, requested)
    }

    /// Resolves the scopes to grant `client` for `requested`.
    ///
    /// An empty request grants every registered scope. Otherwise the grant
    /// is the intersection of requested and registered scopes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` if the intersection is empty, or in strict mode
    /// if any requested scope is not registered.
    pub fn grant_scopes(
        &self,
        client: &RegisteredClient,
        requested: &ScopeSet,
    ) -> AuthResult<ScopeSet> {
        if requested.is_empty() {
            return Ok(client.scopes.clone());
        }

        if self.strict_scopes {
            let unknown = requested.difference(&client.scopes);
            if !unknown.is_empty() {
                return Err(AuthError::invalid_scope(format!(
                    "scopes not registered for client: {unknown}"
                )));
            }
        }

        let granted = requested.intersection(&client.scopes);
        if granted.is_empty() {
            return Err(AuthError::invalid_scope(format!(
                "none of the requested scopes are registered for client: {requested}"
            )));
        }
        Ok(granted)
    }

    /// Number of registered clients.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` on storage failure.
    pub async fn count(&self) -> AuthResult<usize> {
        self.storage.count().await
    }
}
