//! In-memory storage backed by `DashMap`.
//!
//! Suitable for single-node deployments and tests. Every per-entry update
//! runs under the shard write lock of its key, which is what makes code
//! redemption and refresh token revocation atomic.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::code::AuthorizationCode;
use crate::types::{PrincipalRecord, RefreshToken, RegisteredClient};

use super::{AuthorizationCodeStorage, ClientStorage, PrincipalStore, RefreshTokenStorage};

// =============================================================================
// Clients
// =============================================================================

/// Client registrations keyed by client_id.
#[derive(Clone, Default)]
pub struct InMemoryClientStorage {
    clients: Arc<DashMap<String, RegisteredClient>>,
}

impl InMemoryClientStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        Ok(self
            .clients
            .get(client_id)
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, client: RegisteredClient) -> AuthResult<()> {
        match self.clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Err(AuthError::configuration(format!(
                "client '{}' is already registered",
                client.client_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(client);
                Ok(())
            }
        }
    }

    async fn count(&self) -> AuthResult<usize> {
        Ok(self.clients.len())
    }
}

// =============================================================================
// Authorization codes
// =============================================================================

/// Authorization codes keyed by code value.
#[derive(Clone, Default)]
pub struct InMemoryCodeStorage {
    codes: Arc<DashMap<String, AuthorizationCode>>,
}

impl InMemoryCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored codes, consumed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` if no codes are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl AuthorizationCodeStorage for InMemoryCodeStorage {
    async fn insert(&self, code: AuthorizationCode) -> AuthResult<()> {
        match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(AuthError::internal("authorization code collision")),
            Entry::Vacant(slot) => {
                slot.insert(code);
                Ok(())
            }
        }
    }

    async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self.codes.get(code).map(|entry| entry.value().clone()))
    }

    async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: OffsetDateTime,
    ) -> AuthResult<AuthorizationCode> {
        // get_mut holds the shard write lock until `entry` drops
        let mut entry = self
            .codes
            .get_mut(code)
            .ok_or_else(|| AuthError::invalid_grant("Unknown authorization code"))?;

        entry.check_redeemable(client_id, redirect_uri, now)?;
        entry.consumed = true;
        Ok(entry.clone())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let before = self.codes.len();
        self.codes
            .retain(|_, code| !code.consumed && !code.is_expired_at(now));
        Ok(before.saturating_sub(self.codes.len()) as u64)
    }
}

// =============================================================================
// Refresh tokens
// =============================================================================

/// Refresh tokens keyed by token hash.
#[derive(Clone, Default)]
pub struct InMemoryRefreshTokenStorage {
    tokens: Arc<DashMap<String, RefreshToken>>,
}

impl InMemoryRefreshTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens, revoked ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStorage for InMemoryRefreshTokenStorage {
    async fn insert(&self, token: RefreshToken) -> AuthResult<()> {
        self.tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self
            .tokens
            .get(token_hash)
            .map(|entry| entry.value().clone()))
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        Ok(match self.tokens.get_mut(token_hash) {
            Some(mut token) if !token.revoked => {
                token.revoked = true;
                true
            }
            _ => false,
        })
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| token.is_active_at(now));
        Ok(before.saturating_sub(self.tokens.len()) as u64)
    }
}

// =============================================================================
// Principals
// =============================================================================

/// Principals keyed by username.
#[derive(Clone, Default)]
pub struct InMemoryPrincipalStore {
    principals: Arc<DashMap<String, PrincipalRecord>>,
}

impl InMemoryPrincipalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the principal registered under `username`.
    pub fn insert(&self, username: impl Into<String>, record: PrincipalRecord) {
        self.principals.insert(username.into(), record);
    }

    /// Number of registered principals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// Returns `true` if no principals are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn load_principal(&self, username: &str) -> AuthResult<Option<PrincipalRecord>> {
        Ok(self
            .principals
            .get(username)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScopeSet;
    use time::Duration;

    fn make_code(value: &str, expires_at: OffsetDateTime) -> AuthorizationCode {
        AuthorizationCode {
            code: value.to_string(),
            client_id: "c1".to_string(),
            principal_id: "alice".to_string(),
            scopes: ScopeSet::parse("read"),
            redirect_uri: "https://app/cb".to_string(),
            issued_at: expires_at - Duration::minutes(5),
            expires_at,
            consumed: false,
        }
    }

    fn make_refresh(hash: &str, expires_at: OffsetDateTime) -> RefreshToken {
        RefreshToken {
            token_hash: hash.to_string(),
            principal_id: "alice".to_string(),
            client_id: "c1".to_string(),
            scopes: ScopeSet::parse("read"),
            issued_at: expires_at - Duration::days(1),
            expires_at,
            revoked: false,
        }
    }

    #[tokio::test]
    async fn test_client_insert_rejects_duplicates() {
        let storage = InMemoryClientStorage::new();
        let client = RegisteredClient::new("c1", "{noop}s").with_redirect_uri("https://app/cb");

        storage.insert(client.clone()).await.unwrap();
        let err = storage.insert(client.clone()).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));

        assert_eq!(storage.find_by_client_id("c1").await.unwrap(), Some(client));
        assert_eq!(storage.find_by_client_id("c2").await.unwrap(), None);
        assert_eq!(storage.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redeem_marks_consumed() {
        let storage = InMemoryCodeStorage::new();
        let now = OffsetDateTime::now_utc();
        storage
            .insert(make_code("abc", now + Duration::minutes(5)))
            .await
            .unwrap();

        let redeemed = storage.redeem("abc", "c1", "https://app/cb", now).await.unwrap();
        assert!(redeemed.consumed);
        assert!(storage.find("abc").await.unwrap().unwrap().consumed);
    }

    #[tokio::test]
    async fn test_failed_redeem_does_not_consume() {
        let storage = InMemoryCodeStorage::new();
        let now = OffsetDateTime::now_utc();
        storage
            .insert(make_code("abc", now + Duration::minutes(5)))
            .await
            .unwrap();

        let err = storage.redeem("abc", "c2", "https://app/cb", now).await.unwrap_err();
        assert_eq!(err, AuthError::ClientMismatch);
        assert!(!storage.find("abc").await.unwrap().unwrap().consumed);
    }

    #[tokio::test]
    async fn test_purge_expired_codes() {
        let storage = InMemoryCodeStorage::new();
        let now = OffsetDateTime::now_utc();
        storage.insert(make_code("live", now + Duration::minutes(5))).await.unwrap();
        storage.insert(make_code("dead", now - Duration::seconds(1))).await.unwrap();
        storage.insert(make_code("used", now + Duration::minutes(5))).await.unwrap();
        storage.redeem("used", "c1", "https://app/cb", now).await.unwrap();

        assert_eq!(storage.purge_expired(now).await.unwrap(), 2);
        assert_eq!(storage.len(), 1);
        assert!(storage.find("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_flips_once() {
        let storage = InMemoryRefreshTokenStorage::new();
        storage
            .insert(make_refresh("h1", OffsetDateTime::now_utc() + Duration::days(1)))
            .await
            .unwrap();

        assert!(storage.revoke("h1").await.unwrap());
        assert!(!storage.revoke("h1").await.unwrap());
        assert!(!storage.revoke("missing").await.unwrap());
        assert!(storage.find_by_hash("h1").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn test_purge_expired_refresh_tokens() {
        let storage = InMemoryRefreshTokenStorage::new();
        let now = OffsetDateTime::now_utc();
        storage.insert(make_refresh("live", now + Duration::days(1))).await.unwrap();
        storage.insert(make_refresh("dead", now - Duration::seconds(1))).await.unwrap();
        storage.insert(make_refresh("revoked", now + Duration::days(1))).await.unwrap();
        storage.revoke("revoked").await.unwrap();

        assert_eq!(storage.purge_expired(now).await.unwrap(), 2);
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_principal_lookup() {
        let store = InMemoryPrincipalStore::new();
        store.insert(
            "alice",
            PrincipalRecord::new("alice", "{noop}pw").with_authority("ROLE_USER"),
        );

        let record = store.load_principal("alice").await.unwrap().unwrap();
        assert_eq!(record.id, "alice");
        assert!(store.load_principal("bob").await.unwrap().is_none());
    }
}
