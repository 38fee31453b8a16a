//! Authorization code lifecycle.
//!
//! An [`AuthorizationCode`] binds a principal's consent to one client, one
//! redirect URI and one scope set for a short time. The
//! [`AuthorizationCodeManager`] issues codes and redeems them exactly once.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::AuthorizationCodeStorage;
use crate::types::ScopeSet;

/// An issued authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Opaque code value (256 bits of entropy, base64url).
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Principal who authorized the request.
    pub principal_id: String,

    /// Scopes granted at authorization time.
    pub scopes: ScopeSet,

    /// Redirect URI used in the authorization request.
    pub redirect_uri: String,

    /// When the code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the code stops being redeemable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Set exactly once, by the successful redemption.
    pub consumed: bool,
}

impl AuthorizationCode {
    /// Generates a new random code value.
    #[must_use]
    pub fn generate_code() -> String {
        crate::types::random_token()
    }

    /// Returns `true` if the code has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Checks whether this code may be redeemed by `client_id` with
    /// `redirect_uri` at `now`.
    ///
    /// Storage implementations call this inside their atomic redeem step.
    ///
    /// # Errors
    ///
    /// In order of precedence: `CodeAlreadyUsed`, `CodeExpired`,
    /// `ClientMismatch`, `RedirectUriMismatch`.
    pub fn check_redeemable(
        &self,
        client_id: &str,
        redirect_uri: &str,
        now: OffsetDateTime,
    ) -> AuthResult<()> {
        if self.consumed {
            return Err(AuthError::CodeAlreadyUsed);
        }
        if self.is_expired_at(now) {
            return Err(AuthError::CodeExpired);
        }
        if self.client_id != client_id {
            return Err(AuthError::ClientMismatch);
        }
        if self.redirect_uri != redirect_uri {
            return Err(AuthError::RedirectUriMismatch);
        }
        Ok(())
    }
}

/// What a successful redemption yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeGrant {
    /// Principal who authorized the request.
    pub principal_id: String,

    /// Scopes granted at authorization time.
    pub scopes: ScopeSet,
}

/// Issues and redeems authorization codes.
pub struct AuthorizationCodeManager {
    storage: Arc<dyn AuthorizationCodeStorage>,
    lifetime: Duration,
}

impl AuthorizationCodeManager {
    /// Creates a manager issuing codes valid for `lifetime`.
    #[must_use]
    pub fn new(storage: Arc<dyn AuthorizationCodeStorage>, lifetime: Duration) -> Self {
        Self { storage, lifetime }
    }

    /// Code lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues and stores a new code.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the code cannot be stored.
    pub async fn issue(
        &self,
        client_id: &str,
        principal_id: &str,
        scopes: &ScopeSet,
        redirect_uri: &str,
    ) -> AuthResult<AuthorizationCode> {
        let issued_at = OffsetDateTime::now_utc();
        let code = AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            client_id: client_id.to_string(),
            principal_id: principal_id.to_string(),
            scopes: scopes.clone(),
            redirect_uri: redirect_uri.to_string(),
            issued_at,
            expires_at: issued_at + self.lifetime,
            consumed: false,
        };

        self.storage.insert(code.clone()).await?;

        tracing::debug!(
            client_id = %client_id,
            principal = %principal_id,
            scope = %scopes,
            expires_at = %code.expires_at,
            "Authorization code issued"
        );

        Ok(code)
    }

    /// Redeems a code at the current time.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationCodeManager::redeem_at`].
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> AuthResult<CodeGrant> {
        self.redeem_at(code, client_id, redirect_uri, OffsetDateTime::now_utc())
            .await
    }

    /// Redeems a code as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` for unknown codes, `CodeAlreadyUsed`,
    /// `CodeExpired`, `ClientMismatch` or `RedirectUriMismatch` when the
    /// code cannot be redeemed, and `ServiceUnavailable` on storage failure.
    pub async fn redeem_at(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: OffsetDateTime,
    ) -> AuthResult<CodeGrant> {
        let redeemed = self
            .storage
            .redeem(code, client_id, redirect_uri, now)
            .await
            .inspect_err(|e| {
                tracing::warn!(client_id = %client_id, error = %e, "Authorization code rejected");
            })?;

        tracing::debug!(
            client_id = %client_id,
            principal = %redeemed.principal_id,
            "Authorization code redeemed"
        );

        Ok(CodeGrant {
            principal_id: redeemed.principal_id,
            scopes: redeemed.scopes,
        })
    }

    /// Removes expired and consumed codes.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` on storage failure.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.storage.purge_expired(OffsetDateTime::now_utc()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryCodeStorage;
    use time::Duration as TimeDuration;

    const REDIRECT: &str = "https://app/cb";

    fn manager() -> AuthorizationCodeManager {
        AuthorizationCodeManager::new(
            Arc::new(InMemoryCodeStorage::new()),
            Duration::from_secs(300),
        )
    }

    fn make_code(now: OffsetDateTime) -> AuthorizationCode {
        AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            client_id: "c1".to_string(),
            principal_id: "alice".to_string(),
            scopes: ScopeSet::parse("read"),
            redirect_uri: REDIRECT.to_string(),
            issued_at: now,
            expires_at: now + TimeDuration::minutes(5),
            consumed: false,
        }
    }

    #[test]
    fn test_generated_code_entropy() {
        let code = AuthorizationCode::generate_code();
        // 32 bytes base64url encoded
        assert_eq!(code.len(), 43);
        assert_ne!(code, AuthorizationCode::generate_code());
    }

    #[test]
    fn test_check_redeemable_order() {
        let now = OffsetDateTime::now_utc();
        let mut code = make_code(now);
        assert!(code.check_redeemable("c1", REDIRECT, now).is_ok());

        assert_eq!(
            code.check_redeemable("c2", REDIRECT, now),
            Err(AuthError::ClientMismatch)
        );
        assert_eq!(
            code.check_redeemable("c1", "https://app/other", now),
            Err(AuthError::RedirectUriMismatch)
        );
        assert_eq!(
            code.check_redeemable("c1", REDIRECT, code.expires_at),
            Err(AuthError::CodeExpired)
        );

        code.consumed = true;
        // Consumption is reported before any other mismatch
        assert_eq!(
            code.check_redeemable("c2", "https://app/other", code.expires_at),
            Err(AuthError::CodeAlreadyUsed)
        );
    }

    #[tokio::test]
    async fn test_issue_sets_expiry_from_lifetime() {
        let manager = manager();
        let code = manager
            .issue("c1", "alice", &ScopeSet::parse("read"), REDIRECT)
            .await
            .unwrap();

        assert_eq!(code.expires_at - code.issued_at, TimeDuration::seconds(300));
        assert!(!code.consumed);
    }

    #[tokio::test]
    async fn test_redeem_once() {
        let manager = manager();
        let code = manager
            .issue("c1", "alice", &ScopeSet::parse("read"), REDIRECT)
            .await
            .unwrap();

        let grant = manager.redeem(&code.code, "c1", REDIRECT).await.unwrap();
        assert_eq!(grant.principal_id, "alice");
        assert_eq!(grant.scopes, ScopeSet::parse("read"));

        let err = manager.redeem(&code.code, "c1", REDIRECT).await.unwrap_err();
        assert_eq!(err, AuthError::CodeAlreadyUsed);
    }

    #[tokio::test]
    async fn test_redirect_mismatch_leaves_code_redeemable() {
        let manager = manager();
        let code = manager
            .issue("c1", "alice", &ScopeSet::parse("read"), REDIRECT)
            .await
            .unwrap();

        let err = manager
            .redeem(&code.code, "c1", "https://app/cb2")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::RedirectUriMismatch);

        assert!(manager.redeem(&code.code, "c1", REDIRECT).await.is_ok());
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let manager = manager();
        let code = manager
            .issue("c1", "alice", &ScopeSet::parse("read"), REDIRECT)
            .await
            .unwrap();

        let err = manager
            .redeem_at(&code.code, "c1", REDIRECT, code.expires_at)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::CodeExpired);

        let just_before = code.expires_at - TimeDuration::milliseconds(1);
        assert!(
            manager
                .redeem_at(&code.code, "c1", REDIRECT, just_before)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let err = manager().redeem("nope", "c1", REDIRECT).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }
}
