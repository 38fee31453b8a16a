//! Authentication context types.

use crate::token::ValidatedToken;
use crate::types::ScopeSet;

/// Authenticated request context, built from a validated bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Validated token contents.
    pub token: ValidatedToken,
}

impl AuthContext {
    /// Principal the token was issued for.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.token.principal_id
    }

    /// Client the token was issued to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.token.client_id
    }

    /// Granted scopes.
    #[must_use]
    pub fn scopes(&self) -> &ScopeSet {
        &self.token.scopes
    }

    /// Returns `true` if the token carries `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.token.scopes.contains(scope)
    }

    /// Expiry as a unix timestamp.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.token.expires_at.unix_timestamp()
    }
}
