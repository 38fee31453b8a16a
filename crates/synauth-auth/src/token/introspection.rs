//! Wire types shared by `/oauth2/introspect` (RFC 7662) and
//! `/oauth2/revoke` (RFC 7009).
//!
//! An inactive token serializes as `{"active": false}` whatever the reason.

use serde::{Deserialize, Serialize};

use crate::token::jwt::AccessTokenClaims;
use crate::types::RefreshToken;

/// Token type hint sent alongside introspection and revocation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// The token is an access token.
    AccessToken,
    /// The token is a refresh token.
    RefreshToken,
}

impl TokenTypeHint {
    /// Returns the token type hint as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of an introspection or revocation request.
///
/// Client credentials may accompany the token in the body or travel in an
/// HTTP Basic header.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenActionRequest {
    /// The token to inspect or revoke.
    pub token: String,

    /// Optional hint about the token type.
    #[serde(default)]
    pub token_type_hint: Option<TokenTypeHint>,

    /// Client ID (client_secret_post).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (client_secret_post).
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Token introspection response per RFC 7662.
///
/// An inactive token yields `{"active": false}` and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active.
    pub active: bool,

    /// Space-separated scopes granted to the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Principal the token was issued on behalf of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Type of the token ("Bearer" or "refresh_token").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration time (Unix timestamp).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at time (Unix timestamp).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Issuer of the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// JWT ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectionResponse {
    /// Creates an inactive response.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Describes a valid access token from its claims.
    #[must_use]
    pub fn for_access_token(claims: AccessTokenClaims) -> Self {
        Self {
            active: true,
            scope: Some(claims.scope),
            client_id: Some(claims.client_id),
            sub: Some(claims.sub),
            token_type: Some("Bearer".to_string()),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            iss: Some(claims.iss),
            jti: Some(claims.jti),
        }
    }

    /// Describes a stored, still active refresh token.
    #[must_use]
    pub fn for_refresh_token(stored: RefreshToken, issuer: &str) -> Self {
        Self {
            active: true,
            scope: Some(stored.scopes.to_string()),
            client_id: Some(stored.client_id),
            sub: Some(stored.principal_id),
            token_type: Some(TokenTypeHint::RefreshToken.as_str().to_string()),
            exp: Some(stored.expires_at.unix_timestamp()),
            iat: Some(stored.issued_at.unix_timestamp()),
            iss: Some(issuer.to_string()),
            jti: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScopeSet;

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"token": "abc", "token_type_hint": "refresh_token"}"#;
        let request: TokenActionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.token, "abc");
        assert_eq!(request.token_type_hint, Some(TokenTypeHint::RefreshToken));
        assert!(request.client_id.is_none());
    }

    #[test]
    fn test_inactive_serializes_to_single_field() {
        let json = serde_json::to_string(&IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, r#"{"active":false}"#);
    }

    #[test]
    fn test_refresh_token_response() {
        let now = time::OffsetDateTime::now_utc();
        let stored = RefreshToken {
            token_hash: RefreshToken::hash_token("rt"),
            client_id: "c1".to_string(),
            principal_id: "alice".to_string(),
            scopes: ScopeSet::parse("read"),
            issued_at: now,
            expires_at: now + time::Duration::hours(1),
            revoked: false,
        };

        let json = serde_json::to_value(IntrospectionResponse::for_refresh_token(
            stored,
            "http://localhost:9050",
        ))
        .unwrap();
        assert_eq!(json["active"], true);
        assert_eq!(json["scope"], "read");
        assert_eq!(json["token_type"], "refresh_token");
        assert_eq!(json["exp"], (now + time::Duration::hours(1)).unix_timestamp());
        assert!(json.get("jti").is_none());
    }

    #[test]
    fn test_token_type_hint_display() {
        assert_eq!(TokenTypeHint::AccessToken.to_string(), "access_token");
        assert_eq!(TokenTypeHint::RefreshToken.as_str(), "refresh_token");
    }
}
