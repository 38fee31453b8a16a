//! Authorization server metadata (RFC 8414).
//!
//! Served at both `/.well-known/oauth-authorization-server` and
//! `/.well-known/openid-configuration`. Every URL is derived from the
//! configured issuer, never from the bind address.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use super::{OAuthState, paths};

/// Authorization server metadata document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier, identical to `iss` in every token.
    pub issuer: String,
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// JWK set URL.
    pub jwks_uri: String,
    /// Revocation endpoint URL.
    pub revocation_endpoint: String,
    /// Introspection endpoint URL.
    pub introspection_endpoint: String,
    /// Userinfo endpoint URL.
    pub userinfo_endpoint: String,
    /// Always `["code"]`.
    pub response_types_supported: Vec<String>,
    /// Supported grant types.
    pub grant_types_supported: Vec<String>,
    /// Client authentication methods at the token endpoint.
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Signing algorithm of the active key.
    pub id_token_signing_alg_values_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Builds the document for `issuer`.
    #[must_use]
    pub fn for_issuer(issuer: &str, signing_alg: &str) -> Self {
        let base = issuer.trim_end_matches('/');
        let url = |path: &str| format!("{base}{path}");

        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: url(paths::AUTHORIZE),
            token_endpoint: url(paths::TOKEN),
            jwks_uri: url(paths::JWKS),
            revocation_endpoint: url(paths::REVOKE),
            introspection_endpoint: url(paths::INTROSPECT),
            userinfo_endpoint: url(paths::USERINFO),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_basic".to_string(),
                "client_secret_post".to_string(),
            ],
            id_token_signing_alg_values_supported: vec![signing_alg.to_string()],
        }
    }
}

/// Handler for both well-known metadata paths.
pub async fn discovery_handler(State(state): State<OAuthState>) -> impl IntoResponse {
    let tokens = state.engine.tokens();
    Json(AuthorizationServerMetadata::for_issuer(
        tokens.issuer(),
        tokens.signing_algorithm().as_str(),
    ))
}
