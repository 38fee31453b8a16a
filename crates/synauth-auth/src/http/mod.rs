//! Axum HTTP handlers for the OAuth 2.0 endpoints.
//!
//! # Available Handlers
//!
//! - [`authorize`] - Authorization endpoint (Basic-authenticated principal)
//! - [`token`] - Token endpoint
//! - [`revoke`] - Token revocation endpoint (RFC 7009)
//! - [`introspect`] - Token introspection endpoint (RFC 7662)
//! - [`jwks`] - Public signing keys
//! - [`discovery`] - Authorization server metadata (RFC 8414)
//! - [`userinfo`] - Bearer-protected principal summary
//!
//! Every handler except `userinfo` runs on [`OAuthState`]; `userinfo` only
//! needs [`AuthState`], which derives from it.

use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::middleware::AuthState;
use crate::oauth::{AuthorizationEngine, ClientCredentials, parse_basic_auth};

pub mod authorize;
pub mod discovery;
pub mod introspect;
pub mod jwks;
pub mod revoke;
pub mod token;
pub mod userinfo;

pub use authorize::authorize_handler;
pub use discovery::{AuthorizationServerMetadata, discovery_handler};
pub use introspect::introspect_handler;
pub use jwks::jwks_handler;
pub use revoke::revoke_handler;
pub use token::token_handler;
pub use userinfo::{UserInfoResponse, userinfo_handler};

/// Endpoint paths, relative to the issuer.
pub mod paths {
    /// Authorization endpoint.
    pub const AUTHORIZE: &str = "/oauth2/authorize";
    /// Token endpoint.
    pub const TOKEN: &str = "/oauth2/token";
    /// Revocation endpoint.
    pub const REVOKE: &str = "/oauth2/revoke";
    /// Introspection endpoint.
    pub const INTROSPECT: &str = "/oauth2/introspect";
    /// JWK set.
    pub const JWKS: &str = "/oauth2/jwks";
    /// RFC 8414 metadata.
    pub const OAUTH_METADATA: &str = "/.well-known/oauth-authorization-server";
    /// OpenID discovery alias of the metadata.
    pub const OPENID_CONFIGURATION: &str = "/.well-known/openid-configuration";
    /// Principal summary.
    pub const USERINFO: &str = "/userinfo";
}

/// Shared state for the authorization-server endpoints.
#[derive(Clone)]
pub struct OAuthState {
    /// Engine behind every endpoint.
    pub engine: Arc<AuthorizationEngine>,
}

impl OAuthState {
    /// Creates a new state.
    #[must_use]
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        Self { engine }
    }
}

impl FromRef<OAuthState> for AuthState {
    fn from_ref(state: &OAuthState) -> Self {
        AuthState::new(state.engine.tokens().clone())
    }
}

/// Collects client credentials from the Basic header and form parameters.
pub(crate) fn client_credentials(
    headers: &HeaderMap,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> ClientCredentials {
    let basic = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth);

    ClientCredentials {
        basic,
        client_id,
        client_secret,
    }
}
