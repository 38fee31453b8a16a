//! Token endpoint wire types.
//!
//! # Supported Grant Types
//!
//! - `authorization_code` - Exchange an authorization code for tokens
//! - `refresh_token` - Exchange a refresh token for a new access token

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Token request parameters (form encoded).
///
/// Different fields are required depending on `grant_type`:
///
/// - `authorization_code`: code, redirect_uri
/// - `refresh_token`: refresh_token, (optional) scope
///
/// Client credentials travel either in an HTTP Basic header (not in this
/// struct) or as `client_id` + `client_secret`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code (authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI, must match the authorization request.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Client ID (client_secret_post).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (client_secret_post).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Refresh token (refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Requested scope (refresh_token grant, must be a subset of the original).
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token response.
///
/// ```json
/// {
///   "access_token": "eyJhbG...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "openid products.read",
///   "refresh_token": "abc123..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// The access token (JWT).
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Refresh token, when the client may use the refresh_token grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Creates a new token response with required fields.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: Option<String>) -> Self {
        self.refresh_token = token;
        self
    }
}

/// Token error response.
///
/// ```json
/// {
///   "error": "invalid_grant",
///   "error_description": "Authorization code expired"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenErrorResponse {
    /// OAuth 2.0 error code.
    pub error: String,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl TokenErrorResponse {
    /// Builds the token endpoint error for `err`.
    ///
    /// Code, redirect and refresh failures all surface as `invalid_grant`.
    /// Server-side failures carry no description.
    #[must_use]
    pub fn from_error(err: &AuthError) -> Self {
        let error_description = if err.is_server_error() {
            None
        } else {
            Some(err.to_string())
        };
        Self {
            error: token_error_code(err).to_string(),
            error_description,
        }
    }
}

/// RFC 6749 5.2 error code for a token endpoint failure.
#[must_use]
pub fn token_error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidRedirectUri { .. } | AuthError::AuthenticationFailed { .. } => {
            "invalid_grant"
        }
        other => other.oauth_error_code(),
    }
}

/// HTTP status for a token endpoint failure.
///
/// Everything is 400 except `invalid_client` via Basic auth (401),
/// `temporarily_unavailable` (503) and `server_error` (500).
#[must_use]
pub fn token_error_status(err: &AuthError, used_basic_auth: bool) -> u16 {
    match err {
        AuthError::InvalidClient { .. } if used_basic_auth => 401,
        AuthError::ServiceUnavailable { .. } => 503,
        AuthError::Configuration { .. } | AuthError::Internal { .. } => 500,
        _ => 400,
    }
}
