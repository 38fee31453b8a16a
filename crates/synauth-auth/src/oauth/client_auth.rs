//! Client authentication for the token, revocation and introspection
//! endpoints.
//!
//! # Authentication Methods
//!
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in request body
//!
//! Every registered client is confidential, so presenting only a client_id
//! is rejected. When both methods are present, the Basic header wins.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::password::verify_credential_async;
use crate::oauth::registry::ClientRegistry;
use crate::types::RegisteredClient;

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The authenticated client.
    pub client: RegisteredClient,

    /// The authentication method used.
    pub auth_method: TokenEndpointAuthMethod,
}

/// Token endpoint authentication methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Client secret via HTTP Basic Auth.
    ClientSecretBasic,

    /// Client secret in request body.
    ClientSecretPost,
}

impl TokenEndpointAuthMethod {
    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
        }
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client credentials as found on a request.
#[derive(Debug, Clone, Default)]
pub struct ClientCredentials {
    /// Credentials from an `Authorization: Basic` header.
    pub basic: Option<(String, String)>,
    /// `client_id` form parameter.
    pub client_id: Option<String>,
    /// `client_secret` form parameter.
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    /// The client ID the caller claims to be, before authentication.
    #[must_use]
    pub fn claimed_client_id(&self) -> Option<&str> {
        self.basic
            .as_ref()
            .map(|(id, _)| id.as_str())
            .or(self.client_id.as_deref())
    }

    /// Returns `true` if the Basic header carried the credentials.
    #[must_use]
    pub fn used_basic(&self) -> bool {
        self.basic.is_some()
    }
}

/// Authenticates a client against the registry.
///
/// # Errors
///
/// Returns `InvalidClient` if no credentials are present, the client is
/// unknown or the secret does not match. A Basic header client ID that
/// disagrees with a `client_id` body parameter is `InvalidRequest`.
pub async fn authenticate_client(
    registry: &ClientRegistry,
    credentials: &ClientCredentials,
) -> AuthResult<AuthenticatedClient> {
    let (client_id, client_secret, auth_method) = match (&credentials.basic, &credentials.client_secret)
    {
        (Some((id, secret)), _) => {
            if credentials.client_id.as_deref().is_some_and(|body| body != id) {
                return Err(AuthError::invalid_request(
                    "client_id does not match the Authorization header",
                ));
            }
            (id.as_str(), secret.as_str(), TokenEndpointAuthMethod::ClientSecretBasic)
        }
        (None, Some(secret)) => {
            let id = credentials
                .client_id
                .as_deref()
                .ok_or_else(|| AuthError::invalid_request("Missing client_id parameter"))?;
            (id, secret.as_str(), TokenEndpointAuthMethod::ClientSecretPost)
        }
        (None, None) => {
            return Err(AuthError::invalid_client("Client authentication required"));
        }
    };

    let client = registry
        .find(client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

    if !verify_credential_async(&client.client_secret_hash, client_secret).await? {
        tracing::warn!(client_id = %client_id, method = %auth_method, "Client authentication failed");
        return Err(AuthError::invalid_client("Invalid client secret"));
    }

    Ok(AuthenticatedClient {
        client,
        auth_method,
    })
}

/// Parses an HTTP Basic Auth header value into `(user, password)`.
///
/// The password may contain colons; the split happens at the first one.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (user, password) = credentials.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
