//! Registered OAuth 2.0 client types.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::scope::ScopeSet;

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
///
/// Defines the authorization flows a client is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Refresh Token flow.
    RefreshToken,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(other.to_string()),
        }
    }
}

// =============================================================================
// Registered Client
// =============================================================================

/// An OAuth 2.0 client registration.
///
/// Registrations are created at bootstrap and never mutated while the
/// server is handling requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Encoded client secret: `{noop}<plain>` or an argon2 PHC string.
    pub client_secret_hash: String,

    /// Redirect URIs accepted for the authorization code flow. Compared exactly.
    #[serde(default)]
    pub redirect_uris: BTreeSet<String>,

    /// Scopes this client may request.
    #[serde(default)]
    pub scopes: ScopeSet,

    /// Grant types this client may use.
    pub grant_types: BTreeSet<GrantType>,
}

impl RegisteredClient {
    /// Creates a client allowed to use the authorization code grant, with no
    /// redirect URIs or scopes yet.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret_hash: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret_hash: client_secret_hash.into(),
            redirect_uris: BTreeSet::new(),
            scopes: ScopeSet::new(),
            grant_types: BTreeSet::from([GrantType::AuthorizationCode]),
        }
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.insert(uri.into());
        self
    }

    /// Replaces the allowed scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
        self.scopes = scopes;
        self
    }

    /// Allows an additional grant type.
    #[must_use]
    pub fn with_grant_type(mut self, grant_type: GrantType) -> Self {
        self.grant_types.insert(grant_type);
        self
    }

    /// Validates the registration.
    ///
    /// # Errors
    ///
    /// Returns `ClientValidationError` if the client ID or secret is empty,
    /// no grant type is allowed, the authorization code grant is allowed
    /// without redirect URIs, or a redirect URI is not an absolute URL
    /// without a fragment.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.client_secret_hash.is_empty() {
            return Err(ClientValidationError::MissingSecret);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        if self.is_grant_type_allowed(GrantType::AuthorizationCode) && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        // RFC 6749 3.1.2: absolute URI, no fragment component
        for uri in &self.redirect_uris {
            let parsed = url::Url::parse(uri)
                .map_err(|_| ClientValidationError::InvalidRedirectUri(uri.clone()))?;
            if parsed.fragment().is_some() {
                return Err(ClientValidationError::InvalidRedirectUri(uri.clone()));
            }
        }

        Ok(())
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.contains(uri)
    }

    /// Checks if the client may use the given grant type.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Checks if the given scope is registered for this client.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Errors that can occur when validating a client registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// Clients require a client secret.
    #[error("Client secret cannot be empty")]
    MissingSecret,

    /// At least one grant type is required.
    #[error("At least one grant type is required")]
    NoGrantTypes,

    /// Authorization code flow requires redirect URIs.
    #[error("Authorization code flow requires redirect URIs")]
    NoRedirectUris,

    /// A redirect URI is not an absolute URL or carries a fragment.
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_valid_client() -> RegisteredClient {
        RegisteredClient::new("gateway-client", "{noop}secret")
            .with_redirect_uri("http://localhost:8000/login/oauth2/code/gateway-client")
            .with_scopes(ScopeSet::parse("products.read products.write"))
            .with_grant_type(GrantType::RefreshToken)
    }

    #[test]
    fn test_valid_client() {
        assert!(make_valid_client().validate().is_ok());
    }

    #[test]
    fn test_empty_client_id() {
        let mut client = make_valid_client();
        client.client_id = String::new();
        assert_eq!(client.validate(), Err(ClientValidationError::EmptyClientId));
    }

    #[test]
    fn test_empty_secret() {
        let mut client = make_valid_client();
        client.client_secret_hash = String::new();
        assert_eq!(client.validate(), Err(ClientValidationError::MissingSecret));
    }

    #[test]
    fn test_authorization_code_requires_redirect_uris() {
        let mut client = make_valid_client();
        client.redirect_uris.clear();
        assert_eq!(client.validate(), Err(ClientValidationError::NoRedirectUris));
    }

    #[test]
    fn test_no_grant_types() {
        let mut client = make_valid_client();
        client.grant_types.clear();
        assert_eq!(client.validate(), Err(ClientValidationError::NoGrantTypes));
    }

    #[test]
    fn test_redirect_uri_with_fragment_rejected() {
        let client = make_valid_client().with_redirect_uri("https://app.example.com/cb#frag");
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::InvalidRedirectUri(_))
        ));
    }

    #[test]
    fn test_relative_redirect_uri_rejected() {
        let client = make_valid_client().with_redirect_uri("/callback");
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::InvalidRedirectUri(_))
        ));
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let client = make_valid_client();
        assert!(client.is_redirect_uri_allowed(
            "http://localhost:8000/login/oauth2/code/gateway-client"
        ));
        assert!(!client.is_redirect_uri_allowed(
            "http://localhost:8000/login/oauth2/code/gateway-client/"
        ));
        assert!(!client.is_redirect_uri_allowed(
            "http://localhost:8000/login/oauth2/code/gateway-client?x=1"
        ));
    }

    #[test]
    fn test_grant_type_parsing() {
        assert_eq!(
            "authorization_code".parse::<GrantType>(),
            Ok(GrantType::AuthorizationCode)
        );
        assert_eq!("refresh_token".parse::<GrantType>(), Ok(GrantType::RefreshToken));
        assert!("client_credentials".parse::<GrantType>().is_err());
        assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
    }

    #[test]
    fn test_grant_type_allowed() {
        let client = make_valid_client();
        assert!(client.is_grant_type_allowed(GrantType::AuthorizationCode));
        assert!(client.is_grant_type_allowed(GrantType::RefreshToken));

        let code_only = RegisteredClient::new("c1", "{noop}s");
        assert!(!code_only.is_grant_type_allowed(GrantType::RefreshToken));
    }
}
