//! Authorization endpoint types.
//!
//! # OAuth 2.0 Authorization Code Flow
//!
//! 1. Client redirects the user agent to the authorization endpoint
//! 2. The principal authenticates
//! 3. Server redirects back to the client with a code (or an error)
//! 4. Client exchanges the code at the token endpoint
//!
//! Errors are only ever redirected once the client and its redirect URI
//! have been verified; anything earlier is answered directly.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::types::ScopeSet;

/// Authorization request parameters, received on the query string.
///
/// # Example
///
/// ```ignore
/// GET /oauth2/authorize?
///   response_type=code
///   &client_id=gateway-client
///   &redirect_uri=http://localhost:8000/login/oauth2/code/gateway-client
///   &scope=openid%20products.read
///   &state=xyz
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationRequest {
    /// Must be "code".
    #[serde(default)]
    pub response_type: String,

    /// Client identifier.
    #[serde(default)]
    pub client_id: String,

    /// Redirect URI. Must exactly match a registered URI.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Space-separated requested scopes. Absent means every registered scope.
    #[serde(default)]
    pub scope: Option<String>,

    /// Opaque value echoed back on the redirect.
    #[serde(default)]
    pub state: Option<String>,
}

impl AuthorizationRequest {
    /// Requested scopes as a set.
    #[must_use]
    pub fn scopes(&self) -> ScopeSet {
        self.scope.as_deref().map(ScopeSet::parse).unwrap_or_default()
    }

    /// Checks the response type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedResponseType` unless it is `code`.
    pub fn check_response_type(&self) -> Result<(), AuthError> {
        if self.response_type == "code" {
            Ok(())
        } else {
            Err(AuthError::unsupported_response_type(&self.response_type))
        }
    }
}

/// Successful authorization response.
///
/// ```ignore
/// HTTP/1.1 302 Found
/// Location: https://app.example.com/callback?code=SplxlOBeZQQYbYS6WxSbIA&state=xyz
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationResponse {
    /// Authorization code to be exchanged for tokens.
    pub code: String,

    /// Echoed state parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationResponse {
    /// Creates a new authorization response.
    #[must_use]
    pub fn new(code: String, state: Option<String>) -> Self {
        Self { code, state }
    }

    /// Builds the redirect URL carrying `code` and `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not a valid URL.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(redirect_uri)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("code", &self.code);
            if let Some(state) = &self.state {
                pairs.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }
}

/// Authorization error response, redirected to a trusted redirect URI.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorizationErrorResponse {
    /// OAuth 2.0 error code.
    pub error: String,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// Echoed state parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationErrorResponse {
    /// Builds the response for `err`.
    #[must_use]
    pub fn from_error(err: &AuthError, state: Option<String>) -> Self {
        Self {
            error: err.oauth_error_code().to_string(),
            error_description: Some(err.to_string()),
            state,
        }
    }

    /// Builds the redirect URL carrying the error parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not a valid URL.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(redirect_uri)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("error", &self.error);
            if let Some(desc) = &self.error_description {
                pairs.append_pair("error_description", desc);
            }
            if let Some(state) = &self.state {
                pairs.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_request_deserialize() {
        let json = r#"{
            "response_type": "code",
            "client_id": "c1",
            "redirect_uri": "https://app/cb",
            "scope": "read write",
            "state": "xyz"
        }"#;
        let request: AuthorizationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.client_id, "c1");
        assert_eq!(request.scopes(), ScopeSet::parse("write read"));
        assert!(request.check_response_type().is_ok());
    }

    #[test]
    fn test_missing_scope_is_empty_set() {
        let request = AuthorizationRequest {
            response_type: "code".to_string(),
            client_id: "c1".to_string(),
            ..Default::default()
        };
        assert!(request.scopes().is_empty());
    }

    #[test]
    fn test_unsupported_response_type() {
        let request = AuthorizationRequest {
            response_type: "token".to_string(),
            ..Default::default()
        };
        let err = request.check_response_type().unwrap_err();
        assert_eq!(err.oauth_error_code(), "unsupported_response_type");
    }

    #[test]
    fn test_response_redirect_url() {
        let response = AuthorizationResponse::new("abc".to_string(), Some("x y".to_string()));
        let url = response.to_redirect_url("https://app/cb").unwrap();
        assert_eq!(url, "https://app/cb?code=abc&state=x+y");

        let response = AuthorizationResponse::new("abc".to_string(), None);
        let url = response.to_redirect_url("https://app/cb?keep=1").unwrap();
        assert_eq!(url, "https://app/cb?keep=1&code=abc");
    }

    #[test]
    fn test_error_redirect_url() {
        let err = AuthError::invalid_scope("nothing granted");
        let response = AuthorizationErrorResponse::from_error(&err, Some("s1".to_string()));
        assert_eq!(response.error, "invalid_scope");

        let url = url::Url::parse(&response.to_redirect_url("https://app/cb").unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("error".to_string(), "invalid_scope".to_string()));
        assert_eq!(pairs[1].0, "error_description");
        assert_eq!(pairs[2], ("state".to_string(), "s1".to_string()));
    }
}
