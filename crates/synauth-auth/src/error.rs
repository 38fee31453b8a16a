//! Authorization server error types.
//!
//! Every failure the core can produce is an [`AuthError`]. Each variant maps to
//! an RFC 6749 error code and an HTTP status so that handlers can surface it
//! as a protocol-level response without inspecting messages.

use std::fmt;

/// Errors that can occur while authorizing a request or issuing tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The resource owner could not be authenticated.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The client is unknown, inactive, or failed to authenticate.
    #[error("Invalid client: {message}")]
    InvalidClient { message: String },

    /// The redirect URI is not registered for the client.
    #[error("Invalid redirect URI: {message}")]
    InvalidRedirectUri { message: String },

    /// The requested scope is outside what the client may request.
    #[error("Invalid scope: {message}")]
    InvalidScope { message: String },

    /// The authorization code has passed its expiry.
    #[error("Authorization code expired")]
    CodeExpired,

    /// The authorization code was already redeemed.
    #[error("Authorization code already used")]
    CodeAlreadyUsed,

    /// The authorization code was issued to a different client.
    #[error("Authorization code was issued to a different client")]
    ClientMismatch,

    /// The redirect URI differs from the one used at authorization time.
    #[error("Redirect URI does not match the authorization request")]
    RedirectUriMismatch,

    /// The refresh token is unknown, revoked, expired, or bound to another client.
    #[error("Invalid refresh token: {message}")]
    InvalidRefreshToken { message: String },

    /// The access token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The token signature does not verify against any known key.
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// A backing store or collaborator failed. The caller may retry.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// The request is missing a parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The authorization grant is unknown or otherwise unusable.
    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    /// The token is malformed or carries unexpected claims.
    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    /// The authorization server does not support the requested response type.
    #[error("Unsupported response type: {response_type}")]
    UnsupportedResponseType { response_type: String },

    /// The authorization server does not support the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType { grant_type: String },

    /// The client is not allowed to use the requested grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient { message: String },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    #[must_use]
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_redirect_uri(message: impl Into<String>) -> Self {
        Self::InvalidRedirectUri {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_refresh_token(message: impl Into<String>) -> Self {
        Self::InvalidRefreshToken {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported_response_type(response_type: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            response_type: response_type.into(),
        }
    }

    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if the caller may retry the same request later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }

    /// Returns `true` if this error concerns an authorization code redemption.
    #[must_use]
    pub fn is_code_error(&self) -> bool {
        matches!(
            self,
            Self::CodeExpired
                | Self::CodeAlreadyUsed
                | Self::ClientMismatch
                | Self::RedirectUriMismatch
        )
    }

    /// Returns `true` if this is a token-related error.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. } | Self::TokenExpired | Self::SignatureInvalid
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationFailed { .. } | Self::InvalidClient { .. } => {
                ErrorCategory::Authentication
            }
            Self::InvalidScope { .. } | Self::UnauthorizedClient { .. } => {
                ErrorCategory::Authorization
            }
            Self::CodeExpired
            | Self::CodeAlreadyUsed
            | Self::ClientMismatch
            | Self::RedirectUriMismatch
            | Self::InvalidGrant { .. } => ErrorCategory::Grant,
            Self::InvalidRefreshToken { .. }
            | Self::TokenExpired
            | Self::SignatureInvalid
            | Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::InvalidRedirectUri { .. }
            | Self::InvalidRequest { .. }
            | Self::UnsupportedResponseType { .. }
            | Self::UnsupportedGrantType { .. } => ErrorCategory::Validation,
            Self::ServiceUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed { .. } => "access_denied",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidRedirectUri { .. } => "invalid_request",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::CodeExpired
            | Self::CodeAlreadyUsed
            | Self::ClientMismatch
            | Self::RedirectUriMismatch
            | Self::InvalidRefreshToken { .. }
            | Self::InvalidGrant { .. } => "invalid_grant",
            Self::TokenExpired | Self::SignatureInvalid | Self::InvalidToken { .. } => {
                "invalid_token"
            }
            Self::ServiceUnavailable { .. } => "temporarily_unavailable",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::Configuration { .. } | Self::Internal { .. } => "server_error",
        }
    }

    /// Returns the HTTP status code used when this error is sent to a client.
    ///
    /// Protocol errors are 400, bearer token errors are 401, backend
    /// failures are 503 and everything unexpected is 500.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthenticationFailed { .. }
            | Self::TokenExpired
            | Self::SignatureInvalid
            | Self::InvalidToken { .. } => 401,
            Self::ServiceUnavailable { .. } => 503,
            Self::Configuration { .. } | Self::Internal { .. } => 500,
            _ => 400,
        }
    }
}

/// Categories of authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Resource owner or client identity verification.
    Authentication,
    /// Permission checks (scopes, grant types).
    Authorization,
    /// Authorization code and grant redemption.
    Grant,
    /// Access and refresh token validation.
    Token,
    /// Request validation errors.
    Validation,
    /// Storage and collaborator failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Grant => write!(f, "grant"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
