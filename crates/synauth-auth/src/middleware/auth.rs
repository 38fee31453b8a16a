//! Bearer token authentication for protected resources.
//!
//! Two forms are provided over the same validation:
//!
//! - [`BearerAuth`]: an extractor for individual handlers
//! - [`require_bearer`]: a layer for whole routers, which stores the
//!   [`AuthContext`] in request extensions
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use synauth_auth::middleware::{AuthState, BearerAuth, require_bearer};
//!
//! async fn whoami(BearerAuth(auth): BearerAuth) -> String {
//!     auth.subject().to_string()
//! }
//!
//! let protected = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(middleware::from_fn_with_state(auth_state.clone(), require_bearer))
//!     .with_state(auth_state);
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::token::TokenIssuer;

use super::types::AuthContext;

// =============================================================================
// Auth State
// =============================================================================

/// State required for bearer token authentication.
#[derive(Clone)]
pub struct AuthState {
    /// Issuer that validates access tokens.
    pub tokens: Arc<TokenIssuer>,
}

impl AuthState {
    /// Creates a new auth state.
    #[must_use]
    pub fn new(tokens: Arc<TokenIssuer>) -> Self {
        Self { tokens }
    }

    /// Validates the bearer token in `headers`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the header is missing or not a bearer
    /// token, and any error from [`TokenIssuer::validate`].
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let token = bearer_token(headers)
            .ok_or_else(|| AuthError::invalid_token("Missing bearer token"))?;

        let token = self.tokens.validate(token).inspect_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
        })?;

        tracing::debug!(
            client_id = %token.client_id,
            principal = %token.principal_id,
            "Bearer token validated"
        );

        Ok(AuthContext { token })
    }
}

/// Extracts the token from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Extractor and Layer
// =============================================================================

/// Axum extractor that validates a bearer token.
///
/// Reuses the [`AuthContext`] placed by [`require_bearer`] when the route
/// is behind that layer.
pub struct BearerAuth(pub AuthContext);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AuthContext>() {
            return Ok(BearerAuth(context.clone()));
        }

        let auth_state = AuthState::from_ref(state);
        auth_state.authenticate(&parts.headers).map(BearerAuth)
    }
}

/// Middleware that rejects requests without a valid bearer token.
pub async fn require_bearer(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.authenticate(request.headers()) {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic YTpi"));
        assert_eq!(bearer_token(&headers), None);
    }
}
