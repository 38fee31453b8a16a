//! Error responses for the bearer middleware and JSON endpoints.
//!
//! `AuthError` renders as `{"error": ..., "error_description": ...}` with
//! the status from [`AuthError::http_status`]. 401 responses carry an
//! RFC 6750 `WWW-Authenticate: Bearer` challenge.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = error_json(&self);

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let challenge = bearer_challenge(self.oauth_error_code(), &self.to_string());
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// OAuth-style JSON body for `err`. Server-side failures carry no
/// description.
#[must_use]
pub fn error_json(err: &AuthError) -> serde_json::Value {
    if err.is_server_error() {
        json!({ "error": err.oauth_error_code() })
    } else {
        json!({
            "error": err.oauth_error_code(),
            "error_description": err.to_string(),
        })
    }
}

/// Builds a `WWW-Authenticate: Bearer` header value.
fn bearer_challenge(error: &str, description: &str) -> String {
    let description = description.replace('"', "'");
    format!(r#"Bearer realm="synauth", error="{error}", error_description="{description}""#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_has_bearer_challenge() {
        let response = AuthError::TokenExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.starts_with("Bearer "));
        assert!(challenge.contains(r#"error="invalid_token""#));
    }

    #[test]
    fn test_client_error_is_plain_json() {
        let response = AuthError::invalid_client("unknown client 'c9'").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_server_error_hides_description() {
        let body = error_json(&AuthError::internal("key ring poisoned"));
        assert_eq!(body["error"], "server_error");
        assert!(body.get("error_description").is_none());

        let response = AuthError::service_unavailable("store offline").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_challenge_escapes_quotes() {
        let challenge = bearer_challenge("invalid_token", r#"bad "kid""#);
        assert!(challenge.ends_with(r#"error_description="bad 'kid'""#));
    }
}
