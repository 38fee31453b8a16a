//! Authorization endpoint handler.
//!
//! The principal authenticates with an HTTP Basic header; there is no login
//! page. Outcomes:
//!
//! - no or bad credentials: 401 with a Basic challenge
//! - unknown client or unregistered redirect URI: 400 JSON, never redirected
//! - any later failure: 302 to the redirect URI with `error`
//! - success: 302 to the redirect URI with `code` and `state`

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::middleware::error_json;
use crate::oauth::{AuthorizationRequest, parse_basic_auth};

use super::OAuthState;

/// `WWW-Authenticate` value sent when the principal must authenticate.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="synauth""#;

/// Handler for `GET /oauth2/authorize`.
pub async fn authorize_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Query(request): Query<AuthorizationRequest>,
) -> Response {
    let Some((username, password)) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth)
    else {
        return basic_challenge();
    };

    match state.engine.authorize(&request, &username, &password).await {
        Ok(grant) => match grant.redirect_url() {
            Ok(url) => found(url),
            Err(err) => err.into_response(),
        },
        Err(rejection) => {
            if matches!(rejection.error, AuthError::AuthenticationFailed { .. }) {
                return basic_challenge();
            }
            match rejection.redirect_url() {
                Some(url) => found(url),
                None => {
                    let status = StatusCode::from_u16(rejection.error.http_status())
                        .unwrap_or(StatusCode::BAD_REQUEST);
                    (status, axum::Json(error_json(&rejection.error))).into_response()
                }
            }
        }
    }
}

fn basic_challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, BASIC_CHALLENGE)],
    )
        .into_response()
}

fn found(location: String) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}
