//! Token endpoint handler.
//!
//! # Request Format
//!
//! ```text
//! POST /oauth2/token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! grant_type=authorization_code&code=...&redirect_uri=...
//! ```
//!
//! Responses carry `Cache-Control: no-store` and `Pragma: no-cache`.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::oauth::token::{TokenErrorResponse, TokenRequest, token_error_status};

use super::OAuthState;
use super::authorize::BASIC_CHALLENGE;

/// Handler for `POST /oauth2/token`.
pub async fn token_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    debug!(
        grant_type = %request.grant_type,
        client_id = ?request.client_id,
        "Processing token request"
    );

    let credentials = super::client_credentials(
        &headers,
        request.client_id.clone(),
        request.client_secret.clone(),
    );

    match state.engine.token(&request, &credentials).await {
        Ok(response) => {
            info!(
                client_id = ?credentials.claimed_client_id(),
                grant_type = %request.grant_type,
                "Token issued"
            );
            (StatusCode::OK, no_store_headers(), Json(response)).into_response()
        }
        Err(err) => {
            warn!(
                client_id = ?credentials.claimed_client_id(),
                grant_type = %request.grant_type,
                error = %err,
                category = %err.category(),
                "Token request failed"
            );
            token_error_response(&err, credentials.used_basic())
        }
    }
}

/// Builds a token endpoint error response.
///
/// Shared by the revocation and introspection endpoints, which fail client
/// authentication the same way.
pub(crate) fn token_error_response(err: &AuthError, used_basic_auth: bool) -> Response {
    let status = StatusCode::from_u16(token_error_status(err, used_basic_auth))
        .unwrap_or(StatusCode::BAD_REQUEST);

    let mut headers = no_store_headers();
    if status == StatusCode::UNAUTHORIZED {
        headers.insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(BASIC_CHALLENGE),
        );
    }

    (status, headers, Json(TokenErrorResponse::from_error(err))).into_response()
}

fn no_store_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}
