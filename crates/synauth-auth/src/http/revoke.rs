//! Token revocation endpoint handler (RFC 7009).
//!
//! # Request Format
//!
//! ```text
//! POST /oauth2/revoke
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! token=<token_to_revoke>&token_type_hint=refresh_token
//! ```
//!
//! The endpoint answers 200 for every authenticated request, including
//! unknown tokens and access tokens, which are self-contained and expire on
//! their own. Only refresh tokens of the calling client are revoked.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::oauth::authenticate_client;
use crate::token::{TokenActionRequest, TokenTypeHint};

use super::OAuthState;
use super::token::token_error_response;

/// Handler for `POST /oauth2/revoke`.
pub async fn revoke_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(form): Form<TokenActionRequest>,
) -> Response {
    let credentials =
        super::client_credentials(&headers, form.client_id.clone(), form.client_secret.clone());

    let client = match authenticate_client(state.engine.registry(), &credentials).await {
        Ok(authenticated) => authenticated.client,
        Err(err) => {
            tracing::debug!(error = %err, "Revocation: client authentication failed");
            return token_error_response(&err, credentials.used_basic());
        }
    };

    if form.token.is_empty() || form.token_type_hint == Some(TokenTypeHint::AccessToken) {
        return StatusCode::OK.into_response();
    }

    match state
        .engine
        .tokens()
        .revoke_refresh_token(&form.token, &client.client_id)
        .await
    {
        Ok(revoked) => {
            tracing::debug!(client_id = %client.client_id, revoked, "Revocation request handled");
            StatusCode::OK.into_response()
        }
        Err(err) => {
            tracing::warn!(client_id = %client.client_id, error = %err, "Revocation failed");
            token_error_response(&err, credentials.used_basic())
        }
    }
}
