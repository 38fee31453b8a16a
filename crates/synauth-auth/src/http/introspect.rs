//! Token introspection endpoint handler (RFC 7662).
//!
//! Requires client authentication. Inactive, expired, revoked and unknown
//! tokens all answer `{"active": false}`.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::oauth::authenticate_client;
use crate::token::TokenActionRequest;

use super::OAuthState;
use super::token::token_error_response;

/// Handler for `POST /oauth2/introspect`.
pub async fn introspect_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(form): Form<TokenActionRequest>,
) -> Response {
    let credentials =
        super::client_credentials(&headers, form.client_id.clone(), form.client_secret.clone());

    if let Err(err) = authenticate_client(state.engine.registry(), &credentials).await {
        tracing::debug!(error = %err, "Introspection: client authentication failed");
        return token_error_response(&err, credentials.used_basic());
    }

    if form.token.is_empty() {
        let err = AuthError::invalid_request("Missing token parameter");
        return token_error_response(&err, credentials.used_basic());
    }

    match state
        .engine
        .tokens()
        .introspect(&form.token, form.token_type_hint)
        .await
    {
        Ok(response) => {
            tracing::debug!(active = response.active, "Token introspection completed");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => token_error_response(&err, credentials.used_basic()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::state;
    use crate::token::IntrospectionResponse;
    use crate::types::ScopeSet;

    fn form(token: &str) -> TokenActionRequest {
        TokenActionRequest {
            token: token.to_string(),
            token_type_hint: None,
            client_id: Some("c1".to_string()),
            client_secret: Some("secret".to_string()),
        }
    }

    async fn body(response: Response) -> IntrospectionResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_active_access_token() {
        let state = state().await;
        let token = state
            .engine
            .tokens()
            .issue_access_token("alice", "c1", &ScopeSet::parse("read"))
            .unwrap();

        let response =
            introspect_handler(State(state), HeaderMap::new(), Form(form(&token.value))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body(response).await;
        assert!(body.active);
        assert_eq!(body.sub.as_deref(), Some("alice"));
        assert_eq!(body.scope.as_deref(), Some("read"));
    }

    #[tokio::test]
    async fn test_garbage_is_inactive() {
        let response =
            introspect_handler(State(state().await), HeaderMap::new(), Form(form("garbage"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, IntrospectionResponse::inactive());
    }
}
