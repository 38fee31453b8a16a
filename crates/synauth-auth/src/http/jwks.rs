//! JWK set endpoint handler.
//!
//! Publishes every key in the ring, active and retired, so that tokens
//! signed before a rotation keep verifying downstream.

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use super::OAuthState;

/// Handler for `GET /oauth2/jwks`.
pub async fn jwks_handler(State(state): State<OAuthState>) -> impl IntoResponse {
    let jwks = state.engine.tokens().jwks();
    (
        [(header::CACHE_CONTROL, "public, max-age=300")],
        Json(jwks),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::state;
    use crate::token::{Jwks, SigningKeyPair};

    async fn fetch(state: OAuthState) -> Jwks {
        let response = jwks_handler(State(state)).await.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_jwks_lists_retired_keys() {
        let state = state().await;
        let first = fetch(state.clone()).await;
        assert_eq!(first.keys.len(), 1);

        state
            .engine
            .tokens()
            .install_key(SigningKeyPair::generate_ec().unwrap());

        let second = fetch(state).await;
        assert_eq!(second.keys.len(), 2);
        assert!(second.keys.iter().any(|k| k.kid == first.keys[0].kid));
    }
}
