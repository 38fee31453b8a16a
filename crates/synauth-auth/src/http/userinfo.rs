//! Userinfo endpoint.
//!
//! A bearer-protected resource describing who the access token speaks for.

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::middleware::{AuthContext, BearerAuth};

/// Userinfo response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfoResponse {
    /// Principal identifier.
    pub sub: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// Space-separated granted scopes.
    pub scope: String,
    /// Token expiry as a unix timestamp.
    pub exp: i64,
}

impl From<&AuthContext> for UserInfoResponse {
    fn from(context: &AuthContext) -> Self {
        Self {
            sub: context.subject().to_string(),
            client_id: context.client_id().to_string(),
            scope: context.scopes().to_string(),
            exp: context.expires_at(),
        }
    }
}

/// Handler for `GET /userinfo`.
pub async fn userinfo_handler(BearerAuth(auth): BearerAuth) -> Json<UserInfoResponse> {
    Json(UserInfoResponse::from(&auth))
}
