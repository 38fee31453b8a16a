//! Stores whose backend is down. Every call fails with `ServiceUnavailable`.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::code::AuthorizationCode;
use crate::types::PrincipalRecord;

use super::{AuthorizationCodeStorage, PrincipalStore};

fn down<T>() -> AuthResult<T> {
    Err(AuthError::service_unavailable("backend unreachable"))
}

pub struct UnavailablePrincipalStore;

#[async_trait]
impl PrincipalStore for UnavailablePrincipalStore {
    async fn load_principal(&self, _username: &str) -> AuthResult<Option<PrincipalRecord>> {
        down()
    }
}

pub struct UnavailableCodeStorage;

#[async_trait]
impl AuthorizationCodeStorage for UnavailableCodeStorage {
    async fn insert(&self, _code: AuthorizationCode) -> AuthResult<()> {
        down()
    }

    async fn find(&self, _code: &str) -> AuthResult<Option<AuthorizationCode>> {
        down()
    }

    async fn redeem(
        &self,
        _code: &str,
        _client_id: &str,
        _redirect_uri: &str,
        _now: OffsetDateTime,
    ) -> AuthResult<AuthorizationCode> {
        down()
    }

    async fn purge_expired(&self, _now: OffsetDateTime) -> AuthResult<u64> {
        down()
    }
}
