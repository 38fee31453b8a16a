//! Token issuance, validation and refresh.
//!
//! [`TokenIssuer`] mints self-contained signed access tokens and opaque
//! refresh tokens, validates access tokens against the key ring, and
//! exchanges refresh tokens for new access tokens.
//!
//! # Usage
//!
//! ```ignore
//! use synauth_auth::token::{TokenConfig, TokenIssuer};
//!
//! let issuer = TokenIssuer::new(jwt_service, refresh_storage, TokenConfig::default());
//!
//! let access = issuer.issue_access_token("alice", "c1", &scopes)?;
//! let validated = issuer.validate(&access.value)?;
//! ```

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::storage::RefreshTokenStorage;
use crate::token::introspection::{IntrospectionResponse, TokenTypeHint};
use crate::token::jwt::{
    AccessTokenClaims, JwtError, JwtService, Jwks, SigningAlgorithm, SigningKeyPair,
};
use crate::types::{RefreshToken, ScopeSet};

/// Configuration for the token issuer.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Access token lifetime.
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    pub refresh_token_lifetime: Duration,

    /// Whether to rotate refresh tokens on use.
    /// When true, the presented token is revoked and a new one is issued
    /// carrying the original expiry.
    pub rotate_refresh_tokens: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::hours(1),
            refresh_token_lifetime: Duration::days(30),
            rotate_refresh_tokens: true,
        }
    }
}

impl TokenConfig {
    /// Derives the issuer settings from the OAuth configuration section.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a lifetime does not fit a signed duration.
    pub fn from_oauth(oauth: &OAuthConfig) -> AuthResult<Self> {
        let convert = |name: &str, value: std::time::Duration| {
            Duration::try_from(value)
                .map_err(|e| AuthError::configuration(format!("{name} out of range: {e}")))
        };

        Ok(Self {
            access_token_lifetime: convert("access_token_lifetime", oauth.access_token_lifetime)?,
            refresh_token_lifetime: convert(
                "refresh_token_lifetime",
                oauth.refresh_token_lifetime,
            )?,
            rotate_refresh_tokens: oauth.refresh_token_rotation,
        })
    }

    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Sets the refresh token lifetime.
    #[must_use]
    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    /// Sets whether to rotate refresh tokens on use.
    #[must_use]
    pub fn with_rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }
}

/// A freshly minted access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Signed JWT.
    pub value: String,
    /// Subject of the token.
    pub principal_id: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// Granted scopes.
    pub scopes: ScopeSet,
    /// Issue instant, whole seconds.
    pub issued_at: OffsetDateTime,
    /// Expiry instant, whole seconds. Always after `issued_at`.
    pub expires_at: OffsetDateTime,
}

impl AccessToken {
    /// Remaining lifetime in seconds at issue time, for `expires_in`.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        u64::try_from((self.expires_at - self.issued_at).whole_seconds()).unwrap_or(0)
    }
}

/// A freshly minted refresh token: the plaintext value for the client and
/// the hashed record that was stored.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// Opaque value handed to the client. Never stored.
    pub value: String,
    /// Stored record.
    pub record: RefreshToken,
}

/// What a valid access token asserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    /// Subject of the token.
    pub principal_id: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// Granted scopes.
    pub scopes: ScopeSet,
    /// Expiry instant.
    pub expires_at: OffsetDateTime,
    /// JWT ID.
    pub jti: String,
}

/// Result of a refresh token exchange.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    /// New access token.
    pub access_token: AccessToken,
    /// Replacement refresh token when rotation is enabled.
    pub refresh_token: Option<IssuedRefreshToken>,
}

/// Mints, validates and refreshes tokens.
pub struct TokenIssuer {
    jwt: Arc<JwtService>,
    refresh_storage: Arc<dyn RefreshTokenStorage>,
    config: TokenConfig,
}

impl TokenIssuer {
    /// Creates a new token issuer.
    #[must_use]
    pub fn new(
        jwt: Arc<JwtService>,
        refresh_storage: Arc<dyn RefreshTokenStorage>,
        config: TokenConfig,
    ) -> Self {
        Self {
            jwt,
            refresh_storage,
            config,
        }
    }

    /// Mints a signed access token with the active key.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if signing fails.
    pub fn issue_access_token(
        &self,
        principal_id: &str,
        client_id: &str,
        scopes: &ScopeSet,
    ) -> AuthResult<AccessToken> {
        let issued_at = whole_seconds(OffsetDateTime::now_utc())?;
        let expires_at = issued_at + self.config.access_token_lifetime;

        let claims = AccessTokenClaims::builder(self.jwt.issuer(), principal_id, client_id)
            .validity(issued_at, expires_at)
            .scope(scopes.to_string())
            .build();

        let value = self
            .jwt
            .encode(&claims)
            .map_err(|e| AuthError::internal(format!("Failed to encode access token: {e}")))?;

        tracing::debug!(
            client_id = %client_id,
            principal = %principal_id,
            scope = %scopes,
            jti = %claims.jti,
            "Access token issued"
        );

        Ok(AccessToken {
            value,
            principal_id: principal_id.to_string(),
            client_id: client_id.to_string(),
            scopes: scopes.clone(),
            issued_at,
            expires_at,
        })
    }

    /// Mints an opaque refresh token and stores its hash.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the token cannot be stored.
    pub async fn issue_refresh_token(
        &self,
        principal_id: &str,
        client_id: &str,
        scopes: &ScopeSet,
    ) -> AuthResult<IssuedRefreshToken> {
        let issued_at = OffsetDateTime::now_utc();
        self.store_refresh_token(
            principal_id,
            client_id,
            scopes,
            issued_at,
            issued_at + self.config.refresh_token_lifetime,
        )
        .await
    }

    async fn store_refresh_token(
        &self,
        principal_id: &str,
        client_id: &str,
        scopes: &ScopeSet,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> AuthResult<IssuedRefreshToken> {
        let value = RefreshToken::generate_token();
        let record = RefreshToken {
            token_hash: RefreshToken::hash_token(&value),
            principal_id: principal_id.to_string(),
            client_id: client_id.to_string(),
            scopes: scopes.clone(),
            issued_at,
            expires_at,
            revoked: false,
        };

        self.refresh_storage.insert(record.clone()).await?;

        tracing::debug!(
            client_id = %client_id,
            principal = %principal_id,
            "Refresh token issued"
        );

        Ok(IssuedRefreshToken { value, record })
    }

    /// Validates an access token at the current time.
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::validate_at`].
    pub fn validate(&self, token: &str) -> AuthResult<ValidatedToken> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Validates an access token as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` when `now >= exp`, `SignatureInvalid` if the
    /// signature does not verify or the `kid` is unknown, and `InvalidToken`
    /// for malformed tokens or a foreign issuer.
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> AuthResult<ValidatedToken> {
        let claims = self
            .jwt
            .decode::<AccessTokenClaims>(token)
            .map_err(map_jwt_error)?
            .claims;

        if now.unix_timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
            .map_err(|e| AuthError::invalid_token(format!("exp out of range: {e}")))?;

        Ok(ValidatedToken {
            principal_id: claims.sub,
            client_id: claims.client_id,
            scopes: ScopeSet::parse(&claims.scope),
            expires_at,
            jti: claims.jti,
        })
    }

    /// Exchanges a refresh token for a new access token, keeping the
    /// originally granted scopes.
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::refresh_with_scope`].
    pub async fn refresh(&self, refresh_token: &str, client_id: &str) -> AuthResult<RefreshedTokens> {
        self.refresh_with_scope(refresh_token, client_id, None).await
    }

    /// Exchanges a refresh token for a new access token, optionally
    /// narrowing the scopes. Narrowing applies to the access token only;
    /// a replacement refresh token carries the original grant.
    ///
    /// With rotation enabled the presented token is revoked first; of two
    /// concurrent refreshes with the same token exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRefreshToken` if the token is unknown, revoked,
    /// expired or bound to another client, `InvalidScope` if the requested
    /// scopes exceed the original grant, and `ServiceUnavailable` on storage
    /// failure.
    pub async fn refresh_with_scope(
        &self,
        refresh_token: &str,
        client_id: &str,
        requested: Option<&ScopeSet>,
    ) -> AuthResult<RefreshedTokens> {
        let now = OffsetDateTime::now_utc();
        let token_hash = RefreshToken::hash_token(refresh_token);

        let stored = self
            .refresh_storage
            .find_by_hash(&token_hash)
            .await?
            .ok_or_else(|| AuthError::invalid_refresh_token("Unknown refresh token"))?;

        if stored.client_id != client_id {
            tracing::warn!(client_id = %client_id, "Refresh token presented by a different client");
            return Err(AuthError::invalid_refresh_token(
                "Refresh token was issued to a different client",
            ));
        }
        if stored.revoked {
            return Err(AuthError::invalid_refresh_token("Refresh token has been revoked"));
        }
        if stored.is_expired_at(now) {
            return Err(AuthError::invalid_refresh_token("Refresh token has expired"));
        }

        let scopes = match requested {
            Some(requested) if !requested.is_empty() => {
                if !requested.is_subset(&stored.scopes) {
                    return Err(AuthError::invalid_scope(
                        "Requested scope exceeds original grant",
                    ));
                }
                requested.clone()
            }
            _ => stored.scopes.clone(),
        };

        let refresh_token = if self.config.rotate_refresh_tokens {
            // Losing a concurrent race shows up as a failed flip
            if !self.refresh_storage.revoke(&token_hash).await? {
                return Err(AuthError::invalid_refresh_token("Refresh token has been revoked"));
            }
            let replacement = self
                .store_refresh_token(
                    &stored.principal_id,
                    client_id,
                    &stored.scopes,
                    now,
                    stored.expires_at,
                )
                .await?;
            Some(replacement)
        } else {
            None
        };

        let access_token = self.issue_access_token(&stored.principal_id, client_id, &scopes)?;

        tracing::info!(
            client_id = %client_id,
            principal = %stored.principal_id,
            rotated = refresh_token.is_some(),
            "Refresh token exchanged"
        );

        Ok(RefreshedTokens {
            access_token,
            refresh_token,
        })
    }

    /// Revokes a refresh token on behalf of `client_id`.
    ///
    /// Returns `true` if this call revoked it. Unknown tokens, tokens of
    /// other clients and already revoked tokens return `false`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` on storage failure.
    pub async fn revoke_refresh_token(&self, refresh_token: &str, client_id: &str) -> AuthResult<bool> {
        let token_hash = RefreshToken::hash_token(refresh_token);
        match self.refresh_storage.find_by_hash(&token_hash).await? {
            Some(stored) if stored.client_id == client_id => {
                let revoked = self.refresh_storage.revoke(&token_hash).await?;
                if revoked {
                    tracing::info!(client_id = %client_id, "Refresh token revoked");
                }
                Ok(revoked)
            }
            _ => Ok(false),
        }
    }

    /// Looks up the stored record for a refresh token value.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` on storage failure.
    pub async fn find_refresh_token(&self, refresh_token: &str) -> AuthResult<Option<RefreshToken>> {
        self.refresh_storage
            .find_by_hash(&RefreshToken::hash_token(refresh_token))
            .await
    }

    /// Describes a token per RFC 7662. Access tokens are checked first
    /// unless the hint says otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` on storage failure. Invalid tokens are
    /// reported as inactive, not as errors.
    pub async fn introspect(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<IntrospectionResponse> {
        if hint == Some(TokenTypeHint::RefreshToken) {
            if let Some(response) = self.introspect_refresh(token).await? {
                return Ok(response);
            }
            return Ok(self.introspect_access(token).unwrap_or_default());
        }

        if let Some(response) = self.introspect_access(token) {
            return Ok(response);
        }
        Ok(self.introspect_refresh(token).await?.unwrap_or_default())
    }

    fn introspect_access(&self, token: &str) -> Option<IntrospectionResponse> {
        let claims = self.jwt.decode::<AccessTokenClaims>(token).ok()?.claims;
        if OffsetDateTime::now_utc().unix_timestamp() >= claims.exp {
            return None;
        }
        Some(IntrospectionResponse::for_access_token(claims))
    }

    async fn introspect_refresh(&self, token: &str) -> AuthResult<Option<IntrospectionResponse>> {
        let Some(stored) = self.find_refresh_token(token).await? else {
            return Ok(None);
        };
        if !stored.is_active_at(OffsetDateTime::now_utc()) {
            return Ok(None);
        }
        Ok(Some(IntrospectionResponse::for_refresh_token(
            stored,
            self.jwt.issuer(),
        )))
    }

    /// Generates a new signing key with the ring's algorithm and makes it
    /// active. Tokens signed by retired keys stay valid until they expire.
    ///
    /// Returns the new `kid`. RSA generation is CPU bound; async callers
    /// should run this on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if key generation fails.
    pub fn rotate_key(&self) -> AuthResult<String> {
        let key = SigningKeyPair::generate(self.jwt.algorithm())
            .map_err(|e| AuthError::internal(format!("Failed to generate signing key: {e}")))?;
        Ok(self.install_key(key))
    }

    /// Installs a pre-generated key as the active signing key.
    ///
    /// The outgoing key verifies until the last access token it could have
    /// signed has expired.
    pub fn install_key(&self, key: SigningKeyPair) -> String {
        let needed_until = OffsetDateTime::now_utc() + self.config.access_token_lifetime;
        let kid = self.jwt.rotate(key, needed_until);
        tracing::info!(kid = %kid, retired_key_valid_until = ?needed_until, "Signing key rotated");
        kid
    }

    /// Removes expired and revoked refresh tokens.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` on storage failure.
    pub async fn purge_expired_refresh_tokens(&self) -> AuthResult<u64> {
        self.refresh_storage
            .purge_expired(OffsetDateTime::now_utc())
            .await
    }

    /// Public keys of every key in the ring.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.jwt.jwks()
    }

    /// Issuer identifier embedded in every token.
    #[must_use]
    pub fn issuer(&self) -> &str {
        self.jwt.issuer()
    }

    /// Algorithm of the active signing key.
    #[must_use]
    pub fn signing_algorithm(&self) -> SigningAlgorithm {
        self.jwt.algorithm()
    }

    /// Gets the issuer configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}

fn whole_seconds(instant: OffsetDateTime) -> AuthResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(instant.unix_timestamp())
        .map_err(|e| AuthError::internal(format!("clock out of range: {e}")))
}

fn map_jwt_error(err: JwtError) -> AuthError {
    match err {
        JwtError::Expired => AuthError::TokenExpired,
        e if e.is_signature_error() => AuthError::SignatureInvalid,
        e => AuthError::invalid_token(e.to_string()),
    }
}
