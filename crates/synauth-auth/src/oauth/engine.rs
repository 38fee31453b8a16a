//! Authorization engine.
//!
//! Drives one authorization request through
//! `Started → Authenticated → ClientValidated → CodeIssued → Exchanged → Completed`,
//! with `Rejected` reachable from every non-terminal state. Each request
//! owns its [`AuthorizationFlow`]; the only shared state is the registry and
//! the stores behind the collaborators.
//!
//! The code exchange arrives as a separate request, so its flow resumes at
//! `CodeIssued`: the stored code is the record of everything before.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::authorize::{AuthorizationErrorResponse, AuthorizationRequest, AuthorizationResponse};
use crate::oauth::client_auth::{AuthenticatedClient, ClientCredentials, authenticate_client};
use crate::oauth::code::{AuthorizationCode, AuthorizationCodeManager};
use crate::oauth::password::verify_credential_async;
use crate::oauth::registry::ClientRegistry;
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::storage::PrincipalStore;
use crate::token::{AccessToken, IssuedRefreshToken, TokenIssuer};
use crate::types::{GrantType, Principal, RegisteredClient, ScopeSet};

// =============================================================================
// Flow state
// =============================================================================

/// State of a single authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// Request received.
    Started,
    /// The principal proved its credentials.
    Authenticated,
    /// Client, redirect URI and scopes checked.
    ClientValidated,
    /// An authorization code was issued.
    CodeIssued,
    /// The code was redeemed and tokens minted.
    Exchanged,
    /// Tokens were handed to the client.
    Completed,
    /// The request failed. Terminal.
    Rejected,
}

impl FlowState {
    /// Returns the state name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Authenticated => "authenticated",
            Self::ClientValidated => "client_validated",
            Self::CodeIssued => "code_issued",
            Self::Exchanged => "exchanged",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// Returns `true` for `Completed` and `Rejected`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Returns `true` if `next` may follow `self`.
    #[must_use]
    pub fn can_transition_to(&self, next: FlowState) -> bool {
        use FlowState::*;
        match (self, next) {
            (from, Rejected) => !from.is_terminal(),
            (Started, Authenticated)
            | (Authenticated, ClientValidated)
            | (ClientValidated, CodeIssued)
            | (CodeIssued, Exchanged)
            | (Exchanged, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one authorization request's progress.
#[derive(Debug, Clone)]
pub struct AuthorizationFlow {
    id: Uuid,
    client_id: String,
    history: Vec<FlowState>,
    rejection: Option<AuthError>,
}

impl AuthorizationFlow {
    /// Starts a new flow for `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::starting_at(client_id, FlowState::Started)
    }

    /// Resumes a flow at the code exchange.
    #[must_use]
    pub fn for_exchange(client_id: impl Into<String>) -> Self {
        Self::starting_at(client_id, FlowState::CodeIssued)
    }

    fn starting_at(client_id: impl Into<String>, state: FlowState) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id: client_id.into(),
            history: vec![state],
            rejection: None,
        }
    }

    /// Flow identifier, used as a log field.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Client the flow belongs to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.history.last().copied().unwrap_or(FlowState::Started)
    }

    /// Every state the flow has been in, oldest first.
    #[must_use]
    pub fn history(&self) -> &[FlowState] {
        &self.history
    }

    /// Why the flow was rejected, if it was.
    #[must_use]
    pub fn rejection(&self) -> Option<&AuthError> {
        self.rejection.as_ref()
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if `next` may not follow the current state.
    pub fn transition(&mut self, next: FlowState) -> AuthResult<()> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(AuthError::internal(format!(
                "illegal authorization flow transition {current} -> {next}"
            )));
        }

        tracing::debug!(
            flow_id = %self.id,
            client_id = %self.client_id,
            from = %current,
            state = %next,
            "Authorization flow transition"
        );
        self.history.push(next);
        Ok(())
    }

    /// Moves to `Rejected` and hands `err` back for propagation.
    ///
    /// A flow that is already terminal keeps its state; the error is still
    /// returned.
    pub fn reject(&mut self, err: AuthError) -> AuthError {
        if !self.state().is_terminal() {
            tracing::warn!(
                flow_id = %self.id,
                client_id = %self.client_id,
                from = %self.state(),
                error = %err,
                category = %err.category(),
                "Authorization flow rejected"
            );
            self.history.push(FlowState::Rejected);
            self.rejection = Some(err.clone());
        }
        err
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// A code issued for an authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    /// The issued code.
    pub code: AuthorizationCode,
    /// Echoed state parameter.
    pub state: Option<String>,
    /// Completed flow record.
    pub flow: AuthorizationFlow,
}

impl AuthorizationGrant {
    /// Redirect URL carrying `code` and `state`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the stored redirect URI no longer parses.
    pub fn redirect_url(&self) -> AuthResult<String> {
        AuthorizationResponse::new(self.code.code.clone(), self.state.clone())
            .to_redirect_url(&self.code.redirect_uri)
            .map_err(|e| AuthError::internal(format!("invalid redirect URI: {e}")))
    }
}

/// A failed authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationRejection {
    /// Why the request failed.
    pub error: AuthError,
    /// Where the error may be redirected. `None` until the client and its
    /// redirect URI have been verified.
    pub redirect_uri: Option<String>,
    /// Echoed state parameter.
    pub state: Option<String>,
    /// Rejected flow record.
    pub flow: AuthorizationFlow,
}

impl AuthorizationRejection {
    /// Redirect URL carrying `error`, `error_description` and `state`, if
    /// the redirect URI is trusted.
    #[must_use]
    pub fn redirect_url(&self) -> Option<String> {
        let redirect_uri = self.redirect_uri.as_deref()?;
        AuthorizationErrorResponse::from_error(&self.error, self.state.clone())
            .to_redirect_url(redirect_uri)
            .ok()
    }
}

/// Tokens minted by a completed exchange.
#[derive(Debug, Clone)]
pub struct ExchangedTokens {
    /// New access token.
    pub access_token: AccessToken,
    /// Refresh token, when the client may use the refresh_token grant.
    pub refresh_token: Option<IssuedRefreshToken>,
    /// Completed flow record.
    pub flow: AuthorizationFlow,
}

impl ExchangedTokens {
    /// Token endpoint response body.
    #[must_use]
    pub fn to_response(&self) -> TokenResponse {
        TokenResponse::new(
            self.access_token.value.clone(),
            self.access_token.expires_in(),
            self.access_token.scopes.to_string(),
        )
        .with_refresh_token(self.refresh_token.as_ref().map(|t| t.value.clone()))
    }
}

/// A client request that passed every check up to code issuance.
#[derive(Debug, Clone)]
struct ValidatedRequest {
    client: RegisteredClient,
    redirect_uri: String,
    scopes: ScopeSet,
}

// =============================================================================
// Engine
// =============================================================================

/// Orchestrates the authorization code and token exchange flows.
pub struct AuthorizationEngine {
    registry: Arc<ClientRegistry>,
    principals: Arc<dyn PrincipalStore>,
    codes: Arc<AuthorizationCodeManager>,
    tokens: Arc<TokenIssuer>,
}

impl AuthorizationEngine {
    /// Creates an engine over its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry>,
        principals: Arc<dyn PrincipalStore>,
        codes: Arc<AuthorizationCodeManager>,
        tokens: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            registry,
            principals,
            codes,
            tokens,
        }
    }

    /// Client registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Authorization code manager.
    #[must_use]
    pub fn codes(&self) -> &Arc<AuthorizationCodeManager> {
        &self.codes
    }

    /// Token issuer.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenIssuer> {
        &self.tokens
    }

    /// Runs an authorization request from `Started` to `CodeIssued`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthorizationRejection`] carrying the failure and, once
    /// the client and redirect URI are trusted, where to redirect it.
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
        username: &str,
        password: &str,
    ) -> Result<AuthorizationGrant, Box<AuthorizationRejection>> {
        let mut flow = AuthorizationFlow::new(&request.client_id);
        let mut trusted_redirect: Option<String> = None;

        let result = self
            .run_authorization(&mut flow, &mut trusted_redirect, request, username, password)
            .await;

        match result {
            Ok(code) => Ok(AuthorizationGrant {
                code,
                state: request.state.clone(),
                flow,
            }),
            Err(err) => {
                let error = flow.reject(err);
                Err(Box::new(AuthorizationRejection {
                    error,
                    redirect_uri: trusted_redirect,
                    state: request.state.clone(),
                    flow,
                }))
            }
        }
    }

    async fn run_authorization(
        &self,
        flow: &mut AuthorizationFlow,
        trusted_redirect: &mut Option<String>,
        request: &AuthorizationRequest,
        username: &str,
        password: &str,
    ) -> AuthResult<AuthorizationCode> {
        let principal = self.authenticate(username, password).await?;
        flow.transition(FlowState::Authenticated)?;

        let validated = self.validate_client(request, trusted_redirect).await?;
        flow.transition(FlowState::ClientValidated)?;

        let code = self
            .codes
            .issue(
                &validated.client.client_id,
                &principal.id,
                &validated.scopes,
                &validated.redirect_uri,
            )
            .await?;
        flow.transition(FlowState::CodeIssued)?;

        tracing::info!(
            flow_id = %flow.id(),
            client_id = %validated.client.client_id,
            principal = %principal.id,
            scope = %validated.scopes,
            "Authorization code issued"
        );

        Ok(code)
    }

    /// Authenticates a principal through the [`PrincipalStore`].
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` for unknown users and wrong passwords,
    /// and passes store failures through.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<Principal> {
        let record = self
            .principals
            .load_principal(username)
            .await?
            .ok_or_else(|| AuthError::authentication_failed("Bad credentials"))?;

        if !verify_credential_async(&record.credential_hash, password).await? {
            return Err(AuthError::authentication_failed("Bad credentials"));
        }

        Ok(record.principal())
    }

    async fn validate_client(
        &self,
        request: &AuthorizationRequest,
        trusted_redirect: &mut Option<String>,
    ) -> AuthResult<ValidatedRequest> {
        let client = self.registry.lookup(&request.client_id).await?;

        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::invalid_redirect_uri("redirect_uri is required"))?;
        if !client.is_redirect_uri_allowed(redirect_uri) {
            return Err(AuthError::invalid_redirect_uri(format!(
                "'{redirect_uri}' is not registered for this client"
            )));
        }
        *trusted_redirect = Some(redirect_uri.to_string());

        request.check_response_type()?;

        if !client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(AuthError::unauthorized_client(
                "Client may not use the authorization_code grant",
            ));
        }

        let scopes = self.registry.grant_scopes(&client, &request.scopes())?;

        Ok(ValidatedRequest {
            client,
            redirect_uri: redirect_uri.to_string(),
            scopes,
        })
    }

    /// Redeems a code and mints tokens, moving the flow from `CodeIssued`
    /// through `Exchanged` to `Completed`.
    ///
    /// # Errors
    ///
    /// Returns `UnauthorizedClient` if the client may not use the
    /// authorization_code grant, any redemption error from the
    /// [`AuthorizationCodeManager`], and token issuance failures.
    pub async fn exchange_code(
        &self,
        client: &RegisteredClient,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<ExchangedTokens> {
        let mut flow = AuthorizationFlow::for_exchange(&client.client_id);
        match self.run_exchange(&mut flow, client, code, redirect_uri).await {
            Ok((access_token, refresh_token)) => Ok(ExchangedTokens {
                access_token,
                refresh_token,
                flow,
            }),
            Err(err) => Err(flow.reject(err)),
        }
    }

    async fn run_exchange(
        &self,
        flow: &mut AuthorizationFlow,
        client: &RegisteredClient,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<(AccessToken, Option<IssuedRefreshToken>)> {
        if !client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(AuthError::unauthorized_client(
                "Client may not use the authorization_code grant",
            ));
        }

        let grant = self
            .codes
            .redeem(code, &client.client_id, redirect_uri)
            .await?;

        let access_token =
            self.tokens
                .issue_access_token(&grant.principal_id, &client.client_id, &grant.scopes)?;
        let refresh_token = if client.is_grant_type_allowed(GrantType::RefreshToken) {
            Some(
                self.tokens
                    .issue_refresh_token(&grant.principal_id, &client.client_id, &grant.scopes)
                    .await?,
            )
        } else {
            None
        };
        flow.transition(FlowState::Exchanged)?;

        tracing::info!(
            flow_id = %flow.id(),
            client_id = %client.client_id,
            principal = %grant.principal_id,
            scope = %grant.scopes,
            refresh = refresh_token.is_some(),
            "Authorization code exchanged"
        );

        flow.transition(FlowState::Completed)?;
        Ok((access_token, refresh_token))
    }

    /// Exchanges a refresh token on behalf of an authenticated client.
    ///
    /// # Errors
    ///
    /// Returns `UnauthorizedClient` if the client may not use the
    /// refresh_token grant, and any error from
    /// [`TokenIssuer::refresh_with_scope`].
    pub async fn refresh(
        &self,
        client: &RegisteredClient,
        refresh_token: &str,
        requested: Option<&ScopeSet>,
    ) -> AuthResult<TokenResponse> {
        if !client.is_grant_type_allowed(GrantType::RefreshToken) {
            return Err(AuthError::unauthorized_client(
                "Client may not use the refresh_token grant",
            ));
        }

        let refreshed = self
            .tokens
            .refresh_with_scope(refresh_token, &client.client_id, requested)
            .await?;

        Ok(TokenResponse::new(
            refreshed.access_token.value.clone(),
            refreshed.access_token.expires_in(),
            refreshed.access_token.scopes.to_string(),
        )
        .with_refresh_token(refreshed.refresh_token.map(|t| t.value)))
    }

    /// Authenticates the client and dispatches a token request by grant type.
    ///
    /// # Errors
    ///
    /// Returns client authentication errors, `InvalidRequest` for missing
    /// parameters, `UnsupportedGrantType` for anything but
    /// `authorization_code` and `refresh_token`, and the errors of
    /// [`AuthorizationEngine::exchange_code`] and
    /// [`AuthorizationEngine::refresh`].
    pub async fn token(
        &self,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<TokenResponse> {
        let grant_type: GrantType = match request.grant_type.as_str() {
            "" => return Err(AuthError::invalid_request("Missing grant_type parameter")),
            other => other
                .parse()
                .map_err(|_| AuthError::unsupported_grant_type(other))?,
        };

        let AuthenticatedClient { client, .. } =
            authenticate_client(&self.registry, credentials).await?;

        match grant_type {
            GrantType::AuthorizationCode => {
                let code = request
                    .code
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_request("Missing code parameter"))?;
                let redirect_uri = request
                    .redirect_uri
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_request("Missing redirect_uri parameter"))?;

                Ok(self
                    .exchange_code(&client, code, redirect_uri)
                    .await?
                    .to_response())
            }
            GrantType::RefreshToken => {
                let refresh_token = request
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_request("Missing refresh_token parameter"))?;
                let requested = request.scope.as_deref().map(ScopeSet::parse);

                self.refresh(&client, refresh_token, requested.as_ref()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::storage::{
        InMemoryClientStorage, InMemoryCodeStorage, InMemoryPrincipalStore,
        InMemoryRefreshTokenStorage,
    };
    use crate::oauth::password::hash_credential;
    use crate::storage::unavailable::UnavailablePrincipalStore;
    use crate::token::{JwtService, SigningKeyPair, TokenConfig};
    use crate::types::PrincipalRecord;

    const REDIRECT: &str = "https://app/cb";

    async fn engine(client: RegisteredClient) -> AuthorizationEngine {
        let principals = InMemoryPrincipalStore::new();
        principals.insert(
            "alice",
            PrincipalRecord::new("alice", "{noop}pw").with_authority("ROLE_USER"),
        );
        engine_with(client, Arc::new(principals)).await
    }

    async fn engine_with(
        client: RegisteredClient,
        principals: Arc<dyn PrincipalStore>,
    ) -> AuthorizationEngine {
        let registry = Arc::new(ClientRegistry::new(
            Arc::new(InMemoryClientStorage::new()),
            false,
        ));
        registry.register(client).await.unwrap();

        let codes = AuthorizationCodeManager::new(
            Arc::new(InMemoryCodeStorage::new()),
            Duration::from_secs(300),
        );
        let jwt = JwtService::new(
            SigningKeyPair::generate_ec().unwrap(),
            "http://localhost:9050",
            3,
        );
        let tokens = TokenIssuer::new(
            Arc::new(jwt),
            Arc::new(InMemoryRefreshTokenStorage::new()),
            TokenConfig::default(),
        );

        AuthorizationEngine::new(registry, principals, Arc::new(codes), Arc::new(tokens))
    }

    fn c1() -> RegisteredClient {
        RegisteredClient::new("c1", "{noop}secret")
            .with_redirect_uri(REDIRECT)
            .with_scopes(ScopeSet::parse("read"))
    }

    fn request(scope: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            response_type: "code".to_string(),
            client_id: "c1".to_string(),
            redirect_uri: Some(REDIRECT.to_string()),
            scope: Some(scope.to_string()),
            state: Some("xyz".to_string()),
        }
    }

    #[test]
    fn test_flow_transitions() {
        use FlowState::*;

        assert!(Started.can_transition_to(Authenticated));
        assert!(CodeIssued.can_transition_to(Exchanged));
        assert!(Authenticated.can_transition_to(Rejected));
        assert!(!Started.can_transition_to(CodeIssued));
        assert!(!Completed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Started));
    }

    #[test]
    fn test_illegal_transition_is_internal_error() {
        let mut flow = AuthorizationFlow::new("c1");
        let err = flow.transition(FlowState::Exchanged).unwrap_err();
        assert!(matches!(err, AuthError::Internal { .. }));
        assert_eq!(flow.state(), FlowState::Started);
    }

    #[test]
    fn test_reject_is_terminal() {
        let mut flow = AuthorizationFlow::new("c1");
        flow.reject(AuthError::authentication_failed("nope"));
        assert_eq!(flow.state(), FlowState::Rejected);
        assert!(flow.transition(FlowState::Authenticated).is_err());

        flow.reject(AuthError::internal("again"));
        assert_eq!(flow.history(), &[FlowState::Started, FlowState::Rejected]);
        assert!(matches!(
            flow.rejection(),
            Some(AuthError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_authorize_issues_code_for_granted_scopes() {
        let engine = engine(c1()).await;
        let grant = engine.authorize(&request("read write"), "alice", "pw").await.unwrap();

        assert_eq!(grant.code.scopes, ScopeSet::parse("read"));
        assert_eq!(grant.code.principal_id, "alice");
        assert_eq!(
            grant.flow.history(),
            &[
                FlowState::Started,
                FlowState::Authenticated,
                FlowState::ClientValidated,
                FlowState::CodeIssued
            ]
        );

        let url = grant.redirect_url().unwrap();
        assert!(url.starts_with("https://app/cb?code="));
        assert!(url.ends_with("&state=xyz"));
    }

    #[tokio::test]
    async fn test_bad_credentials_rejected_before_client_check() {
        let engine = engine(c1()).await;
        let rejection = engine
            .authorize(&request("read"), "alice", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(rejection.error, AuthError::AuthenticationFailed { .. }));
        assert!(rejection.redirect_uri.is_none());
        assert_eq!(rejection.flow.history(), &[FlowState::Started, FlowState::Rejected]);

        let rejection = engine
            .authorize(&request("read"), "bob", "pw")
            .await
            .unwrap_err();
        assert!(matches!(rejection.error, AuthError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn test_principal_store_outage_is_not_bad_credentials() {
        let engine = engine_with(c1(), Arc::new(UnavailablePrincipalStore)).await;
        let rejection = engine
            .authorize(&request("read"), "alice", "pw")
            .await
            .unwrap_err();

        assert!(matches!(rejection.error, AuthError::ServiceUnavailable { .. }));
        assert!(rejection.redirect_uri.is_none());
        assert_eq!(rejection.flow.state(), FlowState::Rejected);
    }

    #[tokio::test]
    async fn test_argon2_principal_authenticates() {
        let principals = InMemoryPrincipalStore::new();
        principals.insert(
            "carol",
            PrincipalRecord::new("carol", hash_credential("hunter2").unwrap()),
        );
        let engine = engine_with(c1(), Arc::new(principals)).await;

        assert_eq!(engine.authenticate("carol", "hunter2").await.unwrap().id, "carol");
        assert!(matches!(
            engine.authenticate("carol", "hunter3").await.unwrap_err(),
            AuthError::AuthenticationFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_untrusted_redirect_is_never_used() {
        let engine = engine(c1()).await;

        let mut bad_redirect = request("read");
        bad_redirect.redirect_uri = Some("https://evil/cb".to_string());
        let rejection = engine.authorize(&bad_redirect, "alice", "pw").await.unwrap_err();
        assert!(matches!(rejection.error, AuthError::InvalidRedirectUri { .. }));
        assert!(rejection.redirect_url().is_none());

        let mut unknown_client = request("read");
        unknown_client.client_id = "c9".to_string();
        let rejection = engine.authorize(&unknown_client, "alice", "pw").await.unwrap_err();
        assert!(matches!(rejection.error, AuthError::InvalidClient { .. }));
        assert!(rejection.redirect_url().is_none());
    }

    #[tokio::test]
    async fn test_scope_error_redirects_with_state() {
        let engine = engine(c1()).await;
        let rejection = engine
            .authorize(&request("admin"), "alice", "pw")
            .await
            .unwrap_err();

        assert!(matches!(rejection.error, AuthError::InvalidScope { .. }));
        let url = rejection.redirect_url().unwrap();
        assert!(url.starts_with("https://app/cb?error=invalid_scope"));
        assert!(url.ends_with("state=xyz"));
    }

    #[tokio::test]
    async fn test_exchange_and_replay() {
        let engine = engine(c1()).await;
        let client = c1();
        let grant = engine.authorize(&request("read write"), "alice", "pw").await.unwrap();

        let tokens = engine
            .exchange_code(&client, &grant.code.code, REDIRECT)
            .await
            .unwrap();
        assert_eq!(tokens.access_token.scopes, ScopeSet::parse("read"));
        assert!(tokens.refresh_token.is_none());
        assert_eq!(tokens.flow.state(), FlowState::Completed);

        let err = engine
            .exchange_code(&client, &grant.code.code, REDIRECT)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::CodeAlreadyUsed);
    }

    #[tokio::test]
    async fn test_refresh_token_only_for_refresh_clients() {
        let client = c1().with_grant_type(GrantType::RefreshToken);
        let engine = engine(client.clone()).await;
        let grant = engine.authorize(&request("read"), "alice", "pw").await.unwrap();

        let tokens = engine
            .exchange_code(&client, &grant.code.code, REDIRECT)
            .await
            .unwrap();
        let refresh = tokens.refresh_token.unwrap();

        let response = engine.refresh(&client, &refresh.value, None).await.unwrap();
        assert_eq!(response.scope, "read");
        assert!(response.refresh_token.is_some());

        let err = engine.refresh(&c1(), &refresh.value, None).await.unwrap_err();
        assert!(matches!(err, AuthError::UnauthorizedClient { .. }));
    }

    #[tokio::test]
    async fn test_token_dispatch() {
        let engine = engine(c1()).await;
        let grant = engine.authorize(&request("read"), "alice", "pw").await.unwrap();
        let credentials = ClientCredentials {
            basic: Some(("c1".to_string(), "secret".to_string())),
            ..Default::default()
        };

        let unsupported = TokenRequest {
            grant_type: "password".to_string(),
            ..Default::default()
        };
        let err = engine.token(&unsupported, &credentials).await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedGrantType { .. }));

        let missing_code = TokenRequest {
            grant_type: "authorization_code".to_string(),
            ..Default::default()
        };
        let err = engine.token(&missing_code, &credentials).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let exchange = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some(grant.code.code.clone()),
            redirect_uri: Some(REDIRECT.to_string()),
            ..Default::default()
        };
        let response = engine.token(&exchange, &credentials).await.unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.scope, "read");

        let validated = engine.tokens().validate(&response.access_token).unwrap();
        assert_eq!(validated.principal_id, "alice");
    }
}
