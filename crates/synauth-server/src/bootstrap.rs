//! Explicit construction of the authorization server.
//!
//! Builds every collaborator from configuration and hands them to the
//! [`AuthorizationEngine`] by constructor.

use std::sync::Arc;

use synauth_auth::storage::{
    InMemoryClientStorage, InMemoryCodeStorage, InMemoryPrincipalStore,
    InMemoryRefreshTokenStorage,
};
use synauth_auth::{
    AuthorizationCodeManager, AuthorizationEngine, ClientRegistry, JwtService, PrincipalRecord,
    SigningKeyPair, TokenConfig, TokenIssuer,
};

use crate::config::{AppConfig, BootstrapConfig};

/// Builds the engine and its collaborators from `cfg`.
///
/// # Errors
///
/// Fails on invalid signing settings, key generation failure or an invalid
/// bootstrap client.
pub async fn build_engine(cfg: &AppConfig) -> anyhow::Result<Arc<AuthorizationEngine>> {
    let auth = &cfg.auth;

    let algorithm = auth.signing.algorithm()?;
    // RSA key generation takes long enough to stall a runtime worker.
    let signing_key =
        tokio::task::spawn_blocking(move || SigningKeyPair::generate(algorithm)).await??;
    tracing::info!(kid = %signing_key.kid, algorithm = %algorithm, "Signing key generated");

    let jwt = JwtService::new(
        signing_key,
        auth.issuer.clone(),
        auth.signing.keys_to_keep as usize,
    );
    let tokens = TokenIssuer::new(
        Arc::new(jwt),
        Arc::new(InMemoryRefreshTokenStorage::new()),
        TokenConfig::from_oauth(&auth.oauth)?,
    );

    let registry = ClientRegistry::new(
        Arc::new(InMemoryClientStorage::new()),
        auth.oauth.strict_scopes,
    );
    register_clients(&registry, &cfg.bootstrap).await?;

    let principals = load_principals(&cfg.bootstrap);

    let codes = AuthorizationCodeManager::new(
        Arc::new(InMemoryCodeStorage::new()),
        auth.oauth.authorization_code_lifetime,
    );

    tracing::info!(
        issuer = %auth.issuer,
        clients = cfg.bootstrap.clients.len(),
        users = principals.len(),
        "Authorization server bootstrapped"
    );

    Ok(Arc::new(AuthorizationEngine::new(
        Arc::new(registry),
        Arc::new(principals),
        Arc::new(codes),
        Arc::new(tokens),
    )))
}

async fn register_clients(
    registry: &ClientRegistry,
    bootstrap: &BootstrapConfig,
) -> anyhow::Result<()> {
    for definition in &bootstrap.clients {
        let client = definition.to_registered().map_err(anyhow::Error::msg)?;
        registry.register(client).await?;
        tracing::debug!(client_id = %definition.client_id, "Client registered");
    }
    Ok(())
}

fn load_principals(bootstrap: &BootstrapConfig) -> InMemoryPrincipalStore {
    let store = InMemoryPrincipalStore::new();
    for user in &bootstrap.users {
        let record = user
            .authorities
            .iter()
            .fold(PrincipalRecord::new(&user.username, &user.password), |record, authority| {
                record.with_authority(authority)
            });
        store.insert(&user.username, record);
    }
    store
}
