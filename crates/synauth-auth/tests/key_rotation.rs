use std::sync::Arc;

use synauth_auth::storage::InMemoryRefreshTokenStorage;
use synauth_auth::{
    AuthError, JwtService, ScopeSet, SigningAlgorithm, SigningKeyPair, TokenConfig, TokenIssuer,
};
use time::Duration;

fn issuer_with(keys_to_keep: usize, config: TokenConfig) -> TokenIssuer {
    let jwt = JwtService::new(
        SigningKeyPair::generate_ec().unwrap(),
        "http://localhost:9050",
        keys_to_keep,
    );
    TokenIssuer::new(
        Arc::new(jwt),
        Arc::new(InMemoryRefreshTokenStorage::new()),
        config,
    )
}

fn issuer(keys_to_keep: usize) -> TokenIssuer {
    issuer_with(keys_to_keep, TokenConfig::default())
}

#[test]
fn token_signed_before_rotation_stays_valid_until_expiry() {
    let issuer = issuer(3);
    let scopes = ScopeSet::parse("read");
    let before = issuer.issue_access_token("alice", "c1", &scopes).unwrap();

    issuer.rotate_key().unwrap();

    let validated = issuer.validate(&before.value).unwrap();
    assert_eq!(validated.principal_id, "alice");
    assert_eq!(validated.scopes, scopes);

    let err = issuer
        .validate_at(&before.value, before.expires_at)
        .unwrap_err();
    assert_eq!(err, AuthError::TokenExpired);

    let after = issuer.issue_access_token("alice", "c1", &scopes).unwrap();
    assert!(issuer.validate(&after.value).is_ok());
    assert_eq!(issuer.jwks().keys.len(), 2);
}

#[test]
fn frequent_rotation_keeps_live_tokens_valid() {
    let issuer = issuer(1);
    let token = issuer
        .issue_access_token("alice", "c1", &ScopeSet::parse("read"))
        .unwrap();

    issuer.rotate_key().unwrap();
    issuer.rotate_key().unwrap();
    issuer.rotate_key().unwrap();

    let late = token.expires_at - Duration::seconds(1);
    assert!(issuer.validate_at(&token.value, late).is_ok());
    assert!(issuer.validate_at(&token.value, token.expires_at - Duration::minutes(50)).is_ok());
    assert_eq!(
        issuer.validate_at(&token.value, token.expires_at).unwrap_err(),
        AuthError::TokenExpired
    );
}

#[test]
fn key_no_longer_needed_is_dropped_from_ring() {
    let issuer = issuer_with(1, TokenConfig::default().with_access_token_lifetime(Duration::ZERO));
    let token = issuer
        .issue_access_token("alice", "c1", &ScopeSet::parse("read"))
        .unwrap();

    issuer.rotate_key().unwrap();
    assert_eq!(issuer.jwks().keys.len(), 2);

    issuer.rotate_key().unwrap();
    assert_eq!(issuer.jwks().keys.len(), 2);
    assert_eq!(
        issuer.validate(&token.value).unwrap_err(),
        AuthError::SignatureInvalid
    );
}

#[test]
fn rotation_keeps_the_configured_algorithm() {
    let issuer = issuer(2);
    assert_eq!(issuer.signing_algorithm(), SigningAlgorithm::ES384);
    issuer.rotate_key().unwrap();
    assert_eq!(issuer.signing_algorithm(), SigningAlgorithm::ES384);
}
