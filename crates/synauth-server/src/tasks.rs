//! Background maintenance: expired entry purge and signing key rotation.

use std::sync::Arc;
use std::time::Duration;

use synauth_auth::AuthorizationEngine;
use tokio::task::JoinHandle;

/// Purges expired or consumed codes and expired or revoked refresh tokens
/// every `every`.
pub fn start_reaper(engine: Arc<AuthorizationEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            reap(&engine).await;
        }
    })
}

/// One purge pass. Returns the number of codes and refresh tokens removed;
/// a failed purge counts as zero.
async fn reap(engine: &AuthorizationEngine) -> (u64, u64) {
    let codes = engine.codes().purge_expired().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Authorization code purge failed");
        0
    });
    let refresh_tokens = engine
        .tokens()
        .purge_expired_refresh_tokens()
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Refresh token purge failed");
            0
        });

    if codes > 0 || refresh_tokens > 0 {
        tracing::info!(codes, refresh_tokens, "Purged expired entries");
    } else {
        tracing::debug!("Reaper run found nothing to purge");
    }
    (codes, refresh_tokens)
}

/// Generates a new signing key every `every`. Retired keys keep validating
/// until the access tokens they signed have expired.
pub fn start_key_rotation(engine: Arc<AuthorizationEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;

        loop {
            interval.tick().await;

            let tokens = Arc::clone(engine.tokens());
            match tokio::task::spawn_blocking(move || tokens.rotate_key()).await {
                Ok(Ok(_kid)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Signing key rotation failed"),
                Err(e) => tracing::warn!(error = %e, "Signing key rotation task panicked"),
            }
        }
    })
}
