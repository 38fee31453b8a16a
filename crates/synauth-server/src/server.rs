use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use synauth_auth::http::{
    OAuthState, authorize_handler, discovery_handler, introspect_handler, jwks_handler, paths,
    revoke_handler, token_handler, userinfo_handler,
};
use synauth_auth::middleware::require_bearer;
use synauth_auth::{AuthState, AuthorizationEngine};
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{bootstrap, config::AppConfig, handlers, middleware as app_middleware, tasks};

pub struct SynauthServer {
    addr: SocketAddr,
    app: Router,
    tasks: Vec<JoinHandle<()>>,
}

/// Authorization-server chain: protocol endpoints and metadata.
pub fn authorization_server_chain(state: OAuthState) -> Router {
    let routes = Router::new()
        .route(paths::AUTHORIZE, get(authorize_handler))
        .route(paths::TOKEN, post(token_handler))
        .route(paths::REVOKE, post(revoke_handler))
        .route(paths::INTROSPECT, post(introspect_handler))
        .route(paths::JWKS, get(jwks_handler))
        .route(paths::OAUTH_METADATA, get(discovery_handler))
        .route(paths::OPENID_CONFIGURATION, get(discovery_handler))
        .with_state(state)
        .layer(CorsLayer::permissive());

    observed(routes)
}

/// Resource chain: bearer-protected resources plus the health probe.
pub fn resource_chain(auth: AuthState) -> Router {
    let protected = Router::new()
        .route(paths::USERINFO, get(userinfo_handler))
        .route_layer(middleware::from_fn_with_state(auth.clone(), require_bearer))
        .with_state(auth);

    let open = Router::new().route("/healthz", get(handlers::healthz));

    observed(protected.merge(open))
}

// Request id runs outermost so the span sees the id in extensions.
fn observed(router: Router) -> Router {
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
}

/// Both chains over one engine.
pub fn build_router(engine: Arc<AuthorizationEngine>, body_limit: usize) -> Router {
    let auth = AuthState::new(Arc::clone(engine.tokens()));
    let state = OAuthState::new(engine);

    authorization_server_chain(state)
        .merge(resource_chain(auth))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let engine = bootstrap::build_engine(cfg).await?;
    Ok(build_router(engine, cfg.server.body_limit_bytes))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Bootstraps the engine and starts the background tasks.
    pub async fn build(self) -> anyhow::Result<SynauthServer> {
        let engine = bootstrap::build_engine(&self.config).await?;
        let auth = &self.config.auth;

        let mut handles = Vec::new();
        if auth.reaper.enabled {
            tracing::info!(interval = ?auth.reaper.interval, "Starting expired entry reaper");
            handles.push(tasks::start_reaper(Arc::clone(&engine), auth.reaper.interval));
        }
        if auth.signing.rotation_enabled() {
            tracing::info!(
                interval = ?auth.signing.key_rotation_interval,
                "Starting signing key rotation"
            );
            handles.push(tasks::start_key_rotation(
                Arc::clone(&engine),
                auth.signing.key_rotation_interval,
            ));
        }

        Ok(SynauthServer {
            addr: self.addr,
            app: build_router(engine, self.config.server.body_limit_bytes),
            tasks: handles,
        })
    }
}

impl SynauthServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        for task in &self.tasks {
            task.abort();
        }
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
