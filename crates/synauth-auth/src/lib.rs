//! # synauth-auth
//!
//! OAuth 2.0 authorization server core.
//!
//! This crate provides:
//! - A read-only client registry with exact redirect URI matching
//! - Single-use authorization codes with linearizable redemption
//! - Signed access tokens over a rotating key ring, plus opaque refresh tokens
//! - A per-request authorization state machine tying them together
//! - Axum handlers and bearer middleware for the protocol endpoints
//!
//! ## Modules
//!
//! - [`config`] - Authorization server configuration
//! - [`error`] - Error taxonomy and protocol mappings
//! - [`types`] - Clients, principals, scopes and refresh tokens
//! - [`storage`] - Storage traits and in-memory implementations
//! - [`oauth`] - Registry, codes, engine and endpoint wire types
//! - [`token`] - JWT key ring and token issuance
//! - [`http`] - Axum handlers for the OAuth endpoints
//! - [`middleware`] - Bearer token authentication for protected resources

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::OAuthState;
pub use middleware::{AuthContext, AuthState, BearerAuth};
pub use oauth::{
    AuthorizationCodeManager, AuthorizationEngine, AuthorizationFlow, ClientRegistry, FlowState,
};
pub use storage::{AuthorizationCodeStorage, ClientStorage, PrincipalStore, RefreshTokenStorage};
pub use token::{JwtService, SigningAlgorithm, SigningKeyPair, TokenConfig, TokenIssuer};
pub use types::{GrantType, Principal, PrincipalRecord, RegisteredClient, ScopeSet};

/// Type alias for authorization server results.
pub type AuthResult<T> = Result<T, AuthError>;
