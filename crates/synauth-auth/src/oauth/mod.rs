//! OAuth 2.0 authorization server components.
//!
//! - [`registry`] - Client registrations and scope policy
//! - [`code`] - Authorization code issue and single-use redemption
//! - [`engine`] - Per-request authorization state machine
//! - [`authorize`] - Authorization endpoint wire types
//! - [`token`] - Token endpoint wire types
//! - [`client_auth`] - Client authentication (Basic and form secrets)
//! - [`password`] - Credential encoding and verification

pub mod authorize;
pub mod client_auth;
pub mod code;
pub mod engine;
pub mod password;
pub mod registry;
pub mod token;

pub use authorize::{AuthorizationErrorResponse, AuthorizationRequest, AuthorizationResponse};
pub use client_auth::{
    AuthenticatedClient, ClientCredentials, TokenEndpointAuthMethod, authenticate_client,
    parse_basic_auth,
};
pub use code::{AuthorizationCode, AuthorizationCodeManager, CodeGrant};
pub use engine::{
    AuthorizationEngine, AuthorizationFlow, AuthorizationGrant, AuthorizationRejection,
    ExchangedTokens, FlowState,
};
pub use password::{hash_credential, verify_credential, verify_credential_async};
pub use registry::ClientRegistry;
pub use token::{TokenErrorResponse, TokenRequest, TokenResponse};
