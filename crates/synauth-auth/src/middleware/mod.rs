//! HTTP middleware for protected resources.
//!
//! - Bearer token extraction and validation
//! - Authentication context injection
//! - OAuth-style JSON error responses

pub mod auth;
pub mod error;
pub mod types;

pub use auth::{AuthState, BearerAuth, require_bearer};
pub use error::error_json;
pub use types::AuthContext;
