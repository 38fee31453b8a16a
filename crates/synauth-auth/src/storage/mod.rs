//! Storage traits for authorization server data.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations
//! - Authorization codes
//! - Refresh tokens
//! - Principals (consumed, not owned)
//!
//! # Implementations
//!
//! [`memory`] provides `DashMap` backed implementations of every trait.

pub mod client;
pub mod code;
pub mod memory;
pub mod principal;
pub mod refresh_token;
#[cfg(test)]
pub(crate) mod unavailable;

pub use client::ClientStorage;
pub use code::AuthorizationCodeStorage;
pub use memory::{
    InMemoryClientStorage, InMemoryCodeStorage, InMemoryPrincipalStore,
    InMemoryRefreshTokenStorage,
};
pub use principal::PrincipalStore;
pub use refresh_token::RefreshTokenStorage;
