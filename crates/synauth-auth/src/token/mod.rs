//! Token generation, validation, and management.
//!
//! This module provides:
//!
//! - Access token generation and validation
//! - Refresh token issuance, rotation and revocation
//! - Token introspection (RFC 7662)
//! - JWT encoding and decoding over a rotating key ring

pub mod introspection;
pub mod jwt;
pub mod service;

pub use introspection::{IntrospectionResponse, TokenActionRequest, TokenTypeHint};
pub use jwt::{
    AccessTokenClaims, AccessTokenClaimsBuilder, Jwk, Jwks, JwtError, JwtService, KeyRing,
    SigningAlgorithm, SigningKeyPair,
};
pub use service::{
    AccessToken, IssuedRefreshToken, RefreshedTokens, TokenConfig, TokenIssuer, ValidatedToken,
};
