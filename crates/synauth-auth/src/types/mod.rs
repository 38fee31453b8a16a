//! Core domain types.

pub mod client;
pub mod principal;
pub mod refresh_token;
pub mod scope;

pub use client::{ClientValidationError, GrantType, RegisteredClient};
pub use principal::{Principal, PrincipalRecord};
pub use refresh_token::RefreshToken;
pub use scope::ScopeSet;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// Generates an opaque 256-bit random value encoded as base64url (43 characters).
pub(crate) fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
