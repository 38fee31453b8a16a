//! Principal types returned by a [`PrincipalStore`](crate::storage::PrincipalStore).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An authenticated end user or service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable principal identifier, used as the token subject.
    pub id: String,

    /// Authorities granted to the principal (e.g. `ROLE_USER`).
    pub authorities: BTreeSet<String>,
}

/// A principal as held by the store, including its credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    /// Stable principal identifier.
    pub id: String,

    /// Encoded credential: `{noop}<plain>` or an argon2 PHC string.
    pub credential_hash: String,

    /// Authorities granted to the principal.
    pub authorities: BTreeSet<String>,
}

impl PrincipalRecord {
    /// Creates a record with no authorities.
    #[must_use]
    pub fn new(id: impl Into<String>, credential_hash: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            credential_hash: credential_hash.into(),
            authorities: BTreeSet::new(),
        }
    }

    /// Adds an authority.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    /// The principal without its credential.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            authorities: self.authorities.clone(),
        }
    }
}

// Keeps credential hashes out of logs and panic messages.
impl std::fmt::Debug for PrincipalRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalRecord")
            .field("id", &self.id)
            .field("credential_hash", &"<redacted>")
            .field("authorities", &self.authorities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_drops_credential() {
        let record = PrincipalRecord::new("alice", "{noop}pw").with_authority("ROLE_USER");
        let principal = record.principal();
        assert_eq!(principal.id, "alice");
        assert!(principal.authorities.contains("ROLE_USER"));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let record = PrincipalRecord::new("alice", "{noop}926100349");
        let debug = format!("{record:?}");
        assert!(!debug.contains("926100349"));
        assert!(debug.contains("alice"));
    }
}
