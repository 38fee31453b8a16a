//! Scope sets.
//!
//! OAuth scopes travel as a space-delimited string on the wire and inside
//! tokens. Internally they are an ordered set so that comparisons and
//! intersections do not depend on the order a client listed them in.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered, duplicate-free set of scope tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Creates an empty scope set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parses a space-delimited scope string. Repeated whitespace is ignored.
    #[must_use]
    pub fn parse(scope: &str) -> Self {
        scope.split_whitespace().map(str::to_string).collect()
    }

    /// Returns `true` if the set contains `scope`.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of scopes in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the scopes in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Scopes present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &ScopeSet) -> ScopeSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    /// Scopes in `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &ScopeSet) -> ScopeSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Returns `true` if every scope in `self` is also in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope)?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_order_and_duplicates() {
        let a = ScopeSet::parse("write read  read");
        let b = ScopeSet::parse("read write");
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_parse_empty() {
        assert!(ScopeSet::parse("").is_empty());
        assert!(ScopeSet::parse("   ").is_empty());
    }

    #[test]
    fn test_display_is_space_delimited_and_sorted() {
        let scopes = ScopeSet::parse("products.write openid products.read");
        assert_eq!(scopes.to_string(), "openid products.read products.write");
        assert_eq!(ScopeSet::new().to_string(), "");
    }

    #[test]
    fn test_intersection_and_difference() {
        let registered = ScopeSet::parse("read");
        let requested = ScopeSet::parse("read write");

        assert_eq!(requested.intersection(&registered), ScopeSet::parse("read"));
        assert_eq!(requested.difference(&registered), ScopeSet::parse("write"));
        assert!(registered.is_subset(&requested));
        assert!(!requested.is_subset(&registered));
    }

    #[test]
    fn test_serde_as_sequence() {
        let scopes: ScopeSet = serde_json::from_str(r#"["b", "a"]"#).unwrap();
        assert!(scopes.contains("a"));
        assert_eq!(serde_json::to_string(&scopes).unwrap(), r#"["a","b"]"#);
    }
}
