//! Bearer-key validation for the gateway's own surface
//!
//! The browser client authenticates to the gateway with a publishable key in
//! the `Authorization: Bearer` header. Keys are compared in constant time so
//! key validation leaks no timing information.
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use subtle::ConstantTimeEq;

/// A wrapper around String that uses constant-time equality comparison
/// to prevent timing attacks on API key validation.
#[derive(Clone, Debug)]
pub struct ConstantTimeString(String);

impl From<String> for ConstantTimeString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConstantTimeString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// This is the point: use the subtle crate for comparisons
impl PartialEq for ConstantTimeString {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for ConstantTimeString {}

impl Hash for ConstantTimeString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// The set of publishable keys accepted by the gateway. Empty means the
/// check is disabled (local development).
pub type KeySet = HashSet<ConstantTimeString>;

/// Validates a bearer token against the key set using constant-time comparison.
pub fn validate_bearer_token(keys: &KeySet, token: &str) -> bool {
    keys.contains(&ConstantTimeString::from(token))
}

/// Pull the bearer token out of an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_known_key() {
        let mut keys = KeySet::new();
        keys.insert(ConstantTimeString::from("pk-test"));
        assert!(validate_bearer_token(&keys, "pk-test"));
        assert!(!validate_bearer_token(&keys, "pk-wrong"));
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer pk-test"), Some("pk-test"));
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
    }
}
