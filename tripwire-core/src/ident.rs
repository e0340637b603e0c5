//! Opaque identifiers and the id source.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque, globally unique identifier.
///
/// Stores and the wire format treat ids as plain strings; nothing in the
/// engine inspects their structure. The empty string is the `none`
/// sentinel.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ident(String);

impl Ident {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The empty sentinel value.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Ident {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh identifiers.
///
/// Injected so deployments can swap in an external id service; must be
/// thread-safe and collision-resistant.
pub trait IdGen: Send + Sync {
    fn next_id(&self) -> Ident;
}

/// Default id source: random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGen;

impl IdGen for UuidGen {
    fn next_id(&self) -> Ident {
        Ident::new(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_empty() {
        assert!(Ident::none().is_none());
        assert!(!Ident::new("a").is_none());
    }

    #[test]
    fn uuid_gen_does_not_repeat() {
        let ids = UuidGen;
        assert_ne!(ids.next_id(), ids.next_id());
    }

    #[test]
    fn serde_is_transparent() {
        let id = Ident::new("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
    }
}
