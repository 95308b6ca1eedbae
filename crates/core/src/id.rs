//! Document identity and revision tokens
//!
//! `DocumentId` is validated once, when it is constructed at the store
//! boundary. Everything downstream can rely on it being non-empty and free of
//! whitespace. Canonical ids additionally follow the `{prefix}-{32 hex}` shape
//! produced by [`DocumentId::generate`]; the consistency checker uses
//! [`DocumentId::is_canonical`] to decide whether a stack entry can reference a
//! document at all.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix carried by design documents (view containers)
pub const DESIGN_PREFIX: &str = "_design/";

/// Length of the random part of a canonical id
const CANONICAL_SUFFIX_LEN: usize = 32;

/// Unique identifier of a stored document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Validate and wrap an id
    ///
    /// Rejects empty ids and ids containing whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(Error::InvalidId(id));
        }
        Ok(DocumentId(id))
    }

    /// Generate a fresh canonical id: `{prefix}-{32 lowercase hex}`
    pub fn generate(prefix: &str) -> Self {
        DocumentId(format!("{}-{}", prefix, Uuid::new_v4().simple()))
    }

    /// Id as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for design documents (`_design/...`)
    pub fn is_design(&self) -> bool {
        self.0.starts_with(DESIGN_PREFIX)
    }

    /// Check an arbitrary string against the canonical shape
    pub fn is_canonical_str(id: &str) -> bool {
        let Some((prefix, suffix)) = id.split_once('-') else {
            return false;
        };
        !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            && suffix.len() == CANONICAL_SUFFIX_LEN
            && suffix.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    /// True when the id follows the `{prefix}-{32 hex}` shape
    pub fn is_canonical(&self) -> bool {
        Self::is_canonical_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DocumentId::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque optimistic-concurrency marker: `{generation}-{random hex}`
///
/// The store hands out a new token on every write and refuses writes that
/// present anything but the current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionToken(String);

impl RevisionToken {
    /// Token of the first revision of a document
    pub fn initial() -> Self {
        Self::with_generation(1)
    }

    /// Token following this one
    pub fn next(&self) -> Self {
        Self::with_generation(self.generation() + 1)
    }

    fn with_generation(generation: u64) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        RevisionToken(format!("{}-{}", generation, &random[..16]))
    }

    /// Wrap a token received from elsewhere
    pub fn from_string(token: impl Into<String>) -> Self {
        RevisionToken(token.into())
    }

    /// Revision generation; 0 when the token is not in `{n}-...` form
    pub fn generation(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(n, _)| n.parse().ok())
            .unwrap_or(0)
    }

    /// Token as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(DocumentId::new("").is_err());
        assert!(DocumentId::new("m 1").is_err());
        assert!(DocumentId::new("m1").is_ok());
    }

    #[test]
    fn generated_ids_are_canonical() {
        let id = DocumentId::generate("m");
        assert!(id.is_canonical(), "{id}");
        assert_eq!(id.as_str().len(), 34);
        assert!(id.as_str().starts_with("m-"));
    }

    #[test]
    fn canonical_shape() {
        assert!(DocumentId::is_canonical_str("x-0123456789abcdef0123456789abcdef"));
        assert!(!DocumentId::is_canonical_str("x-0123456789ABCDEF0123456789abcdef"));
        assert!(!DocumentId::is_canonical_str("root"));
        assert!(!DocumentId::is_canonical_str("-0123456789abcdef0123456789abcdef"));
        assert!(!DocumentId::is_canonical_str("x-0123"));
    }

    #[test]
    fn design_prefix() {
        assert!(DocumentId::new("_design/viewHierarchy").unwrap().is_design());
        assert!(!DocumentId::new("x-1").unwrap().is_design());
    }

    #[test]
    fn deserialize_validates() {
        let ok: std::result::Result<DocumentId, _> = serde_json::from_str("\"m1\"");
        assert!(ok.is_ok());
        let bad: std::result::Result<DocumentId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn revision_generations_increase() {
        let first = RevisionToken::initial();
        let second = first.next();
        assert_eq!(first.generation(), 1);
        assert_eq!(second.generation(), 2);
        assert_ne!(first, second);
        assert_eq!(RevisionToken::from_string("garbage").generation(), 0);
    }
}
