//! Boundary traits
//!
//! The engine talks to the outside world through two seams:
//! - [`DocumentStore`]: schemaless JSON CRUD with optimistic concurrency,
//!   ordered iteration and map-view queries
//! - [`ApprovalPort`]: optional user confirmation before a write commits
//!
//! Provenance is passed explicitly as a [`CallerContext`].

use crate::document::{Document, RawDocument, FIELD_ID};
use crate::error::{Error, Result};
use crate::id::{DocumentId, RevisionToken};
use crate::view::{DesignDocument, ViewKey, ViewRow};
use serde_json::Value;
use std::fmt;

/// Schemaless document store with optimistic concurrency
///
/// Thread safety: all methods must be safe to call concurrently
/// (requires Send + Sync). The token passed to a write is the only
/// cross-call ordering primitive; a stale token must be rejected with
/// [`Error::RevisionConflict`], never silently overwritten.
pub trait DocumentStore: Send + Sync {
    /// Read one raw document (with `_id` and `_rev` set)
    fn get_raw(&self, id: &DocumentId) -> Result<Option<RawDocument>>;

    /// Write a raw document
    ///
    /// `token == None` creates the document and fails with
    /// [`Error::AlreadyExists`] if the id is taken. Otherwise the token must
    /// equal the stored one. Returns the new token.
    fn write_raw(
        &self,
        id: &DocumentId,
        doc: RawDocument,
        token: Option<&RevisionToken>,
    ) -> Result<RevisionToken>;

    /// Remove a document; returns whether it existed
    fn delete(&self, id: &DocumentId) -> Result<bool>;

    /// Every stored document, design documents included, in id order
    fn iterate_all(&self) -> Result<Vec<RawDocument>>;

    /// Rows of a view, ordered by key then document id
    fn query_view(&self, design: &str, view: &str, key: &ViewKey) -> Result<Vec<ViewRow>>;

    /// Read a design document
    fn design_document(&self, name: &str) -> Result<Option<DesignDocument>>;

    /// Create a design document; fails if it exists
    fn put_design_document(&self, design: &DesignDocument) -> Result<()>;

    /// Remove a design document; returns whether it existed
    fn delete_design_document(&self, name: &str) -> Result<bool>;

    /// Attach data to a document under `name`
    ///
    /// Subject to the same token check as [`DocumentStore::write_raw`].
    fn put_attachment(
        &self,
        id: &DocumentId,
        name: &str,
        token: &RevisionToken,
        data: Value,
    ) -> Result<RevisionToken>;

    /// Replace a design document: delete, then create
    ///
    /// Not atomic. If the create fails the old design document is gone and
    /// the caller must compile again.
    fn replace_design_document(&self, design: &DesignDocument) -> Result<()> {
        self.delete_design_document(&design.name)?;
        self.put_design_document(design)
    }

    /// Read a typed document
    fn get(&self, id: &DocumentId) -> Result<Document> {
        let raw = self
            .get_raw(id)?
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        Document::from_raw(raw)
    }

    /// Write a typed document; the document must carry an id
    fn write(&self, doc: &Document, token: Option<&RevisionToken>) -> Result<RevisionToken> {
        let id = doc
            .id
            .clone()
            .ok_or_else(|| Error::InvalidDocument(format!("{} missing", FIELD_ID)))?;
        self.write_raw(&id, doc.to_raw()?, token)
    }
}

/// User approval gate in front of writes
///
/// Returning `false` silently discards the write. The caller still receives
/// the attempted state, so a returned document does not imply persistence.
pub trait ApprovalPort {
    /// Approve a proposed state; `previous` is set for updates
    fn confirm(&self, proposed: &Document, previous: Option<&Document>, prompt: &str) -> bool;
}

impl<F> ApprovalPort for F
where
    F: Fn(&Document, Option<&Document>, &str) -> bool,
{
    fn confirm(&self, proposed: &Document, previous: Option<&Document>, prompt: &str) -> bool {
        self(proposed, previous, prompt)
    }
}

/// Provenance of a write, stored in the document's `-client` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext(String);

impl CallerContext {
    /// Context with a free-form description of the call path
    pub fn new(client: impl Into<String>) -> Self {
        CallerContext(client.into())
    }

    /// Description as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallerContext {
    fn default() -> Self {
        CallerContext::new("pasta-engine")
    }
}

impl fmt::Display for CallerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_approval_ports() {
        let deny = |_: &Document, _: Option<&Document>, _: &str| false;
        let doc = Document::new(vec!["sample".into()], "s");
        assert!(!deny.confirm(&doc, None, "create?"));
        let allow = |proposed: &Document, _: Option<&Document>, _: &str| proposed.name.is_some();
        assert!(allow.confirm(&doc, None, "create?"));
    }

    #[test]
    fn caller_context_display() {
        assert_eq!(CallerContext::default().to_string(), "pasta-engine");
        assert_eq!(CallerContext::new("gui/tree").as_str(), "gui/tree");
    }
}
