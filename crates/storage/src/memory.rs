//! MemoryStore: in-process document store with optimistic concurrency
//!
//! This module implements the DocumentStore trait using:
//! - `BTreeMap<DocumentId, RawDocument>` for ordered iteration
//! - `parking_lot::RwLock` for thread-safe access
//! - a per-document [`RevisionToken`] checked on every write
//!
//! # Design Notes
//!
//! - **Design documents are documents**: they live under `_design/{name}`
//!   and show up in `iterate_all`, like in a CouchDB-style store
//! - **Views are evaluated on query**: rows are produced from each view's
//!   projection every time; nothing is cached
//! - **Token check under the write lock**: read-compare-write is one critical
//!   section, so two writers holding the same token cannot both succeed

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use pasta_core::document::{FIELD_ATTACHMENTS, FIELD_ID, FIELD_REV};
use pasta_core::id::DESIGN_PREFIX;
use pasta_core::view::sort_rows;
use pasta_core::{
    DesignDocument, DocumentId, DocumentStore, Error, RawDocument, Result, RevisionToken,
    ViewKey, ViewRow,
};
use serde_json::Value;
use tracing::debug;

/// Key holding the views of a design document
const VIEWS_FIELD: &str = "views";

/// In-memory document store
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Documents by id; every stored object carries `_id` and `_rev`
    data: Arc<RwLock<BTreeMap<DocumentId, RawDocument>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with raw documents
    ///
    /// Every document must carry a valid `_id`. Documents without `_rev`
    /// receive an initial token.
    pub fn from_documents(documents: Vec<RawDocument>) -> Result<Self> {
        let mut data = BTreeMap::new();
        for mut doc in documents {
            let id = raw_id(&doc)?;
            if !doc.get(FIELD_REV).map(Value::is_string).unwrap_or(false) {
                doc.insert(
                    FIELD_REV.to_string(),
                    Value::String(RevisionToken::initial().to_string()),
                );
            }
            if data.insert(id.clone(), doc).is_some() {
                return Err(Error::AlreadyExists(id));
            }
        }
        Ok(MemoryStore {
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Number of stored documents, design documents included
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn design_id(name: &str) -> Result<DocumentId> {
        DocumentId::new(format!("{}{}", DESIGN_PREFIX, name))
    }

    /// Check `token` against the stored document and hand out the next token
    fn next_token(
        id: &DocumentId,
        current: Option<&RawDocument>,
        token: Option<&RevisionToken>,
    ) -> Result<RevisionToken> {
        match (current, token) {
            (None, None) => Ok(RevisionToken::initial()),
            (Some(_), None) => Err(Error::AlreadyExists(id.clone())),
            (None, Some(_)) => Err(Error::NotFound(id.clone())),
            (Some(current), Some(token)) => {
                let actual = stored_token(current);
                if &actual != token {
                    return Err(Error::RevisionConflict {
                        id: id.clone(),
                        expected: token.to_string(),
                        actual,
                    });
                }
                Ok(actual.next())
            }
        }
    }
}

fn stored_token(doc: &RawDocument) -> RevisionToken {
    RevisionToken::from_string(doc.get(FIELD_REV).and_then(Value::as_str).unwrap_or_default())
}

fn raw_id(doc: &RawDocument) -> Result<DocumentId> {
    let id = doc
        .get(FIELD_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidDocument(format!("{} missing", FIELD_ID)))?;
    DocumentId::new(id)
}

impl DocumentStore for MemoryStore {
    fn get_raw(&self, id: &DocumentId) -> Result<Option<RawDocument>> {
        Ok(self.data.read().get(id).cloned())
    }

    fn write_raw(
        &self,
        id: &DocumentId,
        mut doc: RawDocument,
        token: Option<&RevisionToken>,
    ) -> Result<RevisionToken> {
        let mut data = self.data.write();
        let next = Self::next_token(id, data.get(id), token)?;
        doc.insert(FIELD_ID.to_string(), Value::String(id.to_string()));
        doc.insert(FIELD_REV.to_string(), Value::String(next.to_string()));
        data.insert(id.clone(), doc);
        debug!(target: "pasta::store", id = %id, rev = %next, "document written");
        Ok(next)
    }

    fn delete(&self, id: &DocumentId) -> Result<bool> {
        let existed = self.data.write().remove(id).is_some();
        debug!(target: "pasta::store", id = %id, existed, "document deleted");
        Ok(existed)
    }

    fn iterate_all(&self) -> Result<Vec<RawDocument>> {
        Ok(self.data.read().values().cloned().collect())
    }

    fn query_view(&self, design: &str, view: &str, key: &ViewKey) -> Result<Vec<ViewRow>> {
        let design_doc = self
            .design_document(design)?
            .ok_or_else(|| Error::Storage(format!("design document {} not found", design)))?;
        let definition = design_doc
            .views
            .get(view)
            .ok_or_else(|| Error::Storage(format!("view {}/{} not found", design, view)))?;

        let data = self.data.read();
        let mut rows = Vec::new();
        for (id, doc) in data.iter().filter(|(id, _)| !id.is_design()) {
            for (row_key, value) in definition.projection.emit(id, doc) {
                if key.matches(&row_key) {
                    rows.push(ViewRow {
                        key: row_key,
                        value,
                        id: id.clone(),
                    });
                }
            }
        }
        sort_rows(&mut rows);
        Ok(rows)
    }

    fn design_document(&self, name: &str) -> Result<Option<DesignDocument>> {
        let id = Self::design_id(name)?;
        let Some(raw) = self.get_raw(&id)? else {
            return Ok(None);
        };
        let views = raw.get(VIEWS_FIELD).cloned().unwrap_or(Value::Null);
        Ok(Some(DesignDocument {
            name: name.to_string(),
            views: serde_json::from_value(views)?,
        }))
    }

    fn put_design_document(&self, design: &DesignDocument) -> Result<()> {
        let id = Self::design_id(&design.name)?;
        let mut raw = RawDocument::new();
        raw.insert(VIEWS_FIELD.to_string(), serde_json::to_value(&design.views)?);
        self.write_raw(&id, raw, None)?;
        Ok(())
    }

    fn delete_design_document(&self, name: &str) -> Result<bool> {
        let id = Self::design_id(name)?;
        self.delete(&id)
    }

    fn put_attachment(
        &self,
        id: &DocumentId,
        name: &str,
        token: &RevisionToken,
        data: Value,
    ) -> Result<RevisionToken> {
        let mut store = self.data.write();
        let next = Self::next_token(id, store.get(id), Some(token))?;
        let doc = store.get_mut(id).ok_or_else(|| Error::NotFound(id.clone()))?;
        let attachments = doc
            .entry(FIELD_ATTACHMENTS.to_string())
            .or_insert_with(|| Value::Object(RawDocument::new()));
        match attachments {
            Value::Object(map) => {
                map.insert(name.to_string(), data);
            }
            _ => {
                return Err(Error::InvalidDocument(format!(
                    "{} of {} is not an object",
                    FIELD_ATTACHMENTS, id
                )))
            }
        }
        doc.insert(FIELD_REV.to_string(), Value::String(next.to_string()));
        debug!(target: "pasta::store", id = %id, attachment = name, rev = %next, "attachment stored");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasta_core::{Column, Document, Projection, ViewDefinition};
    use serde_json::json;

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    fn raw(value: Value) -> RawDocument {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryStore::new();
        let token = store
            .write_raw(&id("m-1"), raw(json!({"-name": "a"})), None)
            .unwrap();
        assert_eq!(token.generation(), 1);

        let doc = store.get_raw(&id("m-1")).unwrap().unwrap();
        assert_eq!(doc["_id"], json!("m-1"));
        assert_eq!(doc["_rev"], json!(token.to_string()));
        assert!(store.get_raw(&id("m-2")).unwrap().is_none());
    }

    #[test]
    fn test_create_twice_fails() {
        let store = MemoryStore::new();
        store.write_raw(&id("m-1"), RawDocument::new(), None).unwrap();
        let err = store.write_raw(&id("m-1"), RawDocument::new(), None).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn test_stale_token_is_rejected() {
        let store = MemoryStore::new();
        let first = store.write_raw(&id("m-1"), RawDocument::new(), None).unwrap();
        let second = store
            .write_raw(&id("m-1"), raw(json!({"a": 1})), Some(&first))
            .unwrap();
        assert_eq!(second.generation(), 2);

        let err = store
            .write_raw(&id("m-1"), raw(json!({"a": 2})), Some(&first))
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get_raw(&id("m-1")).unwrap().unwrap()["a"], json!(1));
    }

    #[test]
    fn test_update_of_missing_document() {
        let store = MemoryStore::new();
        let err = store
            .write_raw(&id("m-1"), RawDocument::new(), Some(&RevisionToken::initial()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_typed_round_trip() {
        let store = MemoryStore::new();
        let mut doc = Document::new(vec!["sample".into()], "s1");
        doc.id = Some(id("s-1"));
        let token = store.write(&doc, None).unwrap();
        let back = store.get(&id("s-1")).unwrap();
        assert_eq!(back.name.as_deref(), Some("s1"));
        assert_eq!(back.revision, Some(token));
        assert!(matches!(store.get(&id("s-2")), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_attachment_bumps_revision() {
        let store = MemoryStore::new();
        let first = store.write_raw(&id("m-1"), RawDocument::new(), None).unwrap();
        let second = store
            .put_attachment(&id("m-1"), "v0.json", &first, json!({"-name": "old"}))
            .unwrap();
        assert_eq!(second.generation(), 2);
        let doc = store.get(&id("m-1")).unwrap();
        assert_eq!(doc.attachments["v0.json"], json!({"-name": "old"}));

        let err = store
            .put_attachment(&id("m-1"), "v1.json", &first, json!({}))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_views_are_evaluated_from_projections() {
        let store = MemoryStore::new();
        store
            .write_raw(
                &id("m-2"),
                raw(json!({"-type": ["measurement"], "-name": "b", "shasum": "s2"})),
                None,
            )
            .unwrap();
        store
            .write_raw(
                &id("m-1"),
                raw(json!({"-type": ["measurement"], "-name": "a", "shasum": "s1"})),
                None,
            )
            .unwrap();
        let design = DesignDocument::new("viewIdentify").with_view(
            "viewSHAsum",
            ViewDefinition {
                map: String::new(),
                projection: Projection::Checksums,
            },
        );
        store.put_design_document(&design).unwrap();

        let rows = store.query_view("viewIdentify", "viewSHAsum", &ViewKey::All).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, json!("s1"));
        assert_eq!(rows[0].id, id("m-1"));

        let rows = store
            .query_view("viewIdentify", "viewSHAsum", &ViewKey::Exact(json!("s2")))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, json!("b"));
        assert!(store.query_view("viewIdentify", "nope", &ViewKey::All).is_err());
        assert!(store.query_view("nope", "viewSHAsum", &ViewKey::All).is_err());
    }

    #[test]
    fn test_design_documents_round_trip_and_iterate() {
        let store = MemoryStore::new();
        let design = DesignDocument::new("measurement").with_view(
            "measurement",
            ViewDefinition {
                map: "function (doc) {}".into(),
                projection: Projection::TypeTable {
                    doc_type: "measurement".into(),
                    root: false,
                    columns: vec![Column::Image],
                },
            },
        );
        store.put_design_document(&design).unwrap();
        assert!(store.put_design_document(&design).is_err());
        assert_eq!(store.design_document("measurement").unwrap(), Some(design.clone()));
        assert_eq!(store.iterate_all().unwrap().len(), 1);

        store.replace_design_document(&design).unwrap();
        assert!(store.delete_design_document("measurement").unwrap());
        assert!(!store.delete_design_document("measurement").unwrap());
        assert!(store.design_document("measurement").unwrap().is_none());
    }

    #[test]
    fn test_from_documents() {
        let store = MemoryStore::from_documents(vec![
            raw(json!({"_id": "a-1", "_rev": "3-ff"})),
            raw(json!({"_id": "a-2"})),
        ])
        .unwrap();
        assert_eq!(store.len(), 2);
        let a1 = store.get_raw(&id("a-1")).unwrap().unwrap();
        assert_eq!(a1["_rev"], json!("3-ff"));
        assert!(store.get_raw(&id("a-2")).unwrap().unwrap()["_rev"].is_string());

        let dup = MemoryStore::from_documents(vec![
            raw(json!({"_id": "a-1"})),
            raw(json!({"_id": "a-1"})),
        ]);
        assert!(matches!(dup, Err(Error::AlreadyExists(_))));
        assert!(MemoryStore::from_documents(vec![raw(json!({"x": 1}))]).is_err());
    }
}
