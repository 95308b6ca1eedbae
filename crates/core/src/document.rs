//! Notebook documents and change payloads
//!
//! A [`Document`] is the typed view of one stored JSON object: the reserved
//! fields every record carries (all prefixed so they never collide with user
//! metadata), the handful of well-known optional fields that views special-case,
//! and an open map for everything the type schema defines.
//!
//! The store itself is schemaless and hands out [`RawDocument`]s. Conversion to
//! `Document` happens at that boundary and may fail for malformed records.

use crate::branch::{Branch, BranchChange};
use crate::error::{Error, Result};
use crate::id::{DocumentId, RevisionToken};
use crate::kind::DocumentKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Untyped stored JSON object
pub type RawDocument = Map<String, Value>;

/// Store-assigned identifier field
pub const FIELD_ID: &str = "_id";
/// Optimistic-concurrency token field
pub const FIELD_REV: &str = "_rev";
/// Revision history field
pub const FIELD_ATTACHMENTS: &str = "_attachments";
/// Type sequence field
pub const FIELD_TYPE: &str = "-type";
/// Display name field
pub const FIELD_NAME: &str = "-name";
/// Timestamp field
pub const FIELD_DATE: &str = "-date";
/// Provenance field
pub const FIELD_CLIENT: &str = "-client";
/// Editing user field
pub const FIELD_USER: &str = "-user";
/// Placement field
pub const FIELD_BRANCH: &str = "-branch";
/// Tag set field
pub const FIELD_TAGS: &str = "-tags";
/// Thumbnail field (base64 raster or inline SVG)
pub const FIELD_IMAGE: &str = "image";
/// Free text field
pub const FIELD_CONTENT: &str = "content";
/// Content checksum field
pub const FIELD_SHASUM: &str = "shasum";
/// QR code list field
pub const FIELD_QR_CODE: &str = "qrCode";

/// Type value meaning "type not chosen" in GUI payloads
pub const NO_TYPE_SENTINEL: &str = "--";

/// Key in a change payload that carries the edit intent
pub const EDIT_FLAG: &str = "edit";
/// Edit intent value requesting deletion
pub const EDIT_DELETE: &str = "-delete-";

/// One lab-notebook record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    /// Store-assigned id (absent until first write)
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    /// Current revision token (absent until first write)
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<RevisionToken>,
    /// Type sequence; `None` when the field is missing altogether
    #[serde(rename = "-type", default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    /// Display name
    #[serde(rename = "-name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// ISO-8601 timestamp of the last write
    #[serde(rename = "-date", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Call path that produced the last write
    #[serde(rename = "-client", default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Placements in the hierarchy; `None` when the field is missing
    #[serde(rename = "-branch", default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Vec<Branch>>,
    /// Tags
    #[serde(rename = "-tags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Thumbnail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Content checksum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
    /// QR codes
    #[serde(rename = "qrCode", default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<Vec<String>>,
    /// Revision history: `vN.json` → sparse snapshot
    #[serde(rename = "_attachments", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, Value>,
    /// Schema-defined metadata
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Document {
    /// Unsaved document with a type sequence and a name
    pub fn new(types: Vec<String>, name: impl Into<String>) -> Self {
        Document {
            types: Some(types),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set a schema-defined field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Set the placements
    pub fn with_branches(mut self, branches: Vec<Branch>) -> Self {
        self.branch = Some(branches);
        self
    }

    /// Id for log and error messages
    pub fn id_str(&self) -> &str {
        self.id.as_ref().map(|id| id.as_str()).unwrap_or("<unsaved>")
    }

    /// Decoded first type tag
    pub fn kind(&self) -> Option<DocumentKind> {
        self.types.as_deref().and_then(DocumentKind::from_types)
    }

    /// Placements, empty when the field is missing
    pub fn branches(&self) -> &[Branch] {
        self.branch.as_deref().unwrap_or(&[])
    }

    /// First placement, which anchors the document for per-type views
    pub fn primary_branch(&self) -> Option<&Branch> {
        self.branches().first()
    }

    /// Convert from a raw stored object
    pub fn from_raw(raw: RawDocument) -> Result<Self> {
        serde_json::from_value(Value::Object(raw))
            .map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    /// Convert to a raw object for storage or field-wise processing
    pub fn to_raw(&self) -> Result<RawDocument> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Serialization(format!(
                "document serialized to non-object: {}",
                other
            ))),
        }
    }

    /// Names of existing revision snapshots, ascending by N
    pub fn snapshot_names(&self) -> Vec<String> {
        let mut indexed: Vec<(u64, &String)> = self
            .attachments
            .keys()
            .filter_map(|name| snapshot_index(name).map(|n| (n, name)))
            .collect();
        indexed.sort();
        indexed.into_iter().map(|(_, name)| name.clone()).collect()
    }

    /// Name of the next revision snapshot
    ///
    /// One past the highest existing `vN.json`, so names are never reused
    /// even if an earlier snapshot was removed.
    pub fn next_snapshot_name(&self) -> String {
        let next = self
            .attachments
            .keys()
            .filter_map(|name| snapshot_index(name))
            .max()
            .map(|n| n + 1)
            .unwrap_or(0);
        format!("v{}.json", next)
    }
}

/// Parse `vN.json` → N
pub fn snapshot_index(name: &str) -> Option<u64> {
    name.strip_prefix('v')?.strip_suffix(".json")?.parse().ok()
}

/// Fields the archiver never diffs or clears
pub fn is_identity_field(key: &str) -> bool {
    matches!(key, FIELD_ID | FIELD_REV | FIELD_BRANCH | FIELD_ATTACHMENTS)
}

/// Bookkeeping fields that do not count as a change on their own
pub fn is_bookkeeping_field(key: &str) -> bool {
    matches!(key, FIELD_DATE | FIELD_CLIENT | FIELD_USER)
}

/// What a change payload intends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeIntent {
    /// Regular field/branch edit
    #[default]
    Edit,
    /// Archive every user field and clear the document
    Delete,
}

/// Proposed change to a live document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentChange {
    /// Edit or delete
    pub intent: ChangeIntent,
    /// Branch operation, if any
    pub branch: Option<BranchChange>,
    /// New field values (reserved identity fields are ignored)
    pub fields: RawDocument,
}

impl DocumentChange {
    /// Empty edit
    pub fn edit() -> Self {
        DocumentChange::default()
    }

    /// Deletion request
    pub fn delete() -> Self {
        DocumentChange {
            intent: ChangeIntent::Delete,
            ..Default::default()
        }
    }

    /// Add a field value
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Add a branch operation
    pub fn with_branch(mut self, change: BranchChange) -> Self {
        self.branch = Some(change);
        self
    }

    /// Parse a JSON payload as sent by the GUI
    ///
    /// `-branch` is decoded as a [`BranchChange`] (an unknown `op` fails the
    /// whole payload); `"edit": "-delete-"` marks a deletion; every other key
    /// is a field value.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::InvalidDocument("change payload must be an object".into()));
        };
        let branch = match fields.remove(FIELD_BRANCH) {
            Some(Value::Null) | None => None,
            Some(raw) => Some(BranchChange::from_value(&raw)?),
        };
        let intent = match fields.remove(EDIT_FLAG) {
            Some(Value::String(flag)) if flag == EDIT_DELETE => ChangeIntent::Delete,
            _ => ChangeIntent::Edit,
        };
        Ok(DocumentChange {
            intent,
            branch,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchOp;
    use serde_json::json;

    #[test]
    fn raw_round_trip_keeps_extra_fields() {
        let raw = json!({
            "_id": "m-1",
            "-type": ["measurement", "tif"],
            "-name": "scan.tif",
            "-branch": [{"stack": ["x-1"], "path": "p/scan.tif", "child": 9999}],
            "shasum": "abc",
            "voltage": 12.5,
            "metaVendor": {"date": "2024"}
        });
        let Value::Object(map) = raw else { unreachable!() };
        let doc = Document::from_raw(map.clone()).unwrap();
        assert_eq!(doc.kind(), Some(DocumentKind::Measurement));
        assert_eq!(doc.extra.get("voltage"), Some(&json!(12.5)));
        assert_eq!(doc.to_raw().unwrap(), map);
    }

    #[test]
    fn malformed_reserved_field_is_rejected() {
        let Value::Object(map) = json!({"_id": "m-1", "-type": "measurement"}) else {
            unreachable!()
        };
        assert!(matches!(Document::from_raw(map), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn snapshot_names_are_monotonic() {
        let mut doc = Document::new(vec!["sample".into()], "s");
        assert_eq!(doc.next_snapshot_name(), "v0.json");
        doc.attachments.insert("v0.json".into(), json!({}));
        doc.attachments.insert("v2.json".into(), json!({}));
        doc.attachments.insert("photo.png".into(), json!({}));
        assert_eq!(doc.next_snapshot_name(), "v3.json");
        assert_eq!(doc.snapshot_names(), vec!["v0.json", "v2.json"]);
    }

    #[test]
    fn change_payload_parsing() {
        let change = DocumentChange::from_value(json!({
            "-branch": {"op": "u", "stack": ["x-1"], "path": "a/b", "oldpath": "a/c"},
            "-name": "b",
        }))
        .unwrap();
        assert_eq!(change.intent, ChangeIntent::Edit);
        let branch = change.branch.unwrap();
        assert_eq!(branch.op, BranchOp::Update);
        assert_eq!(branch.oldpath.as_deref(), Some("a/c"));
        assert_eq!(change.fields.get("-name"), Some(&json!("b")));
    }

    #[test]
    fn change_payload_delete_flag() {
        let change = DocumentChange::from_value(json!({"edit": "-delete-"})).unwrap();
        assert_eq!(change.intent, ChangeIntent::Delete);
        assert!(change.fields.is_empty());
    }

    #[test]
    fn change_payload_bad_op_fails_whole_payload() {
        let err = DocumentChange::from_value(json!({"-branch": {"op": "x"}, "-name": "n"}));
        assert!(matches!(err, Err(Error::InvalidBranchOp(_))));
    }
}
