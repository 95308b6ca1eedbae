//! Views: map projections over the document population
//!
//! A view is stored in a design document as map-function source (for stores
//! that run JavaScript) together with a [`Projection`], the same rule in
//! declarative form. Stores without a JavaScript runtime evaluate the
//! projection directly through [`Projection::emit`].
//!
//! ## Row order
//!
//! Query results are ordered by key using [`collate`] (null < bools < numbers
//! < strings < arrays < objects), ties broken by document id.

use crate::document::{
    RawDocument, FIELD_BRANCH, FIELD_CONTENT, FIELD_IMAGE, FIELD_NAME, FIELD_QR_CODE,
    FIELD_SHASUM, FIELD_TAGS, FIELD_TYPE,
};
use crate::id::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Characters of `content` shown in type views
pub const CONTENT_PREVIEW_CHARS: usize = 100;

/// Image payloads longer than this count as "has image"
pub const IMAGE_PROBE_LEN: usize = 3;

/// One value column of a per-type view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum Column {
    /// `"true"`/`"false"`: image payload longer than [`IMAGE_PROBE_LEN`]
    Image,
    /// Tags joined by a single space
    Tags,
    /// Type sequence without its first element, joined by `/`
    Type,
    /// First [`CONTENT_PREVIEW_CHARS`] characters of `content`
    Content,
    /// Guarded nested access, e.g. `metaVendor/date`; empty string if absent
    Nested(Vec<String>),
    /// Direct field access
    Field(String),
}

impl Column {
    /// Column for a schema field name
    pub fn for_field(name: &str) -> Self {
        match name {
            FIELD_IMAGE => Column::Image,
            FIELD_TAGS => Column::Tags,
            FIELD_TYPE => Column::Type,
            FIELD_CONTENT => Column::Content,
            other if other.contains('/') => {
                Column::Nested(other.split('/').map(str::to_string).collect())
            }
            other => Column::Field(other.to_string()),
        }
    }

    fn evaluate(&self, doc: &RawDocument) -> Value {
        match self {
            Column::Image => {
                let has_image = doc
                    .get(FIELD_IMAGE)
                    .and_then(Value::as_str)
                    .map(|image| image.chars().count() > IMAGE_PROBE_LEN)
                    .unwrap_or(false);
                Value::String(has_image.to_string())
            }
            Column::Tags => Value::String(string_list(doc.get(FIELD_TAGS)).join(" ")),
            Column::Type => {
                let types = string_list(doc.get(FIELD_TYPE));
                Value::String(types.iter().skip(1).cloned().collect::<Vec<_>>().join("/"))
            }
            Column::Content => Value::String(
                doc.get(FIELD_CONTENT)
                    .and_then(Value::as_str)
                    .map(|content| content.chars().take(CONTENT_PREVIEW_CHARS).collect())
                    .unwrap_or_default(),
            ),
            Column::Nested(segments) => {
                let Some((first, rest)) = segments.split_first() else {
                    return Value::String(String::new());
                };
                let mut current = doc.get(first.as_str());
                for segment in rest {
                    current = current.and_then(|value| value.get(segment.as_str()));
                }
                match current {
                    Some(Value::Null) | None => Value::String(String::new()),
                    Some(value) => value.clone(),
                }
            }
            Column::Field(name) => doc.get(name.as_str()).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Declarative form of a map function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "projection", rename_all = "snake_case")]
pub enum Projection {
    /// Table of one document type
    TypeTable {
        /// Type name the documents must match
        doc_type: String,
        /// Root structural type: keyed by own id, exact first-tag match
        root: bool,
        /// Value columns
        columns: Vec<Column>,
    },
    /// One row per branch: `stack + id` → `[child, type, name]`
    Hierarchy,
    /// One row per branch with a path: `path` → `[stack, type, child, shasum]`
    Paths,
    /// Measurements by checksum → name
    Checksums,
    /// QR codes → name
    QrCodes,
    /// `#tag` for each magic tag → name
    Tags {
        /// Magic tags without the leading `#`
        magic: Vec<String>,
    },
}

impl Projection {
    /// Rows this projection emits for one document
    pub fn emit(&self, id: &DocumentId, doc: &RawDocument) -> Vec<(Value, Value)> {
        let Some(types) = doc.get(FIELD_TYPE).and_then(Value::as_array) else {
            return Vec::new();
        };
        let types: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
        let name = doc.get(FIELD_NAME).cloned().unwrap_or(Value::Null);
        let branches = doc
            .get(FIELD_BRANCH)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        match self {
            Projection::TypeTable {
                doc_type,
                root,
                columns,
            } => {
                let matches = if *root {
                    types.first() == Some(&doc_type.as_str())
                } else {
                    let joined = types.join("/");
                    joined.chars().take(doc_type.chars().count()).eq(doc_type.chars())
                };
                if !matches {
                    return Vec::new();
                }
                let key = if *root {
                    Value::String(id.to_string())
                } else {
                    branches
                        .first()
                        .and_then(|branch| branch.get("stack"))
                        .and_then(|stack| stack.get(0))
                        .cloned()
                        .unwrap_or(Value::Null)
                };
                let values = columns.iter().map(|column| column.evaluate(doc)).collect();
                vec![(key, Value::Array(values))]
            }
            Projection::Hierarchy => branches
                .iter()
                .map(|branch| {
                    let mut key = string_list(branch.get("stack"));
                    key.push(id.to_string());
                    let child = branch.get("child").cloned().unwrap_or(Value::Null);
                    (
                        Value::String(key.join(" ")),
                        json!([child, types, name]),
                    )
                })
                .collect(),
            Projection::Paths => {
                if doc.get(FIELD_BRANCH).is_none() {
                    return Vec::new();
                }
                let shasum = doc.get(FIELD_SHASUM).cloned().unwrap_or(json!(""));
                branches
                    .iter()
                    .filter_map(|branch| {
                        let path = branch.get("path").filter(|path| !path.is_null())?;
                        let stack = branch.get("stack").cloned().unwrap_or(json!([]));
                        let child = branch.get("child").cloned().unwrap_or(Value::Null);
                        Some((path.clone(), json!([stack, types, child, shasum])))
                    })
                    .collect()
            }
            Projection::Checksums => {
                if types.first() != Some(&"measurement") {
                    return Vec::new();
                }
                let shasum = doc.get(FIELD_SHASUM).cloned().unwrap_or(Value::Null);
                vec![(shasum, name)]
            }
            Projection::QrCodes => string_list(doc.get(FIELD_QR_CODE))
                .into_iter()
                .map(|code| (Value::String(code), name.clone()))
                .collect(),
            Projection::Tags { magic } => string_list(doc.get(FIELD_TAGS))
                .into_iter()
                .filter(|tag| {
                    tag.strip_prefix('#')
                        .map(|bare| magic.iter().any(|m| m == bare))
                        .unwrap_or(false)
                })
                .map(|tag| (Value::String(tag), name.clone()))
                .collect(),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A named view: map source plus its declarative projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    /// Map-function source
    pub map: String,
    /// Same rule, evaluable without a JavaScript runtime
    pub projection: Projection,
}

/// Store-level container of views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignDocument {
    /// Design name (without the `_design/` prefix)
    pub name: String,
    /// View name → definition
    pub views: BTreeMap<String, ViewDefinition>,
}

impl DesignDocument {
    /// Empty design document
    pub fn new(name: impl Into<String>) -> Self {
        DesignDocument {
            name: name.into(),
            views: BTreeMap::new(),
        }
    }

    /// Add a view
    pub fn with_view(mut self, name: impl Into<String>, view: ViewDefinition) -> Self {
        self.views.insert(name.into(), view);
        self
    }
}

/// Key selection for view queries
#[derive(Debug, Clone, PartialEq)]
pub enum ViewKey {
    /// Every row
    All,
    /// Rows whose key equals the value
    Exact(Value),
    /// Rows whose string key starts with the prefix
    Prefix(String),
}

impl ViewKey {
    /// Whether a row key is selected
    pub fn matches(&self, key: &Value) -> bool {
        match self {
            ViewKey::All => true,
            ViewKey::Exact(expected) => key == expected,
            ViewKey::Prefix(prefix) => key
                .as_str()
                .map(|key| key.starts_with(prefix.as_str()))
                .unwrap_or(false),
        }
    }
}

/// One query result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Emitted key
    pub key: Value,
    /// Emitted value
    pub value: Value,
    /// Emitting document
    pub id: DocumentId,
}

/// Total order over JSON keys
pub fn collate(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y) {
                let ordering = collate(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Sort rows by key, then by document id
pub fn sort_rows(rows: &mut [ViewRow]) {
    rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));
}
