//! Editable type schema ("ontology" / data hierarchy)
//!
//! The schema lives in one singleton document. Every key that does not start
//! with `_` or `-` is a document type; its value describes the type's
//! metadata groups and attachment slots. The `default` metadata group drives
//! view compilation.

use crate::document::RawDocument;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Metadata group used for view columns and required-field checks
pub const DEFAULT_GROUP: &str = "default";

/// Fields every type's default group must define
pub const REQUIRED_FIELDS: [&str; 2] = ["-name", "-tags"];

/// Top-level schema keys from old notebooks that are no longer used
pub const OBSOLETE_KEYS: [&str; 1] = ["-hierarchy-"];

/// Old type names and their structural replacements
pub const LEGACY_RENAMES: [(&str, &str); 3] = [("project", "x0"), ("step", "x1"), ("task", "x2")];

/// One metadata field of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldDefinition {
    /// Field key; definitions without one are ignored by views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Prompt shown by the editor
    #[serde(default)]
    pub query: String,
    /// Whether the editor insists on a value
    #[serde(default)]
    pub mandatory: bool,
    /// Physical unit
    #[serde(default)]
    pub unit: String,
    /// Semantic annotation
    #[serde(rename = "IRI", default)]
    pub iri: String,
    /// Allowed values, if restricted
    #[serde(rename = "list", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl FieldDefinition {
    /// Field with just a name
    pub fn named(name: impl Into<String>) -> Self {
        FieldDefinition {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Name with surrounding whitespace removed; `None` if empty
    pub fn trimmed_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Attachment slot of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttachmentSlot {
    /// Field the attachment is stored under
    #[serde(default)]
    pub location: String,
    /// Document type the slot links to
    #[serde(rename = "docType", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
}

/// Definition of one document type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TypeDefinition {
    /// Semantic annotation
    #[serde(rename = "IRI", default)]
    pub iri: String,
    /// Human readable title
    #[serde(default)]
    pub title: String,
    /// Icon name
    #[serde(default)]
    pub icon: String,
    /// Keyboard shortcut
    #[serde(default)]
    pub shortcut: String,
    /// Metadata group name → ordered field list
    #[serde(default)]
    pub meta: BTreeMap<String, Vec<FieldDefinition>>,
    /// Attachment slots
    #[serde(default)]
    pub attachments: Vec<AttachmentSlot>,
}

impl TypeDefinition {
    /// Type whose default group holds the given fields
    pub fn with_default_fields<'a>(title: &str, names: impl IntoIterator<Item = &'a str>) -> Self {
        let fields = names.into_iter().map(FieldDefinition::named).collect();
        TypeDefinition {
            title: title.to_string(),
            meta: BTreeMap::from([(DEFAULT_GROUP.to_string(), fields)]),
            ..Default::default()
        }
    }

    /// Fields of the default metadata group
    pub fn default_fields(&self) -> &[FieldDefinition] {
        self.meta.get(DEFAULT_GROUP).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Problem found while validating a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    /// Default group lacks one of [`REQUIRED_FIELDS`]
    MissingRequired {
        /// Type name
        doc_type: String,
        /// Missing field
        field: String,
    },
    /// Field definition with an empty or whitespace name
    EmptyFieldName {
        /// Type name
        doc_type: String,
        /// Metadata group
        group: String,
        /// Position within the group
        index: usize,
    },
    /// Same field name defined more than once in a type
    DuplicateField {
        /// Type name
        doc_type: String,
        /// Field name
        field: String,
    },
}

/// All document type definitions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Type name → definition
    pub types: BTreeMap<String, TypeDefinition>,
}

impl Schema {
    /// Empty schema
    pub fn new() -> Self {
        Schema::default()
    }

    /// Add or replace a type
    pub fn with_type(mut self, name: impl Into<String>, definition: TypeDefinition) -> Self {
        self.types.insert(name.into(), definition);
        self
    }

    /// Parse the schema singleton document
    pub fn from_raw(raw: &RawDocument) -> Result<Self> {
        let mut types = BTreeMap::new();
        for (key, value) in raw {
            if !is_type_key(key) {
                continue;
            }
            let definition: TypeDefinition = serde_json::from_value(value.clone())
                .map_err(|e| Error::SchemaMissing(format!("type {:?}: {}", key, e)))?;
            types.insert(key.clone(), definition);
        }
        Ok(Schema { types })
    }

    /// Serialize the type entries (without `_id`/`_rev`)
    pub fn to_raw(&self) -> Result<RawDocument> {
        let mut raw = RawDocument::new();
        for (name, definition) in &self.types {
            raw.insert(name.clone(), serde_json::to_value(definition)?);
        }
        Ok(raw)
    }

    /// Definition of a type
    pub fn get(&self, doc_type: &str) -> Option<&TypeDefinition> {
        self.types.get(doc_type)
    }

    /// Structural issues in the type definitions
    ///
    /// Empty-name and duplicate checks are independent: a whitespace-only
    /// name is reported as empty and left out of duplicate grouping.
    pub fn validate(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        for (doc_type, definition) in &self.types {
            let defaults: BTreeSet<&str> = definition
                .default_fields()
                .iter()
                .filter_map(FieldDefinition::trimmed_name)
                .collect();
            for required in REQUIRED_FIELDS {
                if !defaults.contains(required) {
                    issues.push(SchemaIssue::MissingRequired {
                        doc_type: doc_type.clone(),
                        field: required.to_string(),
                    });
                }
            }

            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for (group, fields) in &definition.meta {
                for (index, field) in fields.iter().enumerate() {
                    match field.trimmed_name() {
                        Some(name) => *counts.entry(name).or_default() += 1,
                        None => issues.push(SchemaIssue::EmptyFieldName {
                            doc_type: doc_type.clone(),
                            group: group.clone(),
                            index,
                        }),
                    }
                }
            }
            for (field, count) in counts {
                if count > 1 {
                    issues.push(SchemaIssue::DuplicateField {
                        doc_type: doc_type.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
        issues
    }

    /// Types whose names contain duplicated metadata fields
    pub fn types_with_duplicate_metadata(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .validate()
            .into_iter()
            .filter_map(|issue| match issue {
                SchemaIssue::DuplicateField { doc_type, .. } => Some(doc_type),
                _ => None,
            })
            .collect();
        types.dedup();
        types
    }
}

/// Whether a top-level key of the singleton names a document type
pub fn is_type_key(key: &str) -> bool {
    !key.starts_with('_') && !key.starts_with('-')
}

/// Rewrite obsolete shapes of a raw schema document in place
///
/// Removes [`OBSOLETE_KEYS`] and renames [`LEGACY_RENAMES`] keys unless the
/// replacement already exists. Returns one description per change made.
pub fn repair_legacy(raw: &mut RawDocument) -> Vec<String> {
    let mut changes = Vec::new();
    for key in OBSOLETE_KEYS {
        if raw.remove(key).is_some() {
            changes.push(format!("removed obsolete key {}", key));
        }
    }
    for (old, new) in LEGACY_RENAMES {
        if raw.contains_key(new) {
            continue;
        }
        if let Some(value) = raw.remove(old) {
            raw.insert(new.to_string(), value);
            changes.push(format!("renamed type {} to {}", old, new));
        }
    }
    changes
}

/// Whether a raw schema document still has legacy shapes
pub fn needs_legacy_repair(raw: &RawDocument) -> bool {
    OBSOLETE_KEYS.iter().any(|key| raw.contains_key(*key))
        || LEGACY_RENAMES
            .iter()
            .any(|(old, new)| raw.contains_key(*old) && !raw.contains_key(*new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawDocument {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_types_and_skips_reserved_keys() {
        let schema = Schema::from_raw(&raw(json!({
            "_id": "-ontology-",
            "_rev": "1-a",
            "-hierarchy-": ["x0"],
            "measurement": {
                "title": "Measurements",
                "meta": {"default": [{"name": "-name"}, {"name": "-tags"}, {"name": "image"}]}
            }
        })))
        .unwrap();
        assert_eq!(schema.types.len(), 1);
        let measurement = schema.get("measurement").unwrap();
        assert_eq!(measurement.default_fields().len(), 3);
        assert_eq!(measurement.title, "Measurements");
    }

    #[test]
    fn malformed_type_is_an_error() {
        let err = Schema::from_raw(&raw(json!({"sample": {"meta": 5}}))).unwrap_err();
        assert!(matches!(err, Error::SchemaMissing(_)));
    }

    #[test]
    fn validate_flags_missing_required_fields() {
        let schema = Schema::new()
            .with_type("sample", TypeDefinition::with_default_fields("Samples", ["-name"]));
        assert_eq!(
            schema.validate(),
            vec![SchemaIssue::MissingRequired {
                doc_type: "sample".into(),
                field: "-tags".into()
            }]
        );
    }

    #[test]
    fn empty_and_duplicate_checks_are_independent() {
        let mut definition =
            TypeDefinition::with_default_fields("Samples", ["-name", "-tags", "weight", " "]);
        definition
            .meta
            .insert("vendor".into(), vec![FieldDefinition::named("weight")]);
        let schema = Schema::new().with_type("sample", definition);
        let issues = schema.validate();
        assert!(issues.contains(&SchemaIssue::EmptyFieldName {
            doc_type: "sample".into(),
            group: "default".into(),
            index: 3
        }));
        assert!(issues.contains(&SchemaIssue::DuplicateField {
            doc_type: "sample".into(),
            field: "weight".into()
        }));
        assert_eq!(schema.types_with_duplicate_metadata(), vec!["sample".to_string()]);
    }

    #[test]
    fn legacy_repair() {
        let mut doc = raw(json!({
            "-hierarchy-": [],
            "project": {"title": "Projects"},
            "step": {"title": "Steps"},
            "x2": {"title": "Tasks"},
            "task": {"title": "old tasks"}
        }));
        assert!(needs_legacy_repair(&doc));
        let changes = repair_legacy(&mut doc);
        assert_eq!(changes.len(), 3);
        assert!(doc.contains_key("x0"));
        assert!(doc.contains_key("x1"));
        assert!(doc.contains_key("task"), "existing x2 is not overwritten");
        assert_eq!(doc["x2"]["title"], json!("Tasks"));
        assert!(!needs_legacy_repair(&doc));
    }
}
