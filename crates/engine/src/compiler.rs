//! View compilation: schema → design documents
//!
//! Three design documents are produced:
//!
//! - `viewDocType`: one table view per document type, driven by the type's
//!   default metadata group
//! - `viewHierarchy`: hierarchy listing and path listing
//! - `viewIdentify`: checksum, QR-code and tag indexes
//!
//! Each view carries JavaScript map source and the equivalent [`Projection`].
//! Installing replaces a design document by delete-then-create. A failed
//! create leaves the design document missing; [`ViewCompiler::ensure_views`]
//! recreates whatever is absent.

use crate::config::{
    EngineConfig, DESIGN_HIERARCHY, DESIGN_IDENTIFY, DESIGN_TYPES, VIEW_CHECKSUM, VIEW_HIERARCHY,
    VIEW_PATHS, VIEW_QR, VIEW_TAGS,
};
use pasta_core::view::{CONTENT_PREVIEW_CHARS, IMAGE_PROBE_LEN};
use pasta_core::{
    Column, DesignDocument, DocumentKind, DocumentStore, Projection, Result, Schema,
    ViewDefinition,
};
use tracing::{debug, error, info};

// =============================================================================
// View naming
// =============================================================================

/// View name of a document type: `/` becomes `__`
pub fn type_view_name(doc_type: &str) -> String {
    doc_type.replace('/', "__")
}

// =============================================================================
// Design documents
// =============================================================================

/// Per-type table views
///
/// Structural types below the root are skipped; they are reached through the
/// hierarchy view instead.
pub fn type_design(schema: &Schema, config: &EngineConfig) -> DesignDocument {
    let mut design = DesignDocument::new(DESIGN_TYPES);
    for (doc_type, definition) in &schema.types {
        let root = doc_type == &config.root_type;
        if !root && DocumentKind::parse(doc_type).is_structural() {
            debug!(target: "pasta::compiler", doc_type = %doc_type, "structural type skipped");
            continue;
        }
        let columns: Vec<Column> = definition
            .default_fields()
            .iter()
            .filter_map(|field| field.trimmed_name())
            .take(config.table_columns_max)
            .map(Column::for_field)
            .collect();
        let projection = Projection::TypeTable {
            doc_type: doc_type.clone(),
            root,
            columns,
        };
        design = design.with_view(type_view_name(doc_type), view(projection));
    }
    design
}

/// Hierarchy and path listings
pub fn hierarchy_design() -> DesignDocument {
    DesignDocument::new(DESIGN_HIERARCHY)
        .with_view(VIEW_HIERARCHY, view(Projection::Hierarchy))
        .with_view(VIEW_PATHS, view(Projection::Paths))
}

/// Checksum, QR-code and tag indexes
pub fn identify_design(magic_tags: &[String]) -> DesignDocument {
    DesignDocument::new(DESIGN_IDENTIFY)
        .with_view(VIEW_CHECKSUM, view(Projection::Checksums))
        .with_view(VIEW_QR, view(Projection::QrCodes))
        .with_view(
            VIEW_TAGS,
            view(Projection::Tags {
                magic: magic_tags.to_vec(),
            }),
        )
}

fn view(projection: Projection) -> ViewDefinition {
    ViewDefinition {
        map: map_source(&projection),
        projection,
    }
}

// =============================================================================
// JavaScript map source
// =============================================================================

/// JavaScript map function equivalent to `projection`
pub fn map_source(projection: &Projection) -> String {
    let body = match projection {
        Projection::TypeTable {
            doc_type,
            root,
            columns,
        } => {
            let values: Vec<String> = columns.iter().map(column_source).collect();
            let values = values.join(", ");
            if *root {
                format!(
                    "if (doc['-type'][0]=={}) {{emit(doc._id, [{}]);}}",
                    quote(doc_type),
                    values
                )
            } else {
                format!(
                    "if (doc['-type'].join('/').substring(0, {})=={}) {{\
                     var key = (doc['-branch'] && doc['-branch'].length>0 && doc['-branch'][0].stack.length>0) ? doc['-branch'][0].stack[0] : null; \
                     emit(key, [{}]);}}",
                    doc_type.chars().count(),
                    quote(doc_type),
                    values
                )
            }
        }
        Projection::Hierarchy => "if ('-type' in doc) {\
             (doc['-branch'] || []).forEach(function (b) {\
             emit(b.stack.concat([doc._id]).join(' '), [b.child, doc['-type'], doc['-name']]);});}"
            .to_string(),
        Projection::Paths => "if ('-type' in doc && '-branch' in doc) {\
             doc['-branch'].forEach(function (b) {\
             if (b.path) {emit(b.path, [b.stack, doc['-type'], b.child, doc.shasum === undefined ? '' : doc.shasum]);}});}"
            .to_string(),
        Projection::Checksums => {
            "if (doc['-type'][0]=='measurement') {emit(doc.shasum, doc['-name']);}".to_string()
        }
        Projection::QrCodes => "if (doc.qrCode) {\
             doc.qrCode.forEach(function (code) {emit(code, doc['-name']);});}"
            .to_string(),
        Projection::Tags { magic } => {
            let tags: Vec<String> = magic.iter().map(|tag| quote(&format!("#{}", tag))).collect();
            format!(
                "if (doc['-tags']) {{doc['-tags'].forEach(function (tag) {{\
                 if ([{}].indexOf(tag) > -1) {{emit(tag, doc['-name']);}}}});}}",
                tags.join(", ")
            )
        }
    };
    format!("function (doc) {{if (Array.isArray(doc['-type'])) {{{}}}}}", body)
}

fn column_source(column: &Column) -> String {
    match column {
        Column::Image => format!(
            "(typeof doc.image === 'string' && doc.image.length>{}).toString()",
            IMAGE_PROBE_LEN
        ),
        Column::Tags => "(doc['-tags'] || []).join(' ')".to_string(),
        Column::Type => "doc['-type'].slice(1).join('/')".to_string(),
        Column::Content => format!(
            "(doc.content ? doc.content.substring(0, {}) : '')",
            CONTENT_PREVIEW_CHARS
        ),
        Column::Nested(segments) => {
            let mut access = String::from("doc");
            let mut guards = Vec::new();
            for segment in segments {
                access.push_str(&format!("[{}]", quote(segment)));
                guards.push(format!("{} != null", access));
            }
            format!("(({}) ? {} : '')", guards.join(" && "), access)
        }
        Column::Field(name) => format!("doc[{}]", quote(name)),
    }
}

fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

// =============================================================================
// Installation
// =============================================================================

/// Writes compiled views into a store
pub struct ViewCompiler<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: DocumentStore + ?Sized> ViewCompiler<'a, S> {
    /// Compiler writing into `store`
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        ViewCompiler { store, config }
    }

    /// Every design document for `schema`
    pub fn designs(&self, schema: &Schema) -> Vec<DesignDocument> {
        vec![
            type_design(schema, self.config),
            hierarchy_design(),
            identify_design(&self.config.magic_tags),
        ]
    }

    /// Replace every design document; returns the names written
    ///
    /// Stops at the first failure. The failing design document may already
    /// be deleted; run [`ViewCompiler::ensure_views`] or compile again.
    pub fn compile(&self, schema: &Schema) -> Result<Vec<String>> {
        let mut written = Vec::new();
        for design in self.designs(schema) {
            if let Err(e) = self.store.replace_design_document(&design) {
                error!(
                    target: "pasta::compiler",
                    design = %design.name,
                    error = %e,
                    "design document replacement failed"
                );
                return Err(e);
            }
            debug!(
                target: "pasta::compiler",
                design = %design.name,
                views = design.views.len(),
                "design document replaced"
            );
            written.push(design.name);
        }
        info!(target: "pasta::compiler", designs = written.len(), "views compiled");
        Ok(written)
    }

    /// Create design documents that are missing; returns the names created
    pub fn ensure_views(&self, schema: &Schema) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for design in self.designs(schema) {
            if self.store.design_document(&design.name)?.is_some() {
                continue;
            }
            if let Err(e) = self.store.put_design_document(&design) {
                error!(
                    target: "pasta::compiler",
                    design = %design.name,
                    error = %e,
                    "design document re-creation failed"
                );
                return Err(e);
            }
            info!(target: "pasta::compiler", design = %design.name, "missing design document recreated");
            created.push(design.name);
        }
        Ok(created)
    }
}
