//! Consistency checker: full-population structural audit
//!
//! Walks every stored document once, then the checksum index once. Findings
//! are collected into a [`Report`]; a document that cannot be audited is
//! reported and skipped, never aborting the scan. Only an unreadable store
//! fails the whole run.
//!
//! Nothing is written unless `repair` is requested. Repairs are limited to:
//! - legacy shapes of the schema singleton (see [`repair_legacy`])
//! - documents storing their display name under an unprefixed `name` key

use crate::config::{EngineConfig, DESIGN_IDENTIFY, VIEW_CHECKSUM};
use crate::image::{classify, ImageShape};
use crate::report::{CheckCode, Report, Severity};
use pasta_core::branch::{basename, numeric_prefix};
use chrono::Utc;
use pasta_core::document::{
    FIELD_BRANCH, FIELD_CLIENT, FIELD_DATE, FIELD_ID, FIELD_NAME, FIELD_REV,
};
use pasta_core::schema::{needs_legacy_repair, repair_legacy};
use pasta_core::{
    Branch, Document, DocumentId, DocumentKind, DocumentStore, Projection, RawDocument,
    Result, RevisionToken, Schema, SchemaIssue, ViewKey, ViewRow, NO_POSITION,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Unprefixed name key written by old clients
const LEGACY_NAME_FIELD: &str = "name";

/// Audits a document population
pub struct ConsistencyChecker<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: DocumentStore + ?Sized> ConsistencyChecker<'a, S> {
    /// Checker reading from `store`
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        ConsistencyChecker { store, config }
    }

    /// Audit every document
    ///
    /// # Errors
    ///
    /// Only when the population cannot be listed. Per-document failures
    /// become `audit-exception` findings.
    pub fn check(&self, repair: bool) -> Result<Report> {
        let population = self.store.iterate_all()?;
        let mut report = Report::new();
        info!(target: "pasta::checker", documents = population.len(), repair, "audit started");

        for raw in &population {
            let Some(id) = raw.get(FIELD_ID).and_then(Value::as_str) else {
                report.add(
                    Severity::Hard,
                    CheckCode::AuditException,
                    None,
                    "document without _id",
                );
                continue;
            };
            if id.starts_with(pasta_core::id::DESIGN_PREFIX) {
                debug!(target: "pasta::checker", id, "design document skipped");
                continue;
            }
            if id == self.config.schema_id {
                debug!(target: "pasta::checker", id, "schema document skipped");
                if let Err(e) = self.check_schema(id, raw, repair, &mut report) {
                    report.add(Severity::Hard, CheckCode::AuditException, Some(id), e.to_string());
                }
                continue;
            }
            if let Err(e) = self.check_document(id, raw, repair, &mut report) {
                warn!(target: "pasta::checker", id, error = %e, "document could not be audited");
                report.add(Severity::Hard, CheckCode::AuditException, Some(id), e.to_string());
            }
        }

        self.check_checksums(&population, &mut report);

        info!(
            target: "pasta::checker",
            findings = report.findings.len(),
            hard = report.count(Severity::Hard),
            repairs = report.repairs.len(),
            "audit finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Schema singleton
    // =========================================================================

    fn check_schema(
        &self,
        id: &str,
        raw: &RawDocument,
        repair: bool,
        report: &mut Report,
    ) -> Result<()> {
        if needs_legacy_repair(raw) {
            if repair {
                let mut repaired = raw.clone();
                let changes = repair_legacy(&mut repaired);
                repaired.insert(
                    FIELD_CLIENT.to_string(),
                    Value::String(self.config.caller_context().to_string()),
                );
                repaired.insert(FIELD_DATE.to_string(), Value::String(Utc::now().to_rfc3339()));
                self.store
                    .write_raw(&DocumentId::new(id)?, repaired, Some(&stored_token(raw)))?;
                for change in changes {
                    info!(target: "pasta::checker", id, change = %change, "schema repaired");
                    report.repairs.push(format!("{}: {}", id, change));
                }
            } else {
                report.add(
                    Severity::Warning,
                    CheckCode::SchemaLegacy,
                    Some(id),
                    "schema uses obsolete keys; run with repair",
                );
            }
        }

        let schema = match Schema::from_raw(raw) {
            Ok(schema) => schema,
            Err(e) => {
                report.add(Severity::Hard, CheckCode::SchemaInvalid, Some(id), e.to_string());
                return Ok(());
            }
        };
        for issue in schema.validate() {
            let message = match issue {
                SchemaIssue::MissingRequired { doc_type, field } => {
                    format!("type {} lacks required field {}", doc_type, field)
                }
                SchemaIssue::EmptyFieldName {
                    doc_type,
                    group,
                    index,
                } => format!("type {} group {} field {} has an empty name", doc_type, group, index),
                SchemaIssue::DuplicateField { doc_type, field } => {
                    format!("type {} defines {} more than once", doc_type, field)
                }
            };
            report.add(Severity::Warning, CheckCode::SchemaInvalid, Some(id), message);
        }
        Ok(())
    }

    // =========================================================================
    // Documents
    // =========================================================================

    fn check_document(
        &self,
        id: &str,
        raw: &RawDocument,
        repair: bool,
        report: &mut Report,
    ) -> Result<()> {
        let mut doc = Document::from_raw(raw.clone())?;

        if repair && doc.name.is_none() {
            if let Some(Value::String(name)) = doc.extra.remove(LEGACY_NAME_FIELD) {
                doc.name = Some(name);
                doc.client = Some(self.config.caller_context().to_string());
                doc.date = Some(Utc::now().to_rfc3339());
                let token = doc.revision.clone();
                self.store.write(&doc, token.as_ref())?;
                info!(target: "pasta::checker", id, "name promoted to -name");
                report
                    .repairs
                    .push(format!("{}: promoted name to {}", id, FIELD_NAME));
            }
        }

        let kind = doc.kind();
        let structural = kind.as_ref().map_or(false, DocumentKind::is_structural);
        let root = doc.types.as_deref().and_then(<[String]>::first) == Some(&self.config.root_type);

        match &doc.branch {
            None => report.add(
                Severity::Hard,
                CheckCode::BranchMissing,
                Some(id),
                format!("{} missing", FIELD_BRANCH),
            ),
            Some(branches) => {
                if structural && branches.len() > 1 {
                    report.add(
                        Severity::Hard,
                        CheckCode::StructuralMultiBranch,
                        Some(id),
                        format!("structural document has {} branches", branches.len()),
                    );
                }
                for branch in branches {
                    self.check_branch(id, kind.as_ref(), root, branch, report)?;
                }
            }
        }

        if kind.is_none() {
            report.add(Severity::Hard, CheckCode::TypeMissing, Some(id), "-type missing or empty");
        }
        if doc.name.is_none() {
            report.add(Severity::Hard, CheckCode::NameMissing, Some(id), "-name missing");
        }

        match kind {
            Some(DocumentKind::Sample) if doc.qr_code.is_none() => {
                report.add(Severity::Hard, CheckCode::QrcodeMissing, Some(id), "sample has no qrCode");
            }
            Some(DocumentKind::Measurement) => {
                if doc.shasum.is_none() {
                    report.add(
                        Severity::Hard,
                        CheckCode::ShasumMissing,
                        Some(id),
                        "measurement has no shasum",
                    );
                }
                match doc.image.as_deref().map(classify) {
                    None => report.add(
                        Severity::Hard,
                        CheckCode::ImageMissing,
                        Some(id),
                        "measurement has no image",
                    ),
                    Some(ImageShape::Empty) => report.add(
                        Severity::Info,
                        CheckCode::ImageMissing,
                        Some(id),
                        "image is the empty placeholder",
                    ),
                    Some(ImageShape::Invalid) => report.add(
                        Severity::Hard,
                        CheckCode::ImageInvalid,
                        Some(id),
                        "image is neither a raster image nor SVG",
                    ),
                    Some(ImageShape::Raster(_)) | Some(ImageShape::Svg) => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_branch(
        &self,
        id: &str,
        kind: Option<&DocumentKind>,
        root: bool,
        branch: &Branch,
        report: &mut Report,
    ) -> Result<()> {
        let structural = kind.map_or(false, DocumentKind::is_structural);
        let measurement = kind == Some(&DocumentKind::Measurement);

        for entry in &branch.stack {
            if !DocumentId::is_canonical_str(entry) {
                report.add(
                    Severity::Hard,
                    CheckCode::StackEntryInvalid,
                    Some(id),
                    format!("stack entry {:?} is not a document id", entry),
                );
            }
        }

        if branch.stack.is_empty() && !root {
            if structural || measurement {
                report.add(Severity::Warning, CheckCode::StackEmpty, Some(id), "no parent");
            } else {
                let unparented = kind.map_or(false, DocumentKind::may_be_unparented);
                let message = if unparented {
                    "no parent for procedure/sample"
                } else {
                    "no parent"
                };
                report.add(Severity::OkIsh, CheckCode::StackEmpty, Some(id), message);
            }
        }

        let Some(path) = branch.path.as_deref() else {
            let (severity, code, message) = if structural {
                (Severity::Hard, CheckCode::StructuralPathMissing, "structural document without path")
            } else if measurement {
                (Severity::Warning, CheckCode::PathMissing, "measurement without data file")
            } else {
                (Severity::Info, CheckCode::PathMissing, "no path")
            };
            report.add(severity, code, Some(id), message);
            return Ok(());
        };

        if structural {
            if let Some(prefix) = basename(path).and_then(numeric_prefix) {
                if prefix != branch.child {
                    report.add(
                        Severity::Hard,
                        CheckCode::ChildPathMismatch,
                        Some(id),
                        format!("path prefix {} differs from child {}", prefix, branch.child),
                    );
                }
            }
        }

        if branch.depth_matches_path() == Some(false) {
            report.add(
                Severity::Info,
                CheckCode::StackPathLength,
                Some(id),
                format!("stack length {} does not fit path {}", branch.stack.len(), path),
            );
        }

        if branch.child != NO_POSITION {
            for ancestor in &branch.stack {
                if !self.ancestor_contains(ancestor, path)? {
                    report.add(
                        Severity::Hard,
                        CheckCode::ParentPathMissing,
                        Some(id),
                        format!("no branch of {} contains {}", ancestor, path),
                    );
                }
            }
        }
        Ok(())
    }

    /// Whether some branch of `ancestor` has a path that prefixes `path`
    fn ancestor_contains(&self, ancestor: &str, path: &str) -> Result<bool> {
        let Ok(ancestor_id) = DocumentId::new(ancestor) else {
            return Ok(false);
        };
        let Some(raw) = self.store.get_raw(&ancestor_id)? else {
            return Ok(false);
        };
        let branches: Vec<Branch> = match raw.get(FIELD_BRANCH) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(branches.iter().any(|branch| {
            branch
                .path
                .as_deref()
                .map_or(false, |prefix| path.starts_with(prefix))
        }))
    }

    // =========================================================================
    // Checksum index
    // =========================================================================

    fn check_checksums(&self, population: &[RawDocument], report: &mut Report) {
        let rows = match self
            .store
            .query_view(DESIGN_IDENTIFY, VIEW_CHECKSUM, &ViewKey::All)
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    target: "pasta::checker",
                    error = %e,
                    "checksum view unavailable, indexing population directly"
                );
                checksum_rows(population)
            }
        };

        let mut by_checksum: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for row in &rows {
            match row.key.as_str() {
                Some("") => report.add(
                    Severity::Info,
                    CheckCode::MeasurementWithoutChecksum,
                    Some(row.id.as_str()),
                    "measurement without checksum",
                ),
                Some(shasum) => by_checksum.entry(shasum).or_default().push(row.id.as_str()),
                None => {}
            }
        }
        for (shasum, ids) in by_checksum {
            if ids.len() > 1 {
                report.add(
                    Severity::Hard,
                    CheckCode::ChecksumDuplicate,
                    None,
                    format!("shasum {} shared by {}", shasum, ids.join(", ")),
                );
            }
        }
    }
}

/// Checksum rows computed without the stored view
fn checksum_rows(population: &[RawDocument]) -> Vec<ViewRow> {
    let mut rows: Vec<ViewRow> = population
        .iter()
        .filter_map(|raw| {
            let id = DocumentId::new(raw.get(FIELD_ID)?.as_str()?).ok()?;
            (!id.is_design()).then_some((id, raw))
        })
        .flat_map(|(id, raw)| {
            Projection::Checksums
                .emit(&id, raw)
                .into_iter()
                .map(move |(key, value)| ViewRow {
                    key,
                    value,
                    id: id.clone(),
                })
        })
        .collect();
    pasta_core::view::sort_rows(&mut rows);
    rows
}

fn stored_token(raw: &RawDocument) -> RevisionToken {
    RevisionToken::from_string(raw.get(FIELD_REV).and_then(Value::as_str).unwrap_or_default())
}
