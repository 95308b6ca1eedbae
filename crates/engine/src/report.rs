//! Consistency report: ordered, severity-tagged findings

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Purely informational
    Info,
    /// Unusual but acceptable
    OkIsh,
    /// Probably wrong, not structurally broken
    Warning,
    /// Structural invariant violated
    Hard,
}

impl Severity {
    /// Every severity, least severe first
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::OkIsh,
        Severity::Warning,
        Severity::Hard,
    ];

    fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::OkIsh => "ok-ish",
            Severity::Warning => "warning",
            Severity::Hard => "hard",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifier of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckCode {
    /// Document has no `-branch` field
    BranchMissing,
    /// Structural document placed more than once
    StructuralMultiBranch,
    /// Stack entry is not a document id
    StackEntryInvalid,
    /// Top-level placement of a non-root document
    StackEmpty,
    /// `-type` absent or empty
    TypeMissing,
    /// Numeric folder prefix differs from the sibling index
    ChildPathMismatch,
    /// Structural document without a path
    StructuralPathMissing,
    /// Non-structural document without a path
    PathMissing,
    /// Stack depth does not match the number of path segments
    StackPathLength,
    /// No ancestor branch contains this branch's path
    ParentPathMissing,
    /// `-name` absent
    NameMissing,
    /// Sample without QR codes
    QrcodeMissing,
    /// Measurement without checksum
    ShasumMissing,
    /// Measurement without thumbnail
    ImageMissing,
    /// Thumbnail is neither a raster image nor SVG
    ImageInvalid,
    /// Auditing the document failed
    AuditException,
    /// Same checksum on several measurements
    ChecksumDuplicate,
    /// Checksum view row with an empty key
    MeasurementWithoutChecksum,
    /// Schema singleton missing or malformed
    SchemaInvalid,
    /// Schema singleton still in an obsolete shape
    SchemaLegacy,
}

impl CheckCode {
    /// Kebab-case code
    pub fn as_str(self) -> &'static str {
        match self {
            CheckCode::BranchMissing => "branch-missing",
            CheckCode::StructuralMultiBranch => "structural-multi-branch",
            CheckCode::StackEntryInvalid => "stack-entry-invalid",
            CheckCode::StackEmpty => "stack-empty",
            CheckCode::TypeMissing => "type-missing",
            CheckCode::ChildPathMismatch => "child-path-mismatch",
            CheckCode::StructuralPathMissing => "structural-path-missing",
            CheckCode::PathMissing => "path-missing",
            CheckCode::StackPathLength => "stack-path-length",
            CheckCode::ParentPathMissing => "parent-path-missing",
            CheckCode::NameMissing => "name-missing",
            CheckCode::QrcodeMissing => "qrcode-missing",
            CheckCode::ShasumMissing => "shasum-missing",
            CheckCode::ImageMissing => "image-missing",
            CheckCode::ImageInvalid => "image-invalid",
            CheckCode::AuditException => "audit-exception",
            CheckCode::ChecksumDuplicate => "checksum-duplicate",
            CheckCode::MeasurementWithoutChecksum => "measurement-without-checksum",
            CheckCode::SchemaInvalid => "schema-invalid",
            CheckCode::SchemaLegacy => "schema-legacy",
        }
    }

    /// Short id used by older notebook tooling, where one exists
    pub fn legacy_id(self) -> Option<&'static str> {
        match self {
            CheckCode::BranchMissing => Some("dch01"),
            CheckCode::StructuralMultiBranch => Some("dch02"),
            CheckCode::StackEntryInvalid => Some("dch03"),
            CheckCode::TypeMissing => Some("dch04"),
            CheckCode::ChildPathMismatch => Some("dch05"),
            CheckCode::StructuralPathMissing => Some("dch06"),
            CheckCode::ParentPathMissing => Some("dch07"),
            CheckCode::NameMissing => Some("dch08"),
            CheckCode::QrcodeMissing => Some("dch09"),
            CheckCode::ShasumMissing => Some("dch10"),
            CheckCode::ImageMissing => Some("dch11"),
            CheckCode::ImageInvalid => Some("dch12"),
            CheckCode::AuditException => Some("dch13"),
            _ => None,
        }
    }
}

impl fmt::Display for CheckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One checker finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity
    pub severity: Severity,
    /// Check that fired
    pub code: CheckCode,
    /// Legacy short id of the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    /// Affected document; `None` for population-level findings
    pub document_id: Option<String>,
    /// Human readable explanation
    pub message: String,
}

impl Finding {
    /// Finding about one document
    pub fn new(
        severity: Severity,
        code: CheckCode,
        document_id: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Finding {
            severity,
            code,
            legacy_id: code.legacy_id().map(str::to_string),
            document_id: document_id.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.code)?;
        if let Some(legacy) = &self.legacy_id {
            write!(f, " ({})", legacy)?;
        }
        if let Some(id) = &self.document_id {
            write!(f, " {}", id)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered list of findings from one checker run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Report {
    /// Findings in discovery order
    pub findings: Vec<Finding>,
    /// Repairs applied during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repairs: Vec<String>,
}

impl Report {
    /// Empty report
    pub fn new() -> Self {
        Report::default()
    }

    /// Append a finding
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Append a finding from its parts
    pub fn add(
        &mut self,
        severity: Severity,
        code: CheckCode,
        document_id: Option<&str>,
        message: impl Into<String>,
    ) {
        self.push(Finding::new(severity, code, document_id, message));
    }

    /// Hard violations only
    pub fn hard_violations(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity == Severity::Hard)
    }

    /// Number of findings with `severity`
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count()
    }

    /// Findings raised by `code`
    pub fn with_code(&self, code: CheckCode) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |finding| finding.code == code)
    }

    /// True when there are no hard violations
    pub fn is_clean(&self) -> bool {
        self.count(Severity::Hard) == 0
    }

    /// JSON rendering
    pub fn to_json(&self) -> pasta_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in &self.findings {
            writeln!(f, "{}", finding)?;
        }
        for repair in &self.repairs {
            writeln!(f, "[repair] {}", repair)?;
        }
        let counts: Vec<String> = Severity::ALL
            .iter()
            .map(|severity| format!("{} {}", self.count(*severity), severity))
            .collect();
        write!(f, "{} findings: {}", self.findings.len(), counts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        let mut report = Report::new();
        report.add(Severity::Hard, CheckCode::ShasumMissing, Some("m-1"), "measurement has no shasum");
        report.add(Severity::Info, CheckCode::StackPathLength, Some("m-2"), "stack and path differ");
        report.add(Severity::Hard, CheckCode::ChecksumDuplicate, None, "abc used 2 times");
        report
    }

    #[test]
    fn counts_and_filters() {
        let report = sample();
        assert_eq!(report.count(Severity::Hard), 2);
        assert_eq!(report.count(Severity::Warning), 0);
        assert_eq!(report.hard_violations().count(), 2);
        assert_eq!(report.with_code(CheckCode::StackPathLength).count(), 1);
        assert!(!report.is_clean());
        assert!(Report::new().is_clean());
    }

    #[test]
    fn display_is_stable() {
        let text = sample().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[hard] shasum-missing (dch10) m-1: measurement has no shasum");
        assert_eq!(lines[2], "[hard] checksum-duplicate: abc used 2 times");
        assert_eq!(lines[3], "3 findings: 1 info, 0 ok-ish, 0 warning, 2 hard");
    }

    #[test]
    fn json_uses_kebab_case_codes() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"shasum-missing\""));
        assert!(json.contains("\"dch10\""));
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn severity_order() {
        assert!(Severity::Hard > Severity::Warning);
        assert!(Severity::OkIsh > Severity::Info);
        assert_eq!(Severity::OkIsh.to_string(), "ok-ish");
    }
}
