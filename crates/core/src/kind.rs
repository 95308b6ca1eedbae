//! Document kinds
//!
//! A document's `-type` sequence starts with either a structural level tag
//! (`x0`, `x1`, ...) or a leaf type name (`measurement`, `sample`, ...).
//! The checker and the view compiler branch on this distinction constantly, so
//! it is decoded once into [`DocumentKind`].

use std::fmt;

/// Tag of the structural type at hierarchy level 0 (projects)
pub const ROOT_TYPE: &str = "x0";

/// Decoded first element of a document's type sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// A rung of the project hierarchy; the payload is the level (`x1` → 1)
    Structural(u32),
    /// Measurement record, backed by a data file
    Measurement,
    /// Physical sample, identified by QR codes
    Sample,
    /// Written procedure
    Procedure,
    /// Instrument record
    Instrument,
    /// Any other user-defined leaf type
    Other(String),
}

impl DocumentKind {
    /// Decode a single type tag
    pub fn parse(tag: &str) -> Self {
        if let Some(level) = tag.strip_prefix('x') {
            if !level.is_empty() && level.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(level) = level.parse() {
                    return DocumentKind::Structural(level);
                }
            }
        }
        match tag {
            "measurement" => DocumentKind::Measurement,
            "sample" => DocumentKind::Sample,
            "procedure" => DocumentKind::Procedure,
            "instrument" => DocumentKind::Instrument,
            other => DocumentKind::Other(other.to_string()),
        }
    }

    /// Decode a type sequence; `None` when it is empty
    pub fn from_types(types: &[String]) -> Option<Self> {
        types.first().map(|tag| Self::parse(tag))
    }

    /// True for `x0`, `x1`, ...
    pub fn is_structural(&self) -> bool {
        matches!(self, DocumentKind::Structural(_))
    }

    /// True for the top level of the hierarchy (`x0`)
    pub fn is_root(&self) -> bool {
        matches!(self, DocumentKind::Structural(0))
    }

    /// Kinds that may legitimately live outside any project
    pub fn may_be_unparented(&self) -> bool {
        matches!(self, DocumentKind::Procedure | DocumentKind::Sample)
    }

    /// Prefix used when generating ids for new documents of this kind
    pub fn id_prefix(&self) -> String {
        match self {
            DocumentKind::Structural(_) => "x".to_string(),
            other => other
                .to_string()
                .chars()
                .find(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase().to_string())
                .unwrap_or_else(|| "d".to_string()),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Structural(level) => write!(f, "x{}", level),
            DocumentKind::Measurement => f.write_str("measurement"),
            DocumentKind::Sample => f.write_str("sample"),
            DocumentKind::Procedure => f.write_str("procedure"),
            DocumentKind::Instrument => f.write_str("instrument"),
            DocumentKind::Other(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structural_levels() {
        assert_eq!(DocumentKind::parse("x0"), DocumentKind::Structural(0));
        assert_eq!(DocumentKind::parse("x12"), DocumentKind::Structural(12));
        assert!(DocumentKind::parse("x0").is_root());
        assert!(!DocumentKind::parse("x1").is_root());
    }

    #[test]
    fn x_prefixed_names_are_not_structural() {
        assert_eq!(
            DocumentKind::parse("xray"),
            DocumentKind::Other("xray".to_string())
        );
        assert!(!DocumentKind::parse("x").is_structural());
    }

    #[test]
    fn leaf_kinds() {
        assert_eq!(DocumentKind::parse("measurement"), DocumentKind::Measurement);
        assert!(DocumentKind::parse("sample").may_be_unparented());
        assert!(!DocumentKind::parse("measurement").may_be_unparented());
    }

    #[test]
    fn empty_type_sequence_has_no_kind() {
        assert_eq!(DocumentKind::from_types(&[]), None);
        let types = vec!["measurement".to_string(), "tif".to_string()];
        assert_eq!(DocumentKind::from_types(&types), Some(DocumentKind::Measurement));
    }

    #[test]
    fn id_prefixes() {
        assert_eq!(DocumentKind::Structural(2).id_prefix(), "x");
        assert_eq!(DocumentKind::Measurement.id_prefix(), "m");
        assert_eq!(DocumentKind::Other("Workflow".into()).id_prefix(), "w");
        assert_eq!(DocumentKind::Other("_".into()).id_prefix(), "d");
    }
}
