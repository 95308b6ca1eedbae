//! Branch records
//!
//! A document may sit at several places in the project hierarchy. Each place
//! is a [`Branch`]: the ancestor ids (root-most first), an optional
//! filesystem-like path and the sibling position under the direct parent.
//!
//! ## Invariant
//!
//! Whenever `path` is set and `child != NO_POSITION`:
//! `stack.len() + 1 == number of '/'-delimited path segments`.
//! This is a soft invariant; the checker reports violations without failing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sibling index meaning "no positional significance"
pub const NO_POSITION: u32 = 9999;

/// Placement of one document within the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Ancestor ids, root-most first; empty for top-level documents
    #[serde(default)]
    pub stack: Vec<String>,
    /// On-disk or logical position, if any
    #[serde(default)]
    pub path: Option<String>,
    /// Sibling order under the immediate parent
    #[serde(default = "default_child")]
    pub child: u32,
}

fn default_child() -> u32 {
    NO_POSITION
}

impl Branch {
    /// Create a branch record
    pub fn new(stack: Vec<String>, path: Option<String>, child: u32) -> Self {
        Branch { stack, path, child }
    }

    /// Top-level branch without path or position
    pub fn unplaced() -> Self {
        Branch::new(Vec::new(), None, NO_POSITION)
    }

    /// True when the sibling index carries meaning
    pub fn is_positioned(&self) -> bool {
        self.child != NO_POSITION
    }

    /// Path segments, ignoring empty ones; `None` without a path
    pub fn segments(&self) -> Option<Vec<&str>> {
        self.path.as_deref().map(path_segments)
    }

    /// Whether `stack.len() + 1` matches the segment count (None without path)
    pub fn depth_matches_path(&self) -> Option<bool> {
        self.segments()
            .map(|segments| segments.len() == self.stack.len() + 1)
    }
}

/// Split a path into its non-empty `/`-delimited segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Last non-empty segment of a path
pub fn basename(path: &str) -> Option<&str> {
    path.split('/').filter(|s| !s.is_empty()).last()
}

/// Leading decimal digits of a path segment, e.g. `"03_Results"` → 3
///
/// Returns `None` when the segment does not start with a digit or the prefix
/// does not fit in a `u32`.
pub fn numeric_prefix(segment: &str) -> Option<u32> {
    let end = segment
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(segment.len());
    if end == 0 {
        return None;
    }
    segment[..end].parse().ok()
}

/// Operation requested by a branch change payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchOp {
    /// Add a placement (idempotent on an existing path)
    Create,
    /// Move or rename a placement
    Update,
    /// Remove placements with a given path
    Delete,
}

impl FromStr for BranchOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" | "c" => Ok(BranchOp::Create),
            "update" | "u" => Ok(BranchOp::Update),
            "delete" | "d" => Ok(BranchOp::Delete),
            other => Err(Error::InvalidBranchOp(other.to_string())),
        }
    }
}

impl fmt::Display for BranchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BranchOp::Create => "create",
            BranchOp::Update => "update",
            BranchOp::Delete => "delete",
        })
    }
}

/// Branch-like object carried by an update payload
///
/// `op` and `oldpath` are transient: they steer the merge and are never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchChange {
    /// What to do with the placement
    pub op: BranchOp,
    /// New ancestor ids
    #[serde(default)]
    pub stack: Vec<String>,
    /// New path
    #[serde(default)]
    pub path: Option<String>,
    /// New sibling index; `NO_POSITION` when absent
    #[serde(default)]
    pub child: Option<u32>,
    /// Previous path prefix to rewrite (update only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldpath: Option<String>,
}

impl BranchChange {
    /// Change with the given operation and placement
    pub fn new(op: BranchOp, stack: Vec<String>, path: Option<String>, child: Option<u32>) -> Self {
        BranchChange {
            op,
            stack,
            path,
            child,
            oldpath: None,
        }
    }

    /// Attach the previous path prefix of a move
    pub fn with_oldpath(mut self, oldpath: impl Into<String>) -> Self {
        self.oldpath = Some(oldpath.into());
        self
    }

    /// Parse a JSON branch payload, rejecting unknown `op` values
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidDocument("branch change must be an object".into()))?;
        let op = object
            .get("op")
            .and_then(|op| op.as_str())
            .ok_or_else(|| Error::InvalidBranchOp(String::new()))?
            .parse::<BranchOp>()?;
        let mut object = object.clone();
        object.insert("op".to_string(), serde_json::Value::String(op.to_string()));
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }

    /// Persistable branch record (transient fields dropped)
    pub fn to_branch(&self) -> Branch {
        Branch {
            stack: self.stack.clone(),
            path: self.path.clone(),
            child: self.child.unwrap_or(NO_POSITION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segments_ignore_empty_parts() {
        assert_eq!(path_segments("/a/b"), vec!["a", "b"]);
        assert_eq!(path_segments("a//b/"), vec!["a", "b"]);
        assert!(path_segments("").is_empty());
    }

    #[test]
    fn depth_invariant() {
        let branch = Branch::new(vec!["root".into()], Some("/a/b".into()), 0);
        assert_eq!(branch.depth_matches_path(), Some(true));
        let branch = Branch::new(vec![], Some("a/b".into()), 0);
        assert_eq!(branch.depth_matches_path(), Some(false));
        assert_eq!(Branch::unplaced().depth_matches_path(), None);
    }

    #[test]
    fn basename_and_numeric_prefix() {
        assert_eq!(basename("00_Project/03_Results"), Some("03_Results"));
        assert_eq!(basename("/"), None);
        assert_eq!(numeric_prefix("03_Results"), Some(3));
        assert_eq!(numeric_prefix("Results"), None);
        assert_eq!(numeric_prefix("99999999999999_x"), None);
    }

    #[test]
    fn op_parsing() {
        assert_eq!("create".parse::<BranchOp>().unwrap(), BranchOp::Create);
        assert_eq!("u".parse::<BranchOp>().unwrap(), BranchOp::Update);
        assert!(matches!(
            "move".parse::<BranchOp>(),
            Err(Error::InvalidBranchOp(op)) if op == "move"
        ));
    }

    #[test]
    fn change_from_value() {
        let change = BranchChange::from_value(&json!({
            "op": "c", "stack": ["root"], "path": "/a/b", "child": 0
        }))
        .unwrap();
        assert_eq!(change.op, BranchOp::Create);
        assert_eq!(change.to_branch(), Branch::new(vec!["root".into()], Some("/a/b".into()), 0));
    }

    #[test]
    fn change_from_value_rejects_unknown_op() {
        let err = BranchChange::from_value(&json!({"op": "rename", "stack": []})).unwrap_err();
        assert!(matches!(err, Error::InvalidBranchOp(_)));
        let err = BranchChange::from_value(&json!({"stack": []})).unwrap_err();
        assert!(matches!(err, Error::InvalidBranchOp(_)));
    }

    #[test]
    fn missing_child_means_no_position() {
        let branch: Branch = serde_json::from_value(json!({"stack": [], "path": null})).unwrap();
        assert_eq!(branch.child, NO_POSITION);
        assert!(!branch.is_positioned());
    }
}
