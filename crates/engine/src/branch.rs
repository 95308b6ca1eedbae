//! Branch merging: create, move and delete placements
//!
//! Merges one [`BranchChange`] into a document's existing branch sequence.
//! Pure: the caller persists the result.
//!
//! ## Operations
//!
//! - `Create`: append a placement; if one already has the same path, the
//!   create becomes an update of that placement (idempotent create)
//! - `Update`: with `oldpath`, rewrite that prefix on every matching
//!   placement and replace its stack (renaming the document when its name
//!   was the old basename); without `oldpath`, replace the first placement
//! - `Delete`: drop every placement whose path equals the change's path
//!
//! Unknown operations never reach this module: [`BranchOp`] parsing rejects
//! them and fails the whole update payload.

use pasta_core::branch::basename;
use pasta_core::{Branch, BranchChange, BranchOp};
use tracing::{debug, warn};

/// Outcome of a branch merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMerge {
    /// Updated branch sequence
    pub branches: Vec<Branch>,
    /// New display name, when a move renamed the document
    pub renamed: Option<String>,
    /// Whether the sequence (or name) actually changed
    pub changed: bool,
}

/// Merge `change` into `current`
///
/// `name` is the document's display name, used for rename-on-move.
pub fn merge_branch(current: &[Branch], name: Option<&str>, change: &BranchChange) -> BranchMerge {
    let mut branches = current.to_vec();
    let mut renamed = None;

    let existing = branches
        .iter()
        .position(|branch| change.path.is_some() && branch.path == change.path);
    let op = match (change.op, existing) {
        (BranchOp::Create, Some(_)) => {
            debug!(
                target: "pasta::branch",
                path = change.path.as_deref().unwrap_or_default(),
                "create on existing path treated as update"
            );
            BranchOp::Update
        }
        (op, _) => op,
    };

    match op {
        BranchOp::Create => branches.push(change.to_branch()),
        BranchOp::Update => match (&change.oldpath, existing) {
            (Some(oldpath), _) => {
                let new_prefix = change.path.as_deref().unwrap_or_default();
                for branch in branches.iter_mut() {
                    let Some(path) = branch.path.as_deref() else {
                        continue;
                    };
                    if !path.starts_with(oldpath.as_str()) {
                        continue;
                    }
                    let rewritten = format!("{}{}", new_prefix, &path[oldpath.len()..]);
                    if name.is_some() && name == basename(path) {
                        let new_name = basename(&rewritten).filter(|new| Some(*new) != name);
                        if let Some(new_name) = new_name {
                            renamed = Some(new_name.to_string());
                        }
                    }
                    branch.path = Some(rewritten);
                    branch.stack = change.stack.clone();
                }
            }
            (None, Some(index)) if change.op == BranchOp::Create => {
                branches[index] = change.to_branch();
            }
            (None, _) => match branches.first_mut() {
                Some(first) => *first = change.to_branch(),
                None => branches.push(change.to_branch()),
            },
        },
        BranchOp::Delete => {
            branches.retain(|branch| branch.path != change.path);
            if branches.len() == current.len() {
                warn!(
                    target: "pasta::branch",
                    path = change.path.as_deref().unwrap_or_default(),
                    "delete matched no branch"
                );
            }
        }
    }

    let changed = branches.as_slice() != current || renamed.is_some();
    BranchMerge {
        branches,
        renamed,
        changed,
    }
}
