//! Document engine for PASTA notebooks
//!
//! This crate orchestrates the engine components over a [`DocumentStore`]:
//! - Branch merging: create/move/delete placements in the hierarchy
//! - Revision archiving: sparse diffs kept as `vN.json` attachments
//! - View compilation: per-type and cross-cutting map views from the schema
//! - Consistency checking: full-population audit with optional repair
//!
//! [`Notebook`] wires all of them to one store and one [`EngineConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod branch;
pub mod checker;
pub mod compiler;
pub mod config;
pub mod image;
pub mod notebook;
pub mod report;

pub use archive::{compute_diff, Diff, RevisionArchiver, UpdateOutcome, IMAGE_CHANGED_MARKER};
pub use branch::{merge_branch, BranchMerge};
pub use checker::ConsistencyChecker;
pub use compiler::{type_view_name, ViewCompiler};
pub use config::EngineConfig;
pub use notebook::Notebook;
pub use report::{CheckCode, Finding, Report, Severity};

pub use pasta_core::{
    ApprovalPort, Branch, BranchChange, BranchOp, CallerContext, ChangeIntent, Document,
    DocumentChange, DocumentId, DocumentKind, DocumentStore, Error, RawDocument, Result,
    RevisionToken, Schema, TypeDefinition, ViewKey, ViewRow, NO_POSITION,
};
