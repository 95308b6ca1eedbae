//! Core types and traits for the PASTA document engine
//!
//! This crate defines the foundational types used throughout the system:
//! - DocumentId / RevisionToken: identity and optimistic-concurrency markers
//! - DocumentKind: structural level vs. leaf record type
//! - Document: reserved fields plus an open map of schema-defined metadata
//! - Branch / BranchChange: placement of a document in the hierarchy
//! - Schema: the editable type definitions ("ontology")
//! - View types: map projections, design documents, query rows
//! - Traits: the store and approval boundaries
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod branch;
pub mod document;
pub mod error;
pub mod id;
pub mod kind;
pub mod schema;
pub mod traits;
pub mod view;

pub use branch::{Branch, BranchChange, BranchOp, NO_POSITION};
pub use document::{ChangeIntent, Document, DocumentChange, RawDocument};
pub use error::{Error, Result};
pub use id::{DocumentId, RevisionToken};
pub use kind::{DocumentKind, ROOT_TYPE};
pub use schema::{AttachmentSlot, FieldDefinition, Schema, SchemaIssue, TypeDefinition};
pub use traits::{ApprovalPort, CallerContext, DocumentStore};
pub use view::{Column, DesignDocument, Projection, ViewDefinition, ViewKey, ViewRow};
