//! Error types for the document engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::document::Document;
use crate::id::{DocumentId, RevisionToken};
use std::io;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document engine
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file-backed store, config file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Document not found in the store
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    /// A create targeted an id that is already taken
    #[error("Document already exists: {0}")]
    AlreadyExists(DocumentId),

    /// Stale optimistic-concurrency token
    #[error("Revision conflict on {id}: expected {expected}, found {actual}")]
    RevisionConflict {
        /// Document whose write was rejected
        id: DocumentId,
        /// Token supplied by the writer (None for a blind create)
        expected: String,
        /// Token currently held by the store
        actual: RevisionToken,
    },

    /// Malformed document identifier
    #[error("Invalid document id: {0:?}")]
    InvalidId(String),

    /// Branch change carried an `op` other than create/update/delete
    #[error("Invalid branch operation: {0:?}")]
    InvalidBranchOp(String),

    /// Document or change payload does not have the expected shape
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The schema singleton is absent or unreadable
    #[error("Schema missing: {0}")]
    SchemaMissing(String),

    /// Configuration value rejected at load time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persist during an update failed; both images are kept for diagnosis
    #[error("Update of {} rejected: {source}", .attempted.id_str())]
    UpdateRejected {
        /// Live document before the update was applied
        pre_image: Box<Document>,
        /// Document the update tried to write
        attempted: Box<Document>,
        /// Underlying store failure
        #[source]
        source: Box<Error>,
    },

    /// The update was persisted but its snapshot could not be attached
    #[error("Update of {} persisted, snapshot {snapshot} not archived: {source}", .document.id_str())]
    ArchiveFailed {
        /// Document as written by the update
        document: Box<Document>,
        /// Attachment name the snapshot was meant to get
        snapshot: String,
        /// Underlying store failure
        #[source]
        source: Box<Error>,
    },

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// True for stale-token rejections, including ones wrapped by an update
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::RevisionConflict { .. } => true,
            Error::UpdateRejected { source, .. } | Error::ArchiveFailed { source, .. } => {
                source.is_conflict()
            }
            _ => false,
        }
    }
}
