//! Storage backends for the PASTA document engine
//!
//! This crate implements the [`DocumentStore`](pasta_core::DocumentStore)
//! boundary with:
//! - MemoryStore: ordered `BTreeMap` behind a `parking_lot::RwLock`, revision
//!   tokens per document, views evaluated from their projections
//! - FileStore: a MemoryStore persisted as one JSON file after every mutation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
