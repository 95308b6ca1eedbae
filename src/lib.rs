//! PASTA-ELN document engine
//!
//! Sits between the notebook GUI and a schemaless document store and keeps
//! four things honest:
//!
//! - **Branches**: hierarchical placement (ancestor stack, path, sibling order)
//!   inside otherwise flat JSON documents
//! - **Revisions**: sparse, append-only diffs archived as `vN.json` attachments
//! - **Views**: map projections compiled from the editable type schema
//! - **Consistency**: a full-population audit of the hierarchy invariants
//!
//! # Quick Start
//!
//! ```ignore
//! use pasta::{Notebook, EngineConfig, MemoryStore};
//!
//! let notebook = Notebook::open(MemoryStore::new(), EngineConfig::default())?;
//! notebook.init_views()?;
//! let report = notebook.check_db(false)?;
//! println!("{report}");
//! ```
//!
//! All functionality lives in the engine crate; this crate only re-exports it.

pub use pasta_engine::*;
pub use pasta_storage::{FileStore, MemoryStore};
