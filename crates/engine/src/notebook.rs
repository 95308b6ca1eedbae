//! Notebook facade: the engine wired to one document store
//!
//! Every mutating call takes an explicit [`CallerContext`] (stored as
//! `-client`) and an optional [`ApprovalPort`]. Without a port, writes
//! proceed unconditionally.

use crate::archive::{RevisionArchiver, UpdateOutcome};
use crate::checker::ConsistencyChecker;
use crate::compiler::{type_view_name, ViewCompiler};
use crate::config::{EngineConfig, DESIGN_TYPES};
use crate::report::Report;
use chrono::Utc;
use pasta_core::{
    ApprovalPort, Branch, BranchChange, CallerContext, Document, DocumentChange, DocumentId,
    DocumentStore, Error, Result, Schema, ViewKey, ViewRow,
};
use serde_json::Value;
use tracing::info;

/// Document engine over a store
pub struct Notebook<S: DocumentStore> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> Notebook<S> {
    /// Wrap a store
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when `config` fails validation.
    pub fn open(store: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Notebook { store, config })
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Default provenance, from the configured `client`
    pub fn caller_context(&self) -> CallerContext {
        self.config.caller_context()
    }

    /// Load the type schema from its singleton document
    pub fn schema(&self) -> Result<Schema> {
        let id = DocumentId::new(self.config.schema_id.as_str())?;
        let raw = self
            .store
            .get_raw(&id)?
            .ok_or_else(|| Error::SchemaMissing(format!("no document {}", id)))?;
        Schema::from_raw(&raw)
    }

    /// Read one document
    pub fn get(&self, id: &DocumentId) -> Result<Document> {
        self.store.get(id)
    }

    /// Store a new document
    ///
    /// Assigns a canonical id when the document has none, stamps `-date` and
    /// `-client`, and appends `branch` (operation dropped, `child` defaulting
    /// to no position). A document without any placement gets an unplaced
    /// top-level branch.
    ///
    /// The returned document carries a revision token only if it was
    /// written; a declined approval returns the attempted state without one.
    pub fn create_document(
        &self,
        mut doc: Document,
        branch: Option<&BranchChange>,
        ctx: &CallerContext,
        approval: Option<&dyn ApprovalPort>,
    ) -> Result<Document> {
        let kind = doc
            .kind()
            .ok_or_else(|| Error::InvalidDocument("-type missing or empty".into()))?;
        let id = doc
            .id
            .get_or_insert_with(|| DocumentId::generate(&kind.id_prefix()))
            .clone();
        doc.revision = None;
        doc.date = Some(Utc::now().to_rfc3339());
        doc.client = Some(ctx.to_string());

        let placements = doc.branch.get_or_insert_with(Vec::new);
        if let Some(change) = branch {
            placements.push(change.to_branch());
        }
        if placements.is_empty() {
            placements.push(Branch::unplaced());
        }

        if let Some(port) = approval {
            let prompt = format!("Create {}?", doc.name.as_deref().unwrap_or(id.as_str()));
            if !port.confirm(&doc, None, &prompt) {
                info!(target: "pasta::archive", id = %id, "create declined");
                return Ok(doc);
            }
        }

        let token = self.store.write(&doc, None)?;
        info!(target: "pasta::archive", id = %id, kind = %kind, "document created");
        doc.revision = Some(token);
        Ok(doc)
    }

    /// Apply a change to a stored document
    pub fn update_doc(
        &self,
        id: &DocumentId,
        change: &DocumentChange,
        ctx: &CallerContext,
        approval: Option<&dyn ApprovalPort>,
    ) -> Result<UpdateOutcome> {
        let live = self.store.get(id)?;
        RevisionArchiver::new(&self.store).apply_update(&live, change, ctx, approval)
    }

    /// Apply a JSON change payload as sent by the GUI
    pub fn update_from_json(
        &self,
        id: &DocumentId,
        payload: Value,
        ctx: &CallerContext,
        approval: Option<&dyn ApprovalPort>,
    ) -> Result<UpdateOutcome> {
        let change = DocumentChange::from_value(payload)?;
        self.update_doc(id, &change, ctx, approval)
    }

    /// Archive every user field of a document and clear it
    pub fn delete_document(
        &self,
        id: &DocumentId,
        ctx: &CallerContext,
        approval: Option<&dyn ApprovalPort>,
    ) -> Result<UpdateOutcome> {
        self.update_doc(id, &DocumentChange::delete(), ctx, approval)
    }

    /// Archived snapshots of a document, oldest first
    pub fn history(&self, id: &DocumentId) -> Result<Vec<(String, Value)>> {
        let doc = self.store.get(id)?;
        Ok(doc
            .snapshot_names()
            .into_iter()
            .filter_map(|name| {
                let snapshot = doc.attachments.get(&name)?.clone();
                Some((name, snapshot))
            })
            .collect())
    }

    /// Compile the schema into design documents, replacing existing ones
    pub fn init_views(&self) -> Result<Vec<String>> {
        let schema = self.schema()?;
        ViewCompiler::new(&self.store, &self.config).compile(&schema)
    }

    /// Recreate design documents lost by an interrupted compile
    pub fn ensure_views(&self) -> Result<Vec<String>> {
        let schema = self.schema()?;
        ViewCompiler::new(&self.store, &self.config).ensure_views(&schema)
    }

    /// Audit the whole population
    pub fn check_db(&self, repair: bool) -> Result<Report> {
        ConsistencyChecker::new(&self.store, &self.config).check(repair)
    }

    /// Rows of the table view of `doc_type`
    pub fn view(&self, doc_type: &str, key: &ViewKey) -> Result<Vec<ViewRow>> {
        self.store
            .query_view(DESIGN_TYPES, &type_view_name(doc_type), key)
    }
}
