//! Revision archiving: sparse diffs stored as `vN.json` attachments
//!
//! An update runs in a fixed order:
//!
//! 1. merge the branch change ([`merge_branch`])
//! 2. diff the payload against the merged, not yet persisted state
//! 3. ask the approval port
//! 4. persist the live document under its revision token
//! 5. attach the diff as the next snapshot
//!
//! A snapshot holds only the previous values of fields that changed. Updates
//! never add top-level fields the live document does not already have.

use crate::branch::merge_branch;
use chrono::Utc;
use pasta_core::document::{
    is_bookkeeping_field, is_identity_field, FIELD_BRANCH, FIELD_CLIENT, FIELD_DATE,
    FIELD_IMAGE, FIELD_NAME, FIELD_TYPE, NO_TYPE_SENTINEL,
};
use pasta_core::{
    ApprovalPort, CallerContext, ChangeIntent, Document, DocumentChange, DocumentStore, Error,
    RawDocument, Result,
};
use serde_json::Value;
use tracing::{debug, error, info};

/// Stored in a snapshot instead of the previous thumbnail payload
pub const IMAGE_CHANGED_MARKER: &str = "image changed";

/// Result of [`RevisionArchiver::apply_update`]
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Nothing changed; the live document, untouched
    Unchanged(Document),
    /// Persisted and archived; the document as now stored
    Saved {
        /// Re-read document, with its new token and snapshot
        document: Document,
        /// Attachment name of the archived diff
        snapshot: String,
    },
    /// The approval port declined; the attempted state, not persisted
    Discarded(Document),
}

impl UpdateOutcome {
    /// Document carried by the outcome
    pub fn document(&self) -> &Document {
        match self {
            UpdateOutcome::Unchanged(document)
            | UpdateOutcome::Discarded(document)
            | UpdateOutcome::Saved { document, .. } => document,
        }
    }

    /// Whether the update reached the store
    pub fn is_saved(&self) -> bool {
        matches!(self, UpdateOutcome::Saved { .. })
    }
}

/// Post-merge state of a document plus the diff that produced it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diff {
    /// Live document with the change applied
    pub updated: RawDocument,
    /// Previous values of every overwritten field
    pub snapshot: RawDocument,
    /// Whether the change counts as a real modification
    pub changed: bool,
}

/// Compute the post-update state of `live` and its sparse diff
///
/// Pure; nothing is persisted.
pub fn compute_diff(live: &Document, change: &DocumentChange) -> Result<Diff> {
    let mut updated = live.to_raw()?;
    let mut snapshot = RawDocument::new();
    let mut changed = false;
    let mut fields = change.fields.clone();

    if let Some(branch_change) = &change.branch {
        let merge = merge_branch(live.branches(), live.name.as_deref(), branch_change);
        if merge.changed {
            updated.insert(FIELD_BRANCH.to_string(), serde_json::to_value(&merge.branches)?);
            changed = true;
        }
        if let Some(name) = merge.renamed {
            fields
                .entry(FIELD_NAME.to_string())
                .or_insert(Value::String(name));
        }
    }

    if change.intent == ChangeIntent::Delete {
        let cleared: Vec<String> = updated
            .keys()
            .filter(|key| !is_identity_field(key))
            .cloned()
            .collect();
        for key in cleared {
            if let Some(old) = updated.remove(&key) {
                snapshot.insert(key, old);
            }
        }
        let changed = changed || !snapshot.is_empty();
        return Ok(Diff {
            updated,
            snapshot,
            changed,
        });
    }

    for (key, value) in fields {
        if is_identity_field(&key) || is_sentinel(&key, &value) {
            continue;
        }
        let Some(current) = updated.get(&key) else {
            continue;
        };
        if *current == value {
            continue;
        }
        let previous = if key == FIELD_IMAGE {
            Value::String(IMAGE_CHANGED_MARKER.to_string())
        } else {
            current.clone()
        };
        if !is_bookkeeping_field(&key) {
            changed = true;
        }
        snapshot.insert(key.clone(), previous);
        updated.insert(key, value);
    }

    Ok(Diff {
        updated,
        snapshot,
        changed,
    })
}

/// Payload values that mean "leave the field alone"
fn is_sentinel(key: &str, value: &Value) -> bool {
    match (key, value) {
        (_, Value::Null) => true,
        (FIELD_TYPE, Value::Array(types)) => {
            types.len() == 1 && types[0].as_str() == Some(NO_TYPE_SENTINEL)
        }
        (FIELD_IMAGE, Value::String(image)) => image.is_empty(),
        _ => false,
    }
}

/// Applies updates to live documents and archives what they overwrite
pub struct RevisionArchiver<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> RevisionArchiver<'a, S> {
    /// Archiver writing through `store`
    pub fn new(store: &'a S) -> Self {
        RevisionArchiver { store }
    }

    /// Apply `change` to `live`
    ///
    /// `live` must be a stored document (id and revision token set). A write
    /// rejected by the store, stale token included, fails with
    /// [`Error::UpdateRejected`] carrying both images; it is never retried.
    /// When the write lands but the snapshot cannot be attached, the error is
    /// [`Error::ArchiveFailed`] with the document as persisted.
    pub fn apply_update(
        &self,
        live: &Document,
        change: &DocumentChange,
        ctx: &CallerContext,
        approval: Option<&dyn ApprovalPort>,
    ) -> Result<UpdateOutcome> {
        let id = live
            .id
            .clone()
            .ok_or_else(|| Error::InvalidDocument("update of a document without _id".into()))?;
        let token = live.revision.clone().ok_or_else(|| {
            Error::InvalidDocument(format!("update of {} without _rev", id))
        })?;

        let diff = compute_diff(live, change)?;
        if !diff.changed {
            debug!(target: "pasta::archive", id = %id, "update is a no-op");
            return Ok(UpdateOutcome::Unchanged(live.clone()));
        }

        let mut updated = diff.updated;
        if change.intent == ChangeIntent::Edit {
            updated.insert(FIELD_CLIENT.to_string(), Value::String(ctx.to_string()));
            updated.insert(FIELD_DATE.to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        let attempted = Document::from_raw(updated)?;

        if let Some(port) = approval {
            let label = live.name.as_deref().unwrap_or(id.as_str());
            let prompt = match change.intent {
                ChangeIntent::Edit => format!("Update {}?", label),
                ChangeIntent::Delete => format!("Delete {}?", label),
            };
            if !port.confirm(&attempted, Some(live), &prompt) {
                info!(target: "pasta::archive", id = %id, "update declined");
                return Ok(UpdateOutcome::Discarded(attempted));
            }
        }

        let reject = |source: Error| {
            error!(
                target: "pasta::archive",
                id = %id,
                rev = %token,
                attempted_name = attempted.name.as_deref().unwrap_or_default(),
                error = %source,
                "persist failed"
            );
            Error::UpdateRejected {
                pre_image: Box::new(live.clone()),
                attempted: Box::new(attempted.clone()),
                source: Box::new(source),
            }
        };

        let written = self.store.write(&attempted, Some(&token)).map_err(reject)?;
        let snapshot = live.next_snapshot_name();
        let archived = self
            .store
            .put_attachment(&id, &snapshot, &written, Value::Object(diff.snapshot));
        if let Err(source) = archived {
            error!(
                target: "pasta::archive",
                id = %id,
                rev = %written,
                snapshot = %snapshot,
                error = %source,
                "update persisted but snapshot not archived"
            );
            let mut document = attempted;
            document.revision = Some(written);
            return Err(Error::ArchiveFailed {
                document: Box::new(document),
                snapshot,
                source: Box::new(source),
            });
        }
        info!(target: "pasta::archive", id = %id, snapshot = %snapshot, "revision archived");

        Ok(UpdateOutcome::Saved {
            document: self.store.get(&id)?,
            snapshot,
        })
    }

    /// Apply an archived snapshot back onto a document
    ///
    /// Identity fields and the image marker are left alone.
    pub fn restore(&self, document: &Document, snapshot: &RawDocument) -> Result<Document> {
        let mut raw = document.to_raw()?;
        for (key, value) in snapshot {
            if is_identity_field(key) {
                continue;
            }
            if key == FIELD_IMAGE && value.as_str() == Some(IMAGE_CHANGED_MARKER) {
                continue;
            }
            raw.insert(key.clone(), value.clone());
        }
        Document::from_raw(raw)
    }
}
