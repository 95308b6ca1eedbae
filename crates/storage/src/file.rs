//! FileStore: a MemoryStore persisted to a single JSON file
//!
//! The whole population is written after every mutation: serialized to a
//! temporary sibling file, then renamed over the target. Only one process
//! may write a given file.

use std::path::{Path, PathBuf};

use pasta_core::{
    DesignDocument, DocumentId, DocumentStore, Error, RawDocument, Result, RevisionToken,
    ViewKey, ViewRow,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::memory::MemoryStore;

/// Document store backed by a JSON array on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open a store file, starting empty if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let documents: Vec<RawDocument> = serde_json::from_str(&content).map_err(|e| {
                Error::Serialization(format!("failed to parse {}: {}", path.display(), e))
            })?;
            info!(
                target: "pasta::store",
                path = %path.display(),
                documents = documents.len(),
                "store file loaded"
            );
            MemoryStore::from_documents(documents)?
        } else {
            MemoryStore::new()
        };
        Ok(FileStore { path, inner })
    }

    /// Location of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current population to disk
    pub fn flush(&self) -> Result<()> {
        let documents = self.inner.iterate_all()?;
        let content = serde_json::to_string_pretty(&documents)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(
            target: "pasta::store",
            path = %self.path.display(),
            documents = documents.len(),
            "store file written"
        );
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn get_raw(&self, id: &DocumentId) -> Result<Option<RawDocument>> {
        self.inner.get_raw(id)
    }

    fn write_raw(
        &self,
        id: &DocumentId,
        doc: RawDocument,
        token: Option<&RevisionToken>,
    ) -> Result<RevisionToken> {
        let token = self.inner.write_raw(id, doc, token)?;
        self.flush()?;
        Ok(token)
    }

    fn delete(&self, id: &DocumentId) -> Result<bool> {
        let existed = self.inner.delete(id)?;
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }

    fn iterate_all(&self) -> Result<Vec<RawDocument>> {
        self.inner.iterate_all()
    }

    fn query_view(&self, design: &str, view: &str, key: &ViewKey) -> Result<Vec<ViewRow>> {
        self.inner.query_view(design, view, key)
    }

    fn design_document(&self, name: &str) -> Result<Option<DesignDocument>> {
        self.inner.design_document(name)
    }

    fn put_design_document(&self, design: &DesignDocument) -> Result<()> {
        self.inner.put_design_document(design)?;
        self.flush()
    }

    fn delete_design_document(&self, name: &str) -> Result<bool> {
        let existed = self.inner.delete_design_document(name)?;
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }

    fn put_attachment(
        &self,
        id: &DocumentId,
        name: &str,
        token: &RevisionToken,
        data: Value,
    ) -> Result<RevisionToken> {
        let token = self.inner.put_attachment(id, name, token, data)?;
        self.flush()?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("notebook.json")).unwrap();
        assert!(store.iterate_all().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notebook.json");

        let store = FileStore::open(&path).unwrap();
        let mut doc = RawDocument::new();
        doc.insert("-name".into(), json!("scan"));
        let token = store.write_raw(&id("m-1"), doc, None).unwrap();
        store
            .put_attachment(&id("m-1"), "v0.json", &token, json!({"-name": "old"}))
            .unwrap();
        assert!(path.exists());

        let reopened = FileStore::open(&path).unwrap();
        let doc = reopened.get(&id("m-1")).unwrap();
        assert_eq!(doc.name.as_deref(), Some("scan"));
        assert_eq!(doc.revision.unwrap().generation(), 2);
        assert!(doc.attachments.contains_key("v0.json"));
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notebook.json");
        std::fs::write(&path, "{ not a list").unwrap();
        assert!(matches!(FileStore::open(&path), Err(Error::Serialization(_))));
    }

    #[test]
    fn delete_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notebook.json");
        let store = FileStore::open(&path).unwrap();
        store.write_raw(&id("m-1"), RawDocument::new(), None).unwrap();
        assert!(store.delete(&id("m-1")).unwrap());
        assert!(FileStore::open(&path).unwrap().iterate_all().unwrap().is_empty());
    }
}
