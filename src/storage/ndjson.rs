//! NDJSON (Newline Delimited JSON) document store
//!
//! Stands in for Firestore when a migration should be inspected locally.
//! Each committed write becomes one line holding the document name and its
//! fields in Firestore REST form.

use crate::client::{DocumentStore, WriteBatch, encode_fields};

use eyre::{Context, Result};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write committed documents to an NDJSON file
pub struct NdjsonStore {
    path: PathBuf,
}

impl NdjsonStore {
    /// Create the store, truncating any existing file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::write(&path, "")
            .with_context(|| format!("Failed to create NDJSON file: {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one batch as a single write so a batch lands whole or not at all
    pub fn append(&self, batch: &WriteBatch<'_>) -> Result<()> {
        let mut content = String::new();
        for (reference, document) in batch.writes() {
            let line = json!({
                "name": reference.path(),
                "fields": encode_fields(document),
            });
            content.push_str(&serde_json::to_string(&line)?);
            content.push('\n');
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open NDJSON file: {}", self.path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write NDJSON file: {}", self.path.display()))?;

        Ok(())
    }
}

impl DocumentStore for NdjsonStore {
    async fn commit(&self, batch: WriteBatch<'_>) -> Result<()> {
        self.append(&batch)
    }
}
