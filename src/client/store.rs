//! Document store capabilities
//!
//! A target store has to hand out fresh document references and commit a
//! staged batch of writes atomically. [`FirestoreClient`](super::FirestoreClient)
//! and [`NdjsonStore`](crate::storage::NdjsonStore) both implement
//! [`DocumentStore`].

use crate::value::Document;
use eyre::Result;
use std::future::Future;

/// Maximum number of writes Firestore accepts in one commit
pub const MAX_BATCH_WRITES: usize = 500;

/// Reference to a document that does not exist yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRef {
    collection: String,
    id: String,
}

impl DocumentRef {
    /// Create a reference with a freshly generated ID in `collection`
    ///
    /// # Errors
    /// Returns an error if the collection ID is empty, contains `/`, or is
    /// one of the reserved IDs `.` and `..`
    pub fn generate(collection: &str) -> Result<Self> {
        validate_collection_id(collection)?;
        Ok(Self {
            collection: collection.to_string(),
            id: auto_id(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path relative to the database documents root
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

fn auto_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Check a collection ID against the store's naming rules
pub fn validate_collection_id(collection: &str) -> Result<()> {
    if collection.is_empty() {
        eyre::bail!("Collection ID must not be empty");
    }
    if collection.contains('/') {
        eyre::bail!("Collection ID '{}' must not contain '/'", collection);
    }
    if collection == "." || collection == ".." {
        eyre::bail!("Collection ID '{}' is reserved", collection);
    }
    if collection.starts_with("__") && collection.ends_with("__") {
        eyre::bail!("Collection ID '{}' is reserved", collection);
    }
    Ok(())
}

/// Set operations staged for one atomic commit
#[derive(Debug, Default)]
pub struct WriteBatch<'a> {
    writes: Vec<(DocumentRef, &'a Document)>,
}

impl<'a> WriteBatch<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write of `document` to `reference`
    pub fn set(&mut self, reference: DocumentRef, document: &'a Document) -> &mut Self {
        self.writes.push((reference, document));
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> impl Iterator<Item = (&DocumentRef, &'a Document)> {
        self.writes.iter().map(|(r, d)| (r, *d))
    }
}

/// A document store that supports atomic batched writes
pub trait DocumentStore: Send + Sync {
    /// Create a reference to a new, auto-identified document
    ///
    /// # Errors
    /// Returns an error if the collection ID is invalid for this store
    fn document(&self, collection: &str) -> Result<DocumentRef> {
        DocumentRef::generate(collection)
    }

    /// Commit every staged write, or none of them
    ///
    /// # Errors
    /// Returns an error if the commit was rejected or could not be sent
    fn commit(&self, batch: WriteBatch<'_>) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DocumentValue;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = DocumentRef::generate("licenses").unwrap();
        let b = DocumentRef::generate("licenses").unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.collection(), "licenses");
        assert_eq!(a.path(), format!("licenses/{}", a.id()));
    }

    #[test]
    fn test_invalid_collection_ids() {
        assert!(DocumentRef::generate("").is_err());
        assert!(DocumentRef::generate("a/b").is_err());
        assert!(DocumentRef::generate("..").is_err());
        assert!(DocumentRef::generate("__meta__").is_err());
        assert!(DocumentRef::generate("fcc_amateur_aamir").is_ok());
    }

    #[test]
    fn test_write_batch_stages_in_order() {
        let mut first = Document::new();
        first.insert("n", DocumentValue::Integer(1));
        let mut second = Document::new();
        second.insert("n", DocumentValue::Integer(2));

        let mut batch = WriteBatch::new();
        batch
            .set(DocumentRef::generate("c").unwrap(), &first)
            .set(DocumentRef::generate("c").unwrap(), &second);

        assert_eq!(batch.len(), 2);
        let staged: Vec<&Document> = batch.writes().map(|(_, d)| d).collect();
        assert_eq!(staged, vec![&first, &second]);
    }
}
