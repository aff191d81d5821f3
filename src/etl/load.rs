//! Loader trait for loading data to destinations

use eyre::Result;
use std::future::Future;

/// A batch that could not be committed after exhausting its retries
///
/// Indices are relative to the chunk handed to [`Loader::load`]; `end_index`
/// is exclusive. Batch numbers start at 1 within each `load` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureRecord {
    pub batch_number: usize,
    pub start_index: usize,
    pub end_index: usize,
}

impl FailureRecord {
    /// Number of items the failed batch covered
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch {} (items {}..{})",
            self.batch_number, self.start_index, self.end_index
        )
    }
}

/// Loader trait for loading data to a destination
///
/// Implementors write one chunk of items and report the parts that could
/// not be written as data instead of failing the whole chunk.
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::etl::{FailureRecord, Loader};
/// use eyre::Result;
///
/// struct DiscardLoader;
///
/// impl Loader for DiscardLoader {
///     type Item = String;
///
///     async fn load(&self, items: Vec<Self::Item>) -> Result<Vec<FailureRecord>> {
///         drop(items);
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The type of items to load
    type Item: Send;

    /// Load one chunk of items to the destination
    ///
    /// Returns the batches of the chunk that could not be written
    ///
    /// # Errors
    /// Returns an error only for failures that are not recoverable per batch
    fn load(
        &self,
        items: Vec<Self::Item>,
    ) -> impl Future<Output = Result<Vec<FailureRecord>>> + Send;
}
