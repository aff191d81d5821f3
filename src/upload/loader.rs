//! Batched document loader
//!
//! Splits each chunk into fixed-size batches and commits them one at a time
//! with bounded retries. Batches that keep failing are reported back as
//! [`FailureRecord`]s and the remaining batches still go through.

use super::RetryPolicy;
use crate::client::{DocumentStore, WriteBatch};
use crate::etl::{FailureRecord, Loader};
use crate::value::Document;
use eyre::Result;
use owo_colors::OwoColorize;
use std::time::Duration;

/// Default number of documents per atomic commit
pub const DEFAULT_BATCH_SIZE: usize = 250;

/// Default pause after each committed batch
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(500);

/// A progress line is logged after every this many batches
const PROGRESS_INTERVAL: usize = 10;

/// Tuning for [`BatchLoader`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub batch_delay: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// How a single batch ended
#[derive(Debug)]
pub enum BatchOutcome {
    Committed { attempts: u32 },
    Failed { attempts: u32, error: eyre::Report },
}

/// Loader that commits documents to one collection of a [`DocumentStore`]
///
/// Every document is written under a freshly generated ID, so loading the
/// same chunk twice produces duplicates.
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::client::{Auth, Credentials, FirestoreClient};
/// use sql_firestore_migrate::etl::Loader;
/// use sql_firestore_migrate::upload::BatchLoader;
///
/// # async fn example() -> eyre::Result<()> {
/// let client = FirestoreClient::try_new(Credentials::new("my-project", Auth::None)?)?;
/// let loader = BatchLoader::new(&client, "licenses");
///
/// let failures = loader.load(vec![]).await?;
/// assert!(failures.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct BatchLoader<'a, S> {
    store: &'a S,
    collection: String,
    options: LoadOptions,
}

impl<'a, S: DocumentStore> BatchLoader<'a, S> {
    /// Create a loader writing into `collection` with default options
    pub fn new(store: &'a S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = LoadOptions {
            batch_size: options.batch_size.max(1),
            ..options
        };
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Stage every document of `docs` under new references
    ///
    /// Errors here are not retried.
    fn stage<'d>(&self, docs: &'d [Document]) -> Result<WriteBatch<'d>> {
        let mut batch = WriteBatch::new();
        for doc in docs {
            batch.set(self.store.document(&self.collection)?, doc);
        }
        Ok(batch)
    }

    /// Commit one batch, retrying with backoff until the policy gives up
    ///
    /// # Errors
    /// Only staging errors are returned as `Err`; commit failures end up in
    /// [`BatchOutcome::Failed`].
    pub async fn upload_batch(&self, docs: &[Document], batch_number: usize) -> Result<BatchOutcome> {
        let retry = self.options.retry;
        let mut attempt = 0;

        loop {
            let batch = self.stage(docs)?;
            attempt += 1;

            match self.store.commit(batch).await {
                Ok(()) => {
                    log::info!(
                        "Batch {}: Successfully uploaded {} documents",
                        batch_number,
                        docs.len()
                    );
                    return Ok(BatchOutcome::Committed { attempts: attempt });
                }
                Err(error) if !retry.should_retry(attempt) => {
                    return Ok(BatchOutcome::Failed {
                        attempts: attempt,
                        error,
                    });
                }
                Err(error) => {
                    let delay = retry.backoff(attempt);
                    log::warn!(
                        "Batch {}: Attempt {} failed, retrying after {:?}: {}",
                        batch_number,
                        attempt,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl<S: DocumentStore> Loader for BatchLoader<'_, S> {
    type Item = Document;

    async fn load(&self, items: Vec<Self::Item>) -> Result<Vec<FailureRecord>> {
        let batch_size = self.options.batch_size;
        let total_batches = items.len().div_ceil(batch_size);
        let mut failures = Vec::new();

        log::info!(
            "Starting upload of {} records in {} batches to {}",
            items.len().cyan(),
            total_batches.cyan(),
            self.collection.bright_black()
        );

        for (i, docs) in items.chunks(batch_size).enumerate() {
            let batch_number = i + 1;
            let start_index = i * batch_size;

            match self.upload_batch(docs, batch_number).await? {
                BatchOutcome::Committed { .. } => {
                    tokio::time::sleep(self.options.batch_delay).await;

                    if batch_number % PROGRESS_INTERVAL == 0 {
                        log::info!(
                            "Progress: {}/{} batches completed",
                            batch_number,
                            total_batches
                        );
                    }
                }
                BatchOutcome::Failed { attempts, error } => {
                    log::error!(
                        "Failed to upload batch {} after {} attempts: {:#}",
                        batch_number.red(),
                        attempts,
                        error
                    );
                    failures.push(FailureRecord {
                        batch_number,
                        start_index,
                        end_index: start_index + docs.len(),
                    });
                }
            }
        }

        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DocumentValue;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Store that records commit sizes and times, failing the listed commits
    #[derive(Default)]
    struct ScriptedStore {
        failing_batches: HashSet<i64>,
        always_fail: bool,
        commits: Mutex<Vec<(usize, Instant, bool)>>,
    }

    impl ScriptedStore {
        fn failing(batches: &[i64]) -> Self {
            Self {
                failing_batches: batches.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn attempts(&self) -> Vec<(usize, Instant, bool)> {
            self.commits.lock().unwrap().clone()
        }

        fn committed_sizes(&self) -> Vec<usize> {
            self.attempts()
                .into_iter()
                .filter(|(_, _, ok)| *ok)
                .map(|(size, _, _)| size)
                .collect()
        }
    }

    impl DocumentStore for ScriptedStore {
        async fn commit(&self, batch: WriteBatch<'_>) -> Result<()> {
            // Documents carry their batch number in the "batch" field
            let batch_tag = batch.writes().next().and_then(|(_, doc)| match doc.get("batch") {
                Some(DocumentValue::Integer(n)) => Some(*n),
                _ => None,
            });
            let fail = self.always_fail
                || batch_tag.is_some_and(|n| self.failing_batches.contains(&n));
            self.commits
                .lock()
                .unwrap()
                .push((batch.len(), Instant::now(), !fail));
            if fail {
                eyre::bail!("14 UNAVAILABLE: The service is currently unavailable");
            }
            Ok(())
        }
    }

    /// `len` documents tagged with the 1-based batch number they fall into
    fn documents(len: usize, batch_size: usize) -> Vec<Document> {
        (0..len)
            .map(|i| {
                let mut doc = Document::new();
                doc.insert("row", DocumentValue::Integer(i as i64));
                doc.insert("batch", DocumentValue::Integer((i / batch_size + 1) as i64));
                doc
            })
            .collect()
    }

    fn options(batch_size: usize) -> LoadOptions {
        LoadOptions {
            batch_size,
            ..LoadOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partitions_chunk_into_batches() {
        let store = ScriptedStore::default();
        let loader = BatchLoader::new(&store, "licenses").with_options(options(4));

        let failures = loader.load(documents(10, 4)).await.unwrap();

        assert!(failures.is_empty());
        assert_eq!(store.committed_sizes(), vec![4, 4, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chunk_commits_nothing() {
        let store = ScriptedStore::default();
        let loader = BatchLoader::new(&store, "licenses");

        let failures = loader.load(vec![]).await.unwrap();

        assert!(failures.is_empty());
        assert!(store.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_backoff_schedule() {
        let store = ScriptedStore {
            always_fail: true,
            ..ScriptedStore::default()
        };
        let loader = BatchLoader::new(&store, "licenses").with_options(options(5));

        let failures = loader.load(documents(5, 5)).await.unwrap();

        let attempts = store.attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[1].1 - attempts[0].1, Duration::from_secs(2));
        assert_eq!(attempts[2].1 - attempts[1].1, Duration::from_secs(4));
        assert_eq!(
            failures,
            vec![FailureRecord {
                batch_number: 1,
                start_index: 0,
                end_index: 5
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_isolation() {
        let store = ScriptedStore::failing(&[3]);
        let loader = BatchLoader::new(&store, "licenses").with_options(options(2));

        let failures = loader.load(documents(10, 2)).await.unwrap();

        assert_eq!(
            failures,
            vec![FailureRecord {
                batch_number: 3,
                start_index: 4,
                end_index: 6
            }]
        );
        // batches 1, 2, 4 and 5 commit; batch 3 is tried three times
        assert_eq!(store.committed_sizes(), vec![2, 2, 2, 2]);
        assert_eq!(store.attempts().len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        struct FlakyStore {
            calls: Mutex<u32>,
        }

        impl DocumentStore for FlakyStore {
            async fn commit(&self, _batch: WriteBatch<'_>) -> Result<()> {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    eyre::bail!("deadline exceeded");
                }
                Ok(())
            }
        }

        let store = FlakyStore {
            calls: Mutex::new(0),
        };
        let loader = BatchLoader::new(&store, "licenses");

        let outcome = loader.upload_batch(&documents(3, 3), 1).await.unwrap();
        assert!(matches!(outcome, BatchOutcome::Committed { attempts: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_committed_batches() {
        let store = ScriptedStore::default();
        let loader = BatchLoader::new(&store, "licenses").with_options(options(1));

        loader.load(documents(3, 1)).await.unwrap();

        let attempts = store.attempts();
        assert_eq!(attempts[1].1 - attempts[0].1, DEFAULT_BATCH_DELAY);
        assert_eq!(attempts[2].1 - attempts[1].1, DEFAULT_BATCH_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staging_error_is_fatal() {
        let store = ScriptedStore::default();
        let loader = BatchLoader::new(&store, "bad/collection");

        let result = loader.load(documents(3, 3)).await;

        assert!(result.is_err());
        assert!(store.attempts().is_empty());
    }
}
