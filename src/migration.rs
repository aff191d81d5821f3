//! Table-by-table migration runs
//!
//! A [`Migrator`] opens one source connection per run, pushes each table
//! through extract → transform → load in order, and closes the connection
//! again however the run ends.

use crate::client::DocumentStore;
use crate::etl::{ChunkFailure, Pipeline, PipelineReport};
use crate::source::{DEFAULT_PAGE_SIZE, SourceConnection, SourceStore, TableExtractor};
use crate::transform::DocumentTransformer;
use crate::upload::{BatchLoader, LoadOptions};
use eyre::{Context, Result};
use owo_colors::OwoColorize;

/// Outcome of migrating one table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    pub chunks: usize,
    pub rows_extracted: usize,
    pub documents_uploaded: usize,
    pub failures: Vec<ChunkFailure>,
}

impl TableReport {
    fn new(table: &str, report: PipelineReport) -> Self {
        Self {
            table: table.to_string(),
            chunks: report.chunks,
            rows_extracted: report.rows_extracted,
            documents_uploaded: report.items_loaded,
            failures: report.failures,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn log(&self) {
        if self.is_complete() {
            log::info!(
                "✓ Migrated {} row(s) from {} in {} chunk(s)",
                self.documents_uploaded.green(),
                self.table.cyan(),
                self.chunks
            );
            return;
        }

        log::warn!(
            "Uploaded {} of {} row(s) from {}; {} batch(es) failed:",
            self.documents_uploaded,
            self.rows_extracted,
            self.table.cyan(),
            self.failures.len().red()
        );
        for failure in &self.failures {
            log::warn!("  {}", failure);
        }
        log::warn!("Please run the migration again for these specific batches");
    }
}

/// Outcome of a whole run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub tables: Vec<TableReport>,
}

impl MigrationReport {
    pub fn failure_count(&self) -> usize {
        self.tables.iter().map(|t| t.failures.len()).sum()
    }

    pub fn documents_uploaded(&self) -> usize {
        self.tables.iter().map(|t| t.documents_uploaded).sum()
    }

    pub fn log_summary(&self) {
        let failed = self.failure_count();
        if failed == 0 {
            log::info!(
                "✓ Migration complete: {} document(s) from {} table(s)",
                self.documents_uploaded(),
                self.tables.len()
            );
        } else {
            log::warn!(
                "Migration finished with {} failed batch(es); {} document(s) uploaded",
                failed.red(),
                self.documents_uploaded()
            );
        }
    }
}

/// Runs table migrations from a source store into one target collection
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::client::{Auth, Credentials, FirestoreClient};
/// use sql_firestore_migrate::migration::Migrator;
/// use sql_firestore_migrate::source::{MySqlSource, SourceConfig};
///
/// # async fn example() -> eyre::Result<()> {
/// let source = MySqlSource::new(SourceConfig::default());
/// let client = FirestoreClient::try_new(Credentials::new("my-project", Auth::None)?)?;
///
/// let migrator = Migrator::new(&source, &client, "licenses");
/// let report = migrator.run(&["en".to_string()]).await?;
/// report.log_summary();
/// # Ok(())
/// # }
/// ```
pub struct Migrator<'a, S, D> {
    source: &'a S,
    store: &'a D,
    collection: String,
    page_size: usize,
    load: LoadOptions,
}

impl<'a, S, D> Migrator<'a, S, D>
where
    S: SourceStore,
    D: DocumentStore,
{
    pub fn new(source: &'a S, store: &'a D, collection: impl Into<String>) -> Self {
        Self {
            source,
            store,
            collection: collection.into(),
            page_size: DEFAULT_PAGE_SIZE,
            load: LoadOptions::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_load_options(mut self, load: LoadOptions) -> Self {
        self.load = load;
        self
    }

    /// Migrate `tables` in order, each to completion before the next
    ///
    /// The source connection is closed exactly once, on success and on error.
    ///
    /// # Errors
    /// Returns an error if the source cannot be opened, a page query fails,
    /// or a batch cannot be staged. Batches that exhaust their retries are
    /// reported in the [`MigrationReport`] instead.
    pub async fn run(&self, tables: &[String]) -> Result<MigrationReport> {
        let mut connection = self
            .source
            .open()
            .await
            .with_context(|| "Failed to open source connection")?;

        let result = self.migrate_tables(&mut connection, tables).await;

        match (result, connection.close().await) {
            (Ok(report), Ok(())) => {
                log::info!("Source connection closed");
                Ok(report)
            }
            (Ok(_), Err(close_error)) => Err(close_error),
            (Err(error), Ok(())) => {
                log::info!("Source connection closed");
                Err(error)
            }
            (Err(error), Err(close_error)) => {
                log::warn!("Failed to close source connection: {:#}", close_error);
                Err(error)
            }
        }
    }

    async fn migrate_tables(
        &self,
        connection: &mut S::Connection,
        tables: &[String],
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        for table in tables {
            report.tables.push(self.migrate_table(connection, table).await?);
        }
        Ok(report)
    }

    /// Migrate a single table over an already open connection
    pub async fn migrate_table(
        &self,
        connection: &mut S::Connection,
        table: &str,
    ) -> Result<TableReport> {
        log::info!("Starting migration of table: {}", table.cyan());

        let extractor = TableExtractor::new(connection, table).with_page_size(self.page_size);
        let loader = BatchLoader::new(self.store, self.collection.as_str()).with_options(self.load);
        let mut pipeline = Pipeline::new(extractor, DocumentTransformer, loader);

        let report = pipeline
            .run()
            .await
            .with_context(|| format!("Migration of table '{}' failed", table))?;

        let report = TableReport::new(table, report);
        report.log();
        Ok(report)
    }
}
