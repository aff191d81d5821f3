//! SQL Firestore Migrate
//!
//! Moves MySQL tables into a Firestore collection: offset-paginated
//! extraction, row-to-document normalization, and batched commits with
//! bounded retries.

pub mod cli;
pub mod client;
pub mod config;
pub mod etl;
pub mod migration;
pub mod source;
pub mod storage;
pub mod transform;
pub mod upload;
pub mod value;

// Re-exports for convenience
pub use client::{Auth, Credentials, DocumentStore, FirestoreClient};
pub use config::MigrationConfig;
pub use etl::{Extractor, FailureRecord, Loader, Pipeline, Transformer};
pub use migration::{MigrationReport, Migrator, TableReport};
pub use source::{MySqlSource, SourceConfig, SourceConnection, SourceStore, TableExtractor};
pub use storage::NdjsonStore;
pub use transform::DocumentTransformer;
pub use upload::{BatchLoader, LoadOptions, RetryPolicy};
pub use value::{Document, DocumentValue, Row, SourceValue};
