//! Relational source store access
//!
//! The migration only needs three things from a source database: open a
//! connection, run a query that returns rows, and close the connection.
//! [`MySqlSource`] provides them for MySQL/MariaDB.

mod extractor;
mod mysql;

pub use extractor::{DEFAULT_PAGE_SIZE, TableExtractor, page_query};
pub use mysql::{MySqlConnection, MySqlSource};

use crate::value::Row;
use eyre::Result;
use std::future::Future;

/// Connection settings for the source database
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }
}

/// An open connection to the source database
///
/// The connection is used by one extractor at a time and must be closed
/// exactly once with [`SourceConnection::close`].
pub trait SourceConnection: Send {
    /// Run a query and return every row it produced
    ///
    /// # Errors
    /// Returns an error on connectivity, SQL or decoding failures
    fn query(&mut self, sql: &str) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Close the connection
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// A source database that connections can be opened against
pub trait SourceStore: Send + Sync {
    type Connection: SourceConnection;

    /// Open a new connection
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached or rejects the login
    fn open(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}
