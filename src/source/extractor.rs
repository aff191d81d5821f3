//! Offset-paginated table extractor
//!
//! Reads a table page by page with `LIMIT`/`OFFSET`. No ordering is imposed,
//! so rows inserted or deleted while the extraction runs may be skipped or
//! read twice.

use super::SourceConnection;
use crate::etl::Extractor;
use crate::value::Row;
use eyre::{Context, Result};
use futures::{Stream, stream};
use owo_colors::OwoColorize;

/// Default number of rows fetched per query
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Build the query for one page of a table
///
/// Each dot-separated part of the table name is backtick-quoted.
pub fn page_query(table: &str, limit: usize, offset: usize) -> String {
    let quoted = table
        .split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".");
    format!("SELECT * FROM {} LIMIT {} OFFSET {}", quoted, limit, offset)
}

/// Extractor for every row of one source table
///
/// Yields chunks of at most `page_size` rows. The offset advances by the
/// number of rows actually returned; a page shorter than `page_size` ends
/// the stream. When the table size is an exact multiple of the page size,
/// one extra query sees the empty terminal page.
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::etl::Extractor;
/// use sql_firestore_migrate::source::{MySqlSource, SourceConfig, SourceStore, TableExtractor};
/// use futures::TryStreamExt;
///
/// # async fn example() -> eyre::Result<()> {
/// let source = MySqlSource::new(SourceConfig::default());
/// let mut conn = source.open().await?;
/// let mut extractor = TableExtractor::new(&mut conn, "en").with_page_size(1_000);
///
/// let chunks: Vec<_> = extractor.chunks().try_collect().await?;
/// # Ok(())
/// # }
/// ```
pub struct TableExtractor<'a, C> {
    connection: &'a mut C,
    table: String,
    page_size: usize,
}

impl<'a, C: SourceConnection> TableExtractor<'a, C> {
    /// Create an extractor over `table` using the default page size
    pub fn new(connection: &'a mut C, table: impl Into<String>) -> Self {
        Self {
            connection,
            table: table.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the number of rows per query (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Cursor state threaded through the chunk stream
struct Page<'s, C> {
    connection: &'s mut C,
    table: &'s str,
    page_size: usize,
    offset: usize,
    finished: bool,
}

impl<C: SourceConnection> Page<'_, C> {
    async fn next(mut self) -> Result<Option<(Vec<Row>, Self)>> {
        if self.finished {
            return Ok(None);
        }

        let sql = page_query(self.table, self.page_size, self.offset);
        log::debug!("{}", sql);
        let rows = self
            .connection
            .query(&sql)
            .await
            .with_context(|| format!("Failed to fetch rows from table '{}'", self.table))?;

        self.finished = rows.len() < self.page_size;
        if rows.is_empty() {
            return Ok(None);
        }

        self.offset += rows.len();
        log::info!(
            "Fetched {} records from {}",
            self.offset.cyan(),
            self.table.bright_black()
        );
        Ok(Some((rows, self)))
    }
}

impl<C: SourceConnection> Extractor for TableExtractor<'_, C> {
    type Item = Row;

    fn chunks(&mut self) -> impl Stream<Item = Result<Vec<Self::Item>>> + '_ {
        let start = Page {
            connection: &mut *self.connection,
            table: self.table.as_str(),
            page_size: self.page_size,
            offset: 0,
            finished: false,
        };
        stream::try_unfold(start, Page::next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SourceValue;
    use futures::{StreamExt, TryStreamExt};

    /// In-memory table that answers page queries and records them
    struct FakeTable {
        rows: usize,
        fail_on_query: Option<usize>,
        queries: Vec<String>,
    }

    impl FakeTable {
        fn new(rows: usize) -> Self {
            Self {
                rows,
                fail_on_query: None,
                queries: Vec::new(),
            }
        }
    }

    impl SourceConnection for FakeTable {
        async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
            self.queries.push(sql.to_string());
            if self.fail_on_query == Some(self.queries.len()) {
                eyre::bail!("Lost connection to MySQL server during query");
            }

            let words: Vec<&str> = sql.split_whitespace().collect();
            let limit: usize = words[words.len() - 3].parse()?;
            let offset: usize = words[words.len() - 1].parse()?;
            Ok((offset..self.rows.min(offset + limit))
                .map(|i| Row::new().with("id", SourceValue::Int(i as i64)))
                .collect())
        }

        async fn close(self) -> Result<()> {
            Ok(())
        }
    }

    async fn extract_all(table: &mut FakeTable, page_size: usize) -> Vec<Vec<Row>> {
        let mut extractor = TableExtractor::new(table, "en").with_page_size(page_size);
        extractor.chunks().try_collect().await.unwrap()
    }

    #[test]
    fn test_page_query() {
        assert_eq!(
            page_query("en", 10_000, 20_000),
            "SELECT * FROM `en` LIMIT 10000 OFFSET 20000"
        );
        assert_eq!(
            page_query("fcc_amateur.en", 5, 0),
            "SELECT * FROM `fcc_amateur`.`en` LIMIT 5 OFFSET 0"
        );
    }

    #[tokio::test]
    async fn test_partial_last_page() {
        let mut table = FakeTable::new(25);
        let chunks = extract_all(&mut table, 10).await;

        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(table.queries.len(), 3);
        assert!(table.queries[2].ends_with("LIMIT 10 OFFSET 20"));
    }

    #[tokio::test]
    async fn test_exact_multiple_issues_one_empty_query() {
        let mut table = FakeTable::new(20);
        let chunks = extract_all(&mut table, 10).await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(table.queries.len(), 3);
        assert!(table.queries[2].ends_with("OFFSET 20"));
    }

    #[tokio::test]
    async fn test_empty_table() {
        let mut table = FakeTable::new(0);
        let chunks = extract_all(&mut table, 10).await;

        assert!(chunks.is_empty());
        assert_eq!(table.queries.len(), 1);
    }

    #[tokio::test]
    async fn test_chunks_cover_table_in_order() {
        let mut table = FakeTable::new(12);
        let chunks = extract_all(&mut table, 10).await;

        let ids: Vec<SourceValue> = chunks
            .into_iter()
            .flatten()
            .filter_map(|row| row.get("id").cloned())
            .collect();
        let expected: Vec<SourceValue> = (0..12).map(SourceValue::Int).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_query_error_ends_stream() {
        let mut table = FakeTable::new(50);
        table.fail_on_query = Some(2);

        let mut extractor = TableExtractor::new(&mut table, "en").with_page_size(10);
        let results: Vec<Result<Vec<Row>>> = extractor.chunks().collect().await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to fetch rows from table 'en'"));
        assert_eq!(table.queries.len(), 2);
    }
}
