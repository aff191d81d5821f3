//! Pipeline orchestration for chunked ETL operations

use super::{Extractor, FailureRecord, Loader, Transformer};
use eyre::Result;
use futures::TryStreamExt;
use std::ops::Range;

/// A failed batch located within the whole source, not just its chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkFailure {
    /// Offset of the first row of the chunk the batch belonged to
    pub chunk_offset: usize,
    pub record: FailureRecord,
}

impl ChunkFailure {
    /// Absolute source rows covered by the failed batch
    pub fn rows(&self) -> Range<usize> {
        self.chunk_offset + self.record.start_index..self.chunk_offset + self.record.end_index
    }
}

impl std::fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.rows();
        write!(
            f,
            "chunk at offset {}, {}, source rows {}..{}",
            self.chunk_offset, self.record, rows.start, rows.end
        )
    }
}

/// Totals for one pipeline run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub chunks: usize,
    pub rows_extracted: usize,
    pub items_loaded: usize,
    pub failures: Vec<ChunkFailure>,
}

/// ETL Pipeline that streams chunks through Extract, Transform, and Load
///
/// Chunks are handled strictly one after another: the next chunk is not
/// requested from the extractor until the previous one has been loaded.
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: Transformer type (must transform from E::Item)
/// - `L`: Loader type (must load T::Output)
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::etl::Pipeline;
/// # use sql_firestore_migrate::etl::{Extractor, FailureRecord, Loader, Transformer};
/// # use eyre::Result;
/// # use futures::{Stream, stream};
/// # struct MyExtractor;
/// # impl Extractor for MyExtractor {
/// #     type Item = i32;
/// #     fn chunks(&mut self) -> impl Stream<Item = Result<Vec<i32>>> + '_ {
/// #         stream::empty()
/// #     }
/// # }
/// # struct MyTransformer;
/// # impl Transformer for MyTransformer {
/// #     type Input = i32;
/// #     type Output = i32;
/// #     fn transform(&self, input: Self::Input) -> Result<Self::Output> { Ok(input) }
/// # }
/// # struct MyLoader;
/// # impl Loader for MyLoader {
/// #     type Item = i32;
/// #     async fn load(&self, _items: Vec<i32>) -> Result<Vec<FailureRecord>> { Ok(vec![]) }
/// # }
///
/// # async fn example() -> Result<()> {
/// let mut pipeline = Pipeline::new(MyExtractor, MyTransformer, MyLoader);
///
/// let report = pipeline.run().await?;
/// println!("Loaded {} items", report.items_loaded);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    L: Loader<Item = T::Output>,
{
    /// Create a new pipeline
    pub fn new(extractor: E, transformer: T, loader: L) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Run the pipeline until the extractor is exhausted
    ///
    /// For every chunk:
    /// 1. Transform each item
    /// 2. Load the transformed chunk, collecting failed batches
    ///
    /// # Errors
    /// Returns an error if extraction fails, a transform fails, or the
    /// loader reports a non-recoverable error. Failed batches are not errors.
    pub async fn run(&mut self) -> Result<PipelineReport> {
        log::debug!("Starting ETL pipeline");

        let mut report = PipelineReport::default();
        let chunks = self.extractor.chunks();
        let mut chunks = std::pin::pin!(chunks);

        while let Some(items) = chunks.try_next().await? {
            let chunk_offset = report.rows_extracted;
            let count = items.len();
            report.chunks += 1;
            report.rows_extracted += count;

            let transformed = self.transformer.transform_many(items)?;
            log::debug!("Transformed {} items", transformed.len());

            let failures = self.loader.load(transformed).await?;
            let failed: usize = failures.iter().map(FailureRecord::len).sum();
            report.items_loaded += count - failed;
            report.failures.extend(failures.into_iter().map(|record| ChunkFailure {
                chunk_offset,
                record,
            }));
        }

        if report.chunks == 0 {
            log::warn!("No items extracted, pipeline complete");
        }

        Ok(report)
    }
}
