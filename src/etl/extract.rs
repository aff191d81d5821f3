//! Extractor trait for chunked data extraction

use eyre::Result;
use futures::Stream;

/// Extractor trait for pulling data out of a source one chunk at a time
///
/// Implementors yield a lazy, forward-only sequence of chunks. The
/// sequence ends when the source is exhausted, or with the first `Err`,
/// after which it yields nothing more.
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::etl::Extractor;
/// use eyre::Result;
/// use futures::{Stream, stream};
///
/// struct VecExtractor {
///     chunks: Vec<Vec<i32>>,
/// }
///
/// impl Extractor for VecExtractor {
///     type Item = i32;
///
///     fn chunks(&mut self) -> impl Stream<Item = Result<Vec<Self::Item>>> + '_ {
///         stream::iter(self.chunks.drain(..).map(Ok::<_, eyre::Report>))
///     }
/// }
/// ```
pub trait Extractor: Send {
    /// The type of items extracted
    type Item: Send;

    /// Stream the source as a sequence of non-empty chunks
    ///
    /// # Errors
    /// Yields an error if reading a chunk fails (network, SQL, decoding)
    fn chunks(&mut self) -> impl Stream<Item = Result<Vec<Self::Item>>> + '_;
}
