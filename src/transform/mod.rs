//! Transform implementations for source rows

mod document;

pub use document::DocumentTransformer;
