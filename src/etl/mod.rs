//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides trait definitions for building chunked data
//! pipelines that stream data out of sources, transform it, and load it to
//! destinations batch by batch.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::Extractor;
pub use load::{FailureRecord, Loader};
pub use pipeline::{ChunkFailure, Pipeline, PipelineReport};
pub use transform::Transformer;
