//! File system storage operations
//!
//! This module handles local file output:
//! - NDJSON document store for dry runs

mod ndjson;

pub use ndjson::NdjsonStore;
