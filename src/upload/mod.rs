//! Batched uploads to the document store

mod loader;
mod retry;

pub use loader::{BatchLoader, BatchOutcome, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, LoadOptions};
pub use retry::RetryPolicy;
