//! Firestore API client, credentials and the document store capability.
//!
//! This module provides the [`FirestoreClient`] for committing batches to
//! Firestore, the [`Credentials`] it is initialized with, and the
//! [`DocumentStore`] trait the loader writes through.

mod auth;
mod firestore;
mod store;

pub use auth::{Auth, Credentials, FIRESTORE_ENDPOINT, ServiceAccount};
pub use firestore::{FirestoreClient, encode_fields, encode_value};
pub use store::{
    DocumentRef, DocumentStore, MAX_BATCH_WRITES, WriteBatch, validate_collection_id,
};
