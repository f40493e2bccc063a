//! Error types and result types for mapper and store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Store failures
//! are never retried and never turned into empty results, with two documented exceptions:
//! deleting an absent document and a find-and-modify that matches nothing.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when mapping documents to and from a store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A forced insert hit a document whose primary key already exists.
    /// The first argument is the primary key, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    WriteConflict(String, String),
    /// The targeted document no longer exists.
    /// The first argument is the primary key, the second is the collection name.
    #[error("Document {0} not found in collection {1}")]
    NotFound(String, String),
    /// A bulk scope was opened while another one was active, or a buffered-only call
    /// was made without an active scope (or vice versa).
    #[error("Bulk state error: {0}")]
    BulkState(String),
    /// The document has an invalid structure, e.g. a missing primary key.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An update operator could not be applied to the stored value.
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
    /// An error surfaced by the underlying store client.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
