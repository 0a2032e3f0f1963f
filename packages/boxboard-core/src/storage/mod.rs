pub mod local;
pub mod memory;
pub mod paths;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document read from a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Value,
}

/// Abstract remote document store backing a board session.
/// Implementations: LocalStore (JSON files on disk), MemoryStore (in-process).
///
/// Paths are slash-separated segments alternating collection and document
/// names, e.g. `users/{owner}/boards/{board}/columns/{column}`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a single document. `Ok(None)` when it does not exist.
    async fn read_document(&self, path: &str) -> Result<Option<Value>, StorageError>;

    /// Read every document directly inside a collection.
    async fn read_collection(&self, path: &str) -> Result<Vec<DocumentSnapshot>, StorageError>;

    /// Create a document with a store-generated id and return that id.
    async fn create_document(&self, collection_path: &str, data: Value) -> Result<String, StorageError>;

    /// Create or replace a document.
    async fn set_document(&self, path: &str, data: Value) -> Result<(), StorageError>;

    /// Merge top-level fields into an existing document.
    /// Fails with `NotFound` when the document does not exist.
    async fn update_document(&self, path: &str, partial: Map<String, Value>) -> Result<(), StorageError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, path: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert a serializable value into the top-level field map expected by
/// `DocumentStore::update_document`.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, StorageError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Serialization(
            <serde_json::Error as serde::ser::Error>::custom(format!(
                "expected an object, got {}",
                other
            )),
        )),
    }
}
