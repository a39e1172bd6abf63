//! Document store trait.
//!
//! Mirrors the subset of the MongoDB wire protocol the adapter needs:
//! database commands (`createIndexes`, `listIndexes`, `collStats`), CRUD
//! verbs, and aggregation. Documents are JSON objects; implementations
//! convert to their native representation.

use std::future::Future;

use docmem_types::error::VectorStoreError;
use serde_json::{Map, Value};

/// A store document (or command, or filter, or pipeline stage).
pub type Document = Map<String, Value>;

/// `createIndexes` command name.
pub const CREATE_INDEXES: &str = "createIndexes";

/// `listIndexes` command name.
pub const LIST_INDEXES: &str = "listIndexes";

/// `collStats` command name.
pub const COLL_STATS: &str = "collStats";

/// Result of an `update_one`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// Trait for the MongoDB-compatible document store backing the adapter.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Connectivity and command failures surface as [`VectorStoreError::Store`];
/// a missing namespace surfaces as [`VectorStoreError::NotFound`].
pub trait DocumentStore: Send + Sync {
    /// List the collection names of the database.
    fn list_collection_names(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, VectorStoreError>> + Send;

    /// Materialise an empty collection. Idempotent.
    fn create_collection(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(), VectorStoreError>> + Send;

    /// Drop a collection and its indexes. Idempotent.
    fn drop_collection(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(), VectorStoreError>> + Send;

    /// Run a database command and return its reply.
    fn run_command(
        &self,
        command: Document,
    ) -> impl Future<Output = Result<Document, VectorStoreError>> + Send;

    /// Insert documents. Not atomic across documents. Returns the count inserted.
    fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> impl Future<Output = Result<u64, VectorStoreError>> + Send;

    /// Find documents matching `filter`, in natural order.
    fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<Document>, VectorStoreError>> + Send;

    fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<Option<Document>, VectorStoreError>> + Send;

    /// Run an aggregation pipeline.
    fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Document>, VectorStoreError>> + Send;

    fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> impl Future<Output = Result<UpdateResult, VectorStoreError>> + Send;

    /// Delete the first matching document. Returns the count deleted (0 or 1).
    fn delete_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<u64, VectorStoreError>> + Send;

    /// Delete every matching document. Returns the count deleted.
    fn delete_many(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<u64, VectorStoreError>> + Send;
}

/// Unwrap a `json!` object literal into a [`Document`].
///
/// Non-object values yield an empty document.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Command with the command name as its first key, e.g. `{"listIndexes": "memories"}`.
pub fn command(name: &str, collection: &str) -> Document {
    let mut cmd = Document::new();
    cmd.insert(name.to_string(), Value::String(collection.to_string()));
    cmd
}

/// Filter selecting a document by `_id`.
pub fn id_filter(id: &str) -> Document {
    let mut filter = Document::new();
    filter.insert("_id".to_string(), Value::String(id.to_string()));
    filter
}

/// The `_id` of a document as a string. Non-string ids are rendered as JSON.
pub fn document_id(doc: &Document) -> Option<String> {
    match doc.get("_id")? {
        Value::String(id) => Some(id.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Encode a vector as a JSON array of numbers.
pub fn vector_value(vector: &[f32]) -> Value {
    Value::Array(vector.iter().map(|v| Value::from(f64::from(*v))).collect())
}

/// Decode a JSON array of numbers into a vector.
pub fn vector_from_value(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}
