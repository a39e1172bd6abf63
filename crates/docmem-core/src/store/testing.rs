//! Scripted document store for unit tests.

use std::sync::Mutex;

use docmem_types::error::VectorStoreError;
use serde_json::{Value, json};

use super::document::{COLL_STATS, CREATE_INDEXES, Document, DocumentStore, LIST_INDEXES, UpdateResult, document};

/// Replies from canned data and records every call as `(verb, argument)`.
pub(crate) struct ScriptedStore {
    pub calls: Mutex<Vec<(String, Value)>>,
    /// `firstBatch` of `listIndexes`; `None` answers NotFound.
    pub indexes: Mutex<Option<Vec<Value>>>,
    /// Documents returned by `find`.
    pub found: Mutex<Vec<Document>>,
    /// When set, every call fails with this store error.
    pub failure: Option<String>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            indexes: Mutex::new(None),
            found: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    pub fn with_indexes(indexes: Vec<Value>) -> Self {
        let store = Self::new();
        *store.indexes.lock().unwrap() = Some(indexes);
        store
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    fn indexes(&self) -> Option<Vec<Value>> {
        self.indexes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls().iter().filter(|(v, _)| v == verb).count()
    }

    fn record(&self, verb: &str, arg: Value) -> Result<(), VectorStoreError> {
        self.calls.lock().unwrap().push((verb.to_string(), arg));
        match &self.failure {
            Some(message) => Err(VectorStoreError::store(message.clone())),
            None => Ok(()),
        }
    }
}

impl DocumentStore for ScriptedStore {
    async fn list_collection_names(&self) -> Result<Vec<String>, VectorStoreError> {
        self.record("listCollections", Value::Null)?;
        Ok(Vec::new())
    }

    async fn create_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.record("create", json!(name))
    }

    async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.record("drop", json!(name))
    }

    async fn run_command(&self, command: Document) -> Result<Document, VectorStoreError> {
        let verb = command.keys().next().cloned().unwrap_or_default();
        self.record(&verb, Value::Object(command))?;
        // Let concurrent callers interleave, the way a network round trip would.
        tokio::task::yield_now().await;
        match verb.as_str() {
            LIST_INDEXES => match self.indexes() {
                Some(batch) => Ok(document(json!({"cursor": {"firstBatch": batch}, "ok": 1}))),
                None => Err(VectorStoreError::not_found("ns does not exist")),
            },
            CREATE_INDEXES => Ok(document(json!({"ok": 1}))),
            COLL_STATS => Ok(document(json!({"count": 0, "size": 0, "ok": 1}))),
            _ => Ok(document(json!({"ok": 1}))),
        }
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<u64, VectorStoreError> {
        let n = docs.len() as u64;
        self.record("insert", json!({"collection": collection, "docs": docs}))?;
        Ok(n)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, VectorStoreError> {
        self.record("find", json!({"collection": collection, "filter": filter, "limit": limit}))?;
        Ok(self.found.lock().unwrap().clone())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, VectorStoreError> {
        self.record("findOne", json!({"collection": collection, "filter": filter}))?;
        Ok(self.found.lock().unwrap().first().cloned())
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, VectorStoreError> {
        self.record("aggregate", json!({"collection": collection, "pipeline": pipeline}))?;
        Ok(Vec::new())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, VectorStoreError> {
        self.record("update", json!({"collection": collection, "filter": filter, "update": update}))?;
        Ok(UpdateResult::default())
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, VectorStoreError> {
        self.record("deleteOne", json!({"collection": collection, "filter": filter}))?;
        Ok(0)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, VectorStoreError> {
        self.record("deleteMany", json!({"collection": collection, "filter": filter}))?;
        Ok(self.found.lock().unwrap().len() as u64)
    }
}
