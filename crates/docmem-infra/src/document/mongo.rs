//! MongoDB-wire document store (DocumentDB, Cosmos DB for MongoDB vCore).
//!
//! Thin translation layer between the JSON documents the adapter builds and
//! the driver's BSON. Driver errors are mapped onto [`VectorStoreError`]:
//! `NamespaceNotFound` becomes `NotFound`, everything else is a `Store` error
//! carrying the driver message.

use docmem_core::store::document::{Document, DocumentStore, UpdateResult};
use docmem_types::error::VectorStoreError;
use futures_util::TryStreamExt;
use mongodb::bson::{self, Bson};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::{Client, Collection, Database};
use serde_json::Value;
use tracing::debug;

/// Server error code for a missing collection.
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Server error code for creating a collection that already exists.
const NAMESPACE_EXISTS: i32 = 48;

pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    /// Connect to `uri` and bind to `database`. The driver connects lazily,
    /// so an unreachable server surfaces on the first operation.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, VectorStoreError> {
        let client = Client::with_uri_str(uri).await.map_err(map_error)?;
        debug!(database, "document store client created");
        Ok(Self {
            db: client.database(database),
        })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.db.collection(name)
    }
}

fn server_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn map_error(err: MongoError) -> VectorStoreError {
    match server_code(&err) {
        Some(NAMESPACE_NOT_FOUND) => VectorStoreError::not_found(err.to_string()),
        _ => VectorStoreError::store(err.to_string()),
    }
}

fn to_bson(doc: Document) -> Result<bson::Document, VectorStoreError> {
    bson::to_document(&Value::Object(doc))
        .map_err(|e| VectorStoreError::store(format!("cannot encode document as BSON: {e}")))
}

fn from_bson(doc: bson::Document) -> Document {
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn to_bson_all(docs: Vec<Document>) -> Result<Vec<bson::Document>, VectorStoreError> {
    docs.into_iter().map(to_bson).collect()
}

impl DocumentStore for MongoDocumentStore {
    async fn list_collection_names(&self) -> Result<Vec<String>, VectorStoreError> {
        self.db.list_collection_names().await.map_err(map_error)
    }

    async fn create_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        match self.db.create_collection(name).await {
            Ok(()) => Ok(()),
            Err(e) if server_code(&e) == Some(NAMESPACE_EXISTS) => Ok(()),
            Err(e) => Err(map_error(e)),
        }
    }

    async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        match self.collection(name).drop().await {
            Ok(()) => Ok(()),
            Err(e) if server_code(&e) == Some(NAMESPACE_NOT_FOUND) => Ok(()),
            Err(e) => Err(map_error(e)),
        }
    }

    async fn run_command(&self, command: Document) -> Result<Document, VectorStoreError> {
        let reply = self
            .db
            .run_command(to_bson(command)?)
            .await
            .map_err(map_error)?;
        Ok(from_bson(reply))
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<u64, VectorStoreError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection(collection)
            .insert_many(to_bson_all(docs)?)
            .await
            .map_err(map_error)?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let coll = self.collection(collection);
        let mut find = coll.find(to_bson(filter)?);
        if let Some(limit) = limit.filter(|l| *l > 0) {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let docs: Vec<bson::Document> = find
            .await
            .map_err(map_error)?
            .try_collect()
            .await
            .map_err(map_error)?;
        Ok(docs.into_iter().map(from_bson).collect())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, VectorStoreError> {
        let doc = self
            .collection(collection)
            .find_one(to_bson(filter)?)
            .await
            .map_err(map_error)?;
        Ok(doc.map(from_bson))
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, VectorStoreError> {
        let docs: Vec<bson::Document> = self
            .collection(collection)
            .aggregate(to_bson_all(pipeline)?)
            .await
            .map_err(map_error)?
            .try_collect()
            .await
            .map_err(map_error)?;
        Ok(docs.into_iter().map(from_bson).collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, VectorStoreError> {
        let result = self
            .collection(collection)
            .update_one(to_bson(filter)?, to_bson(update)?)
            .await
            .map_err(map_error)?;
        Ok(UpdateResult {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, VectorStoreError> {
        let result = self
            .collection(collection)
            .delete_one(to_bson(filter)?)
            .await
            .map_err(map_error)?;
        Ok(result.deleted_count)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, VectorStoreError> {
        let result = self
            .collection(collection)
            .delete_many(to_bson(filter)?)
            .await
            .map_err(map_error)?;
        Ok(result.deleted_count)
    }
}
