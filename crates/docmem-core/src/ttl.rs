//! Expiration sweep.
//!
//! The memory engine refuses to touch records without a scope identifier, so
//! expired records are removed directly against the document store. The
//! [`TtlReaper`] is the only path that deletes without a scope.

use std::sync::Arc;

use docmem_types::error::VectorStoreError;
use docmem_types::memory::EXPIRES_AT_KEY;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::query::filter::FIND_PAYLOAD_PREFIX;
use crate::store::document::{Document, DocumentStore, document, document_id};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub deleted: u64,
    /// Ids matched by the sweep, as seen just before the delete.
    pub ids: Vec<String>,
}

/// Bulk-deletes expired records of one collection.
pub struct TtlReaper<S> {
    store: Arc<S>,
    collection: String,
}

impl<S: DocumentStore> TtlReaper<S> {
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Records whose expiration is present and `<= now`.
    pub fn expired_filter(now: i64) -> Document {
        let path = format!("{FIND_PAYLOAD_PREFIX}{EXPIRES_AT_KEY}");
        document(json!({ path: { "$exists": true, "$lte": now } }))
    }

    /// Delete every record expired at `now`. A repeated sweep with the same
    /// `now` deletes nothing.
    pub async fn delete_expired(&self, now: i64) -> Result<ReapReport, VectorStoreError> {
        let filter = Self::expired_filter(now);
        let ids: Vec<String> = self
            .store
            .find(&self.collection, filter.clone(), None)
            .await?
            .iter()
            .filter_map(document_id)
            .collect();

        let deleted = self.store.delete_many(&self.collection, filter).await?;
        info!(collection = %self.collection, now, deleted, "deleted expired memories");
        Ok(ReapReport { deleted, ids })
    }
}
