//! Vector index lifecycle.
//!
//! [`IndexManager`] lazily ensures that each collection carries its vector
//! index. The first touch of a collection reads the existing index metadata;
//! a missing index is created with the configured dialect, an existing one is
//! compared against it. A kind mismatch is logged once and left alone: the
//! manager never drops or migrates an index. The verdict is cached for the
//! lifetime of the manager.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use docmem_types::error::VectorStoreError;
use docmem_types::index::{IndexDescriptor, IndexKind, IndexParams, VECTOR_PATH};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::store::document::{CREATE_INDEXES, Document, DocumentStore, LIST_INDEXES, command, document};

/// Index type marker in the index key document.
pub const COSMOS_SEARCH: &str = "cosmosSearch";

/// Outcome of verifying a collection's index against the configured descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexVerification {
    /// No index existed; one was created from the descriptor.
    Created,
    /// An index of the configured kind exists.
    Match,
    /// An index of another kind exists. `observed` is its wire kind verbatim.
    Mismatch { observed: String },
}

/// Cached verification result for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub configured: IndexKind,
    pub verification: IndexVerification,
    /// Dialect queries against this collection must speak.
    pub effective_kind: IndexKind,
    /// Dimensionality of the index, when the store reports it.
    pub dimensions: Option<u32>,
}

impl IndexStatus {
    pub fn is_mismatch(&self) -> bool {
        matches!(self.verification, IndexVerification::Mismatch { .. })
    }
}

/// A vector index as reported by `listIndexes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedIndex {
    pub name: String,
    /// Wire kind, e.g. `vector-diskann`.
    pub kind: String,
    pub dimensions: Option<u32>,
    pub similarity: Option<String>,
}

impl ObservedIndex {
    /// Pick the vector index out of a `listIndexes` batch.
    fn from_spec(spec: &Value) -> Option<Self> {
        let key = spec.get("key")?;
        if key.get(VECTOR_PATH).and_then(Value::as_str) != Some(COSMOS_SEARCH) {
            return None;
        }
        let options = spec.get("cosmosSearchOptions");
        let field = |name: &str| options.and_then(|o| o.get(name));
        Some(Self {
            name: spec
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            kind: field("kind")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            dimensions: field("dimensions")
                .and_then(Value::as_u64)
                .and_then(|d| u32::try_from(d).ok()),
            similarity: field("similarity").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Ensures and caches per-collection vector index state.
///
/// Owned by one adapter instance; there is no process-wide registry.
#[derive(Debug, Default)]
pub struct IndexManager {
    verified: DashMap<String, IndexStatus>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached status of `collection`, if it has been verified.
    pub fn cached(&self, collection: &str) -> Option<IndexStatus> {
        self.verified.get(collection).map(|entry| entry.value().clone())
    }

    /// Drop the cached status of `collection` (after the collection is dropped).
    pub fn forget(&self, collection: &str) {
        self.verified.remove(collection);
    }

    /// Make sure `collection` carries a vector index, creating it from
    /// `descriptor` when missing. Cached after the first success.
    pub async fn ensure<S: DocumentStore>(
        &self,
        store: &S,
        collection: &str,
        descriptor: &IndexDescriptor,
    ) -> Result<IndexStatus, VectorStoreError> {
        if let Some(status) = self.cached(collection) {
            return Ok(status);
        }

        let configured = descriptor.kind();
        let status = match Self::inspect(store, collection).await? {
            None => {
                store
                    .run_command(Self::create_indexes_command(collection, descriptor))
                    .await?;
                info!(
                    collection,
                    index = %descriptor.name,
                    kind = configured.wire_name(),
                    dimensions = descriptor.dimensions,
                    "created vector index"
                );
                IndexStatus {
                    configured,
                    verification: IndexVerification::Created,
                    effective_kind: configured,
                    dimensions: Some(descriptor.dimensions),
                }
            }
            Some(observed) if IndexKind::from_wire_name(&observed.kind) == Some(configured) => {
                debug!(collection, index = %observed.name, "vector index matches configuration");
                IndexStatus {
                    configured,
                    verification: IndexVerification::Match,
                    effective_kind: configured,
                    dimensions: observed.dimensions,
                }
            }
            Some(observed) => IndexStatus {
                configured,
                effective_kind: IndexKind::from_wire_name(&observed.kind).unwrap_or(configured),
                verification: IndexVerification::Mismatch {
                    observed: observed.kind,
                },
                dimensions: observed.dimensions,
            },
        };

        // Concurrent first touches race here; the first verdict recorded wins
        // and only that caller reports a mismatch.
        match self.verified.entry(collection.to_string()) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                if let IndexVerification::Mismatch { observed } = &status.verification {
                    warn!(
                        collection,
                        configured = configured.wire_name(),
                        observed = %observed,
                        "vector index kind mismatch; keeping the existing index"
                    );
                }
                slot.insert(status.clone());
                Ok(status)
            }
        }
    }

    /// Read the collection's vector index, if any. A missing collection has none.
    pub async fn inspect<S: DocumentStore>(
        store: &S,
        collection: &str,
    ) -> Result<Option<ObservedIndex>, VectorStoreError> {
        let reply = match store.run_command(command(LIST_INDEXES, collection)).await {
            Ok(reply) => reply,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let batch = reply
            .get("cursor")
            .and_then(|c| c.get("firstBatch"))
            .and_then(Value::as_array);
        Ok(batch.and_then(|specs| specs.iter().find_map(ObservedIndex::from_spec)))
    }

    /// The `createIndexes` command for `descriptor` on `collection`.
    pub fn create_indexes_command(collection: &str, descriptor: &IndexDescriptor) -> Document {
        let mut options = Document::new();
        options.insert("kind".to_string(), json!(descriptor.kind().wire_name()));
        match descriptor.params {
            IndexParams::DiskAnn { max_degree, l_build } => {
                options.insert("maxDegree".to_string(), json!(max_degree));
                options.insert("lBuild".to_string(), json!(l_build));
            }
            IndexParams::Hnsw { m, ef_construction } => {
                options.insert("m".to_string(), json!(m));
                options.insert("efConstruction".to_string(), json!(ef_construction));
            }
        }
        options.insert("similarity".to_string(), json!(descriptor.similarity.wire_name()));
        options.insert("dimensions".to_string(), json!(descriptor.dimensions));

        let mut cmd = command(CREATE_INDEXES, collection);
        cmd.insert(
            "indexes".to_string(),
            json!([{
                "name": descriptor.name,
                "key": { VECTOR_PATH: COSMOS_SEARCH },
                "cosmosSearchOptions": options,
            }]),
        );
        cmd
    }

    /// A `listIndexes` spec entry for `descriptor`, as the store reports it.
    pub fn index_spec(descriptor: &IndexDescriptor) -> Document {
        let cmd = Self::create_indexes_command("", descriptor);
        cmd.get("indexes")
            .and_then(|i| i.get(0))
            .cloned()
            .map(document)
            .unwrap_or_default()
    }
}
