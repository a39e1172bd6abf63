//! Vector-store adapter over a MongoDB-compatible document store.
//!
//! Each memory record is one document:
//!
//! ```text
//! { _id, embedding: [f32; dims], payload: { data, category, user_id, agent_id, run_id, expires_at, ... } }
//! ```
//!
//! The collection's vector index is ensured lazily on the first operation
//! that needs it and the verdict cached. Similarity queries speak the dialect
//! of the index actually present, which is the configured one except after a
//! kind mismatch.

use std::sync::Arc;

use docmem_core::index::{IndexManager, IndexStatus};
use docmem_core::query::filter::{FIND_PAYLOAD_PREFIX, FilterTranslator, SEARCH_PAYLOAD_PREFIX};
use docmem_core::query::pipeline::QueryBuilder;
use docmem_core::store::document::{
    COLL_STATS, Document, DocumentStore, command, document_id, id_filter, vector_value,
};
use docmem_core::ttl::TtlReaper;
use docmem_core::vector::store::VectorStore;
use docmem_types::config::{AdapterSettings, DocmemConfig};
use docmem_types::error::VectorStoreError;
use docmem_types::filter::Filters;
use docmem_types::index::{IndexDescriptor, VECTOR_PATH};
use docmem_types::memory::{
    CollectionInfo, MemoryPayload, MemoryRecord, RESERVED_PAYLOAD_KEYS, RecordUpdate, StoredMemory,
};
use serde_json::Value;
use tracing::{debug, info};

/// Top-level document key holding the payload.
const PAYLOAD_FIELD: &str = "payload";

/// Search rows carry the stored source under this key.
const SOURCE_FIELD: &str = "document";

pub struct DocumentVectorStore<S: DocumentStore> {
    store: Arc<S>,
    settings: AdapterSettings,
    indexes: IndexManager,
}

impl<S: DocumentStore> DocumentVectorStore<S> {
    pub fn new(store: Arc<S>, settings: AdapterSettings) -> Self {
        Self {
            store,
            settings,
            indexes: IndexManager::new(),
        }
    }

    /// Validate `config` and build an adapter over `store`.
    pub fn from_config(store: Arc<S>, config: &DocmemConfig) -> Result<Self, VectorStoreError> {
        Ok(Self::new(store, config.adapter_settings()?))
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.indexes
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Expiration sweeper for the configured collection, sharing this adapter's store.
    pub fn reaper(&self) -> TtlReaper<S> {
        TtlReaper::new(Arc::clone(&self.store), self.settings.collection.clone())
    }

    /// The index `collection` should carry at `dims`, in the configured dialect.
    pub fn descriptor(&self, collection: &str, dims: u32) -> IndexDescriptor {
        IndexDescriptor::for_collection(collection, self.settings.index_kind, dims)
    }

    /// Ensure the configured collection's index without any other operation.
    pub async fn ensure_index(&self) -> Result<IndexStatus, VectorStoreError> {
        let collection = &self.settings.collection;
        let descriptor = self.descriptor(collection, self.settings.dimensions);
        self.indexes
            .ensure(self.store.as_ref(), collection, &descriptor)
            .await
    }

    fn dims(&self) -> usize {
        self.settings.dimensions as usize
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() != self.dims() {
            return Err(VectorStoreError::validation(format!(
                "vector has {} dimensions, collection expects {}",
                vector.len(),
                self.dims()
            )));
        }
        Ok(())
    }
}

/// Decode a stored document into a record.
fn parse_record(doc: &Document, score: Option<f32>) -> Result<StoredMemory, VectorStoreError> {
    let id = document_id(doc)
        .ok_or_else(|| VectorStoreError::store("stored document has no _id"))?;
    let payload = doc
        .get(PAYLOAD_FIELD)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| VectorStoreError::store(format!("stored document '{id}' has no payload")))?;
    Ok(StoredMemory {
        id,
        score,
        payload: MemoryPayload::from_document(payload)?,
    })
}

fn record_document(record: &MemoryRecord) -> Result<Document, VectorStoreError> {
    let mut doc = Document::new();
    doc.insert("_id".to_string(), Value::String(record.id.clone()));
    doc.insert(VECTOR_PATH.to_string(), vector_value(&record.vector));
    doc.insert(
        PAYLOAD_FIELD.to_string(),
        Value::Object(record.payload.to_document()?),
    );
    Ok(doc)
}

fn check_metadata_key(key: &str) -> Result<(), VectorStoreError> {
    if RESERVED_PAYLOAD_KEYS.contains(&key) {
        return Err(VectorStoreError::validation(format!(
            "metadata key '{key}' is reserved"
        )));
    }
    if key.is_empty() || key.starts_with('$') || key.contains('.') {
        return Err(VectorStoreError::validation(format!(
            "metadata key '{key}' is not a valid field name"
        )));
    }
    Ok(())
}

impl<S: DocumentStore> VectorStore for DocumentVectorStore<S> {
    async fn create_collection(&self, name: &str, dims: u32) -> Result<(), VectorStoreError> {
        if dims == 0 {
            return Err(VectorStoreError::validation("dimensions must be positive"));
        }
        if let Some(existing) = IndexManager::inspect(self.store.as_ref(), name).await? {
            if existing.dimensions.is_some_and(|d| d != dims) {
                return Err(VectorStoreError::validation(format!(
                    "collection '{name}' is indexed at {} dimensions, requested {dims}",
                    existing.dimensions.unwrap_or_default()
                )));
            }
        }

        self.store.create_collection(name).await?;
        self.indexes
            .ensure(self.store.as_ref(), name, &self.descriptor(name, dims))
            .await?;
        info!(collection = name, dims, "collection ready");
        Ok(())
    }

    async fn insert(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        payloads: &[MemoryPayload],
    ) -> Result<(), VectorStoreError> {
        if ids.len() != vectors.len() || ids.len() != payloads.len() {
            return Err(VectorStoreError::validation(format!(
                "ids, vectors and payloads differ in length ({}, {}, {})",
                ids.len(),
                vectors.len(),
                payloads.len()
            )));
        }

        let docs = ids
            .iter()
            .zip(vectors)
            .zip(payloads)
            .map(|((id, vector), payload)| {
                let record = MemoryRecord {
                    id: id.clone(),
                    vector: vector.clone(),
                    payload: payload.clone(),
                };
                record.validate(self.dims())?;
                record_document(&record)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if docs.is_empty() {
            return Ok(());
        }

        self.ensure_index().await?;
        let inserted = self
            .store
            .insert_many(&self.settings.collection, docs)
            .await?;
        info!(collection = %self.settings.collection, inserted, "inserted records");
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filters: &Filters,
    ) -> Result<Vec<StoredMemory>, VectorStoreError> {
        if k == 0 {
            return Err(VectorStoreError::validation("k must be at least 1"));
        }
        self.check_vector(vector)?;
        let post_filter = FilterTranslator::translate(filters, SEARCH_PAYLOAD_PREFIX)?;

        let status = self.ensure_index().await?;
        let kind = status.effective_kind;
        let pipeline = QueryBuilder::build(kind, vector, k, post_filter);
        let rows = self
            .store
            .aggregate(&self.settings.collection, pipeline)
            .await?;

        let mut hits = rows
            .iter()
            .map(|row| {
                let score = row
                    .get(kind.score_field())
                    .and_then(Value::as_f64)
                    .map(|s| s as f32);
                let source = row
                    .get(SOURCE_FIELD)
                    .and_then(Value::as_object)
                    .ok_or_else(|| VectorStoreError::store("search result has no stored document"))?;
                parse_record(source, score)
            })
            .collect::<Result<Vec<_>, _>>()?;

        hits.sort_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or(f32::MIN), b.score.unwrap_or(f32::MIN));
            sb.total_cmp(&sa).then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        debug!(collection = %self.settings.collection, kind = %kind, k, hits = hits.len(), "similarity search");
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<StoredMemory, VectorStoreError> {
        let doc = self
            .store
            .find_one(&self.settings.collection, id_filter(id))
            .await?
            .ok_or_else(|| VectorStoreError::not_found(format!("memory '{id}'")))?;
        parse_record(&doc, None)
    }

    async fn list(&self, filters: &Filters, limit: usize) -> Result<Vec<StoredMemory>, VectorStoreError> {
        let filter = FilterTranslator::translate_or_all(filters, FIND_PAYLOAD_PREFIX)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let docs = self
            .store
            .find(&self.settings.collection, filter, Some(limit))
            .await?;
        docs.iter().map(|doc| parse_record(doc, None)).collect()
    }

    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<(), VectorStoreError> {
        if update.is_empty() {
            return Err(VectorStoreError::validation("update must change content, metadata or vector"));
        }

        let mut set = Document::new();
        if let Some(content) = &update.content {
            set.insert(format!("{PAYLOAD_FIELD}.data"), Value::String(content.clone()));
        }
        if let Some(metadata) = &update.metadata {
            for (key, value) in metadata {
                check_metadata_key(key)?;
                set.insert(format!("{PAYLOAD_FIELD}.{key}"), value.clone());
            }
        }
        if let Some(vector) = &update.vector {
            self.check_vector(vector)?;
            set.insert(VECTOR_PATH.to_string(), vector_value(vector));
        }

        let mut doc = Document::new();
        doc.insert("$set".to_string(), Value::Object(set));
        let result = self
            .store
            .update_one(&self.settings.collection, id_filter(id), doc)
            .await?;
        if result.matched == 0 {
            return Err(VectorStoreError::not_found(format!("memory '{id}'")));
        }
        debug!(memory_id = id, modified = result.modified, "updated record");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        let deleted = self
            .store
            .delete_one(&self.settings.collection, id_filter(id))
            .await?;
        if deleted == 0 {
            return Err(VectorStoreError::not_found(format!("memory '{id}'")));
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.store.drop_collection(name).await?;
        self.indexes.forget(name);
        info!(collection = name, "dropped collection");
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorStoreError> {
        let stats = self.store.run_command(command(COLL_STATS, name)).await?;
        let number = |field: &str| stats.get(field).and_then(Value::as_u64).unwrap_or_default();
        Ok(CollectionInfo {
            name: name.to_string(),
            count: number("count"),
            size: number("size"),
        })
    }

    async fn reset(&self) -> Result<(), VectorStoreError> {
        let collection = self.settings.collection.clone();
        self.delete_collection(&collection).await?;
        self.create_collection(&collection, self.settings.dimensions)
            .await
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        self.store.list_collection_names().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::memory::InMemoryDocumentStore;
    use docmem_core::batch::BatchCoordinator;
    use docmem_core::clock::FixedClock;
    use tracing_test::traced_test;
    use docmem_core::index::IndexVerification;
    use docmem_core::memory::engine::{DirectMemoryEngine, Embedder};
    use docmem_core::memory::service::MemoryService;
    use docmem_types::filter::parse_filters;
    use docmem_types::index::IndexKind;
    use docmem_types::memory::{
        AddMemoryRequest, MemoryCategory, MemoryEvent, Scope, SearchMemoryRequest,
    };
    use serde_json::{Map, json};

    const NOW: i64 = 1_700_000_000;

    fn adapter(kind: IndexKind, dims: u32) -> DocumentVectorStore<InMemoryDocumentStore> {
        DocumentVectorStore::new(
            Arc::new(InMemoryDocumentStore::new()),
            AdapterSettings::new("memories", dims, kind),
        )
    }

    fn payload(content: &str, user: &str) -> MemoryPayload {
        MemoryPayload::new(content, MemoryCategory::Fact, Scope::user(user))
    }

    fn filters(value: Value) -> Filters {
        serde_json::from_value(value).unwrap()
    }

    async fn seed(store: &DocumentVectorStore<InMemoryDocumentStore>) {
        let ids: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let mut episodic = payload("walked the dog", "u1");
        episodic.category = MemoryCategory::Episodic;
        let payloads = vec![
            payload("likes tea", "u1"),
            episodic,
            payload("lives in Oslo", "u2").with_expires_at(NOW - 10),
            payload("speaks Dutch", "u1").with_expires_at(NOW + 3600),
        ];
        store.insert(&ids, &vectors, &payloads).await.unwrap();
    }

    /// Deterministic embedder: per-letter counts folded into `dims` buckets.
    struct FoldEmbedder {
        dims: usize,
    }

    impl Embedder for FoldEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0f32; self.dims];
                    for b in text.bytes().filter(u8::is_ascii_alphabetic) {
                        v[usize::from(b.to_ascii_lowercase() - b'a') % self.dims] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dims
        }
    }

    type Service = MemoryService<DirectMemoryEngine<DocumentVectorStore<InMemoryDocumentStore>, FoldEmbedder>>;

    fn service(kind: IndexKind, ttl: i64) -> Service {
        let engine = DirectMemoryEngine::new(adapter(kind, 8), FoldEmbedder { dims: 8 });
        MemoryService::new(Arc::new(engine), ttl, BatchCoordinator::new(50))
            .with_clock(Arc::new(FixedClock(NOW)))
    }

    #[tokio::test]
    async fn test_first_write_creates_index_once() {
        let store = adapter(IndexKind::DiskAnn, 3);
        seed(&store).await;
        store.search(&[1.0, 0.0, 0.0], 2, &Filters::new()).await.unwrap();
        store.search(&[0.0, 1.0, 0.0], 2, &Filters::new()).await.unwrap();

        assert_eq!(store.store().count("createIndexes"), 1);
        assert_eq!(store.store().count("listIndexes"), 1);
        let status = store.index_manager().cached("memories").unwrap();
        assert_eq!(status.verification, IndexVerification::Created);
    }

    #[tokio::test]
    async fn test_search_returns_self_first_with_non_increasing_scores() {
        let store = adapter(IndexKind::DiskAnn, 3);
        seed(&store).await;

        let hits = store.search(&[1.0, 0.0, 0.0], 4, &Filters::new()).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score.unwrap() - 1.0).abs() < 1e-5);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].payload.content, "likes tea");
    }

    #[tokio::test]
    async fn test_search_with_hnsw_dialect() {
        let store = adapter(IndexKind::Hnsw, 3);
        seed(&store).await;

        let hits = store.search(&[0.0, 1.0, 0.0], 1, &Filters::new()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c");

        let reply = store
            .store()
            .run_command(command("listIndexes", "memories"))
            .await
            .unwrap();
        assert_eq!(
            reply["cursor"]["firstBatch"][1]["cosmosSearchOptions"]["kind"],
            json!("vector-hnsw")
        );
    }

    #[tokio::test]
    async fn test_search_equal_scores_break_ties_by_id() {
        let store = adapter(IndexKind::DiskAnn, 2);
        let ids: Vec<String> = ["z", "m", "b"].iter().map(|s| s.to_string()).collect();
        let vectors = vec![vec![1.0, 0.0]; 3];
        let payloads = vec![payload("same", "u1"); 3];
        store.insert(&ids, &vectors, &payloads).await.unwrap();

        let hits = store.search(&[1.0, 0.0], 2, &Filters::new()).await.unwrap();
        let got: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(got, vec!["b", "m"]);
    }

    #[tokio::test]
    async fn test_search_filters_match_in_memory_evaluation() {
        let store = adapter(IndexKind::DiskAnn, 3);
        seed(&store).await;

        let cases = [
            json!({"user_id": "u1"}),
            json!({"user_id": "u1", "category": "fact"}),
            json!({"category": {"in": ["episodic", "fact"]}}),
            json!({"user_id": {"eq": "u2"}}),
            json!({"user_id": "nobody"}),
        ];
        let all = store.list(&Filters::new(), 100).await.unwrap();

        for case in cases {
            let f = filters(case.clone());
            let conditions = parse_filters(&f).unwrap();
            let mut expected: Vec<String> = all
                .iter()
                .filter(|r| {
                    let payload = r.payload.to_document().unwrap();
                    conditions.iter().all(|c| c.matches(&payload))
                })
                .map(|r| r.id.clone())
                .collect();
            expected.sort();

            let mut searched: Vec<String> = store
                .search(&[1.0, 1.0, 1.0], 10, &f)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.id)
                .collect();
            searched.sort();
            let mut listed: Vec<String> = store
                .list(&f, 10)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.id)
                .collect();
            listed.sort();

            assert_eq!(searched, expected, "search with {case}");
            assert_eq!(listed, expected, "list with {case}");
        }
    }

    #[tokio::test]
    async fn test_search_validation_happens_before_any_round_trip() {
        let store = adapter(IndexKind::DiskAnn, 3);

        let err = store.search(&[1.0, 0.0], 1, &Filters::new()).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        let err = store.search(&[1.0, 0.0, 0.0], 0, &Filters::new()).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        let err = store
            .search(&[1.0, 0.0, 0.0], 1, &filters(json!({"user_id": {"gt": 1}})))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));

        assert!(store.store().operations().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_configured_kind_mismatch_keeps_existing_index_queryable() {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let diskann = DocumentVectorStore::new(
            Arc::clone(&docs),
            AdapterSettings::new("memories", 3, IndexKind::DiskAnn),
        );
        seed(&diskann).await;

        let hnsw = DocumentVectorStore::new(
            Arc::clone(&docs),
            AdapterSettings::new("memories", 3, IndexKind::Hnsw),
        );
        let status = hnsw.ensure_index().await.unwrap();
        assert_eq!(
            status.verification,
            IndexVerification::Mismatch {
                observed: "vector-diskann".to_string()
            }
        );
        assert_eq!(status.effective_kind, IndexKind::DiskAnn);

        let hits = hnsw.search(&[0.0, 0.0, 1.0], 1, &Filters::new()).await.unwrap();
        assert_eq!(hits[0].id, "d");
        hnsw.insert(&["e".to_string()], &[vec![0.0, 0.5, 0.5]], &[payload("new", "u3")])
            .await
            .unwrap();
        assert_eq!(hnsw.get("e").await.unwrap().payload.content, "new");

        assert_eq!(docs.count("createIndexes"), 1);
        assert_eq!(docs.count("drop"), 0);

        logs_assert(|lines: &[&str]| {
            let warnings: Vec<&&str> = lines
                .iter()
                .filter(|line| line.contains("WARN") && line.contains("kind mismatch"))
                .collect();
            match warnings.as_slice() {
                [line] if line.contains("vector-hnsw") && line.contains("vector-diskann") => Ok(()),
                other => Err(format!("expected one mismatch warning naming both kinds, got {other:?}")),
            }
        });
    }

    #[tokio::test]
    async fn test_unit_vector_scenario() {
        let store = adapter(IndexKind::DiskAnn, 8);
        let mut unit = vec![0.0; 8];
        unit[0] = 1.0;
        store
            .insert(&["a".to_string()], &[unit], &[payload("unit", "u1")])
            .await
            .unwrap();

        let mut query = vec![0.0; 8];
        query[0] = 0.9;
        query[1] = 0.1;
        let hits = store.search(&query, 1, &Filters::new()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score.unwrap() > 0.9);
    }

    #[tokio::test]
    async fn test_eight_dimensional_roundtrip_scores_high() {
        let store = adapter(IndexKind::DiskAnn, 8);
        let vector = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        store
            .insert(&["m1".to_string()], &[vector.clone()], &[payload("eight", "u1")])
            .await
            .unwrap();

        let mut query = vector.clone();
        query[0] = 0.15;
        let hits = store
            .search(&query, 5, &filters(json!({"user_id": "u1"})))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score.unwrap() > 0.9);
    }

    #[tokio::test]
    async fn test_insert_rejects_bad_records_before_writing() {
        let store = adapter(IndexKind::DiskAnn, 3);
        let err = store
            .insert(
                &["x".to_string(), "y".to_string()],
                &[vec![1.0, 0.0, 0.0], vec![1.0]],
                &[payload("ok", "u1"), payload("short", "u1")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));

        let unscoped = MemoryPayload::new("orphan", MemoryCategory::Fact, Scope::default());
        let err = store
            .insert(&["z".to_string()], &[vec![1.0, 0.0, 0.0]], &[unscoped])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));

        let err = store
            .insert(&["z".to_string()], &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        assert_eq!(store.store().count("insert"), 0);
    }

    #[tokio::test]
    async fn test_get_update_delete() {
        let store = adapter(IndexKind::DiskAnn, 3);
        seed(&store).await;

        let mut metadata = Map::new();
        metadata.insert("topic".to_string(), json!("drinks"));
        store
            .update(
                "a",
                &RecordUpdate {
                    content: Some("likes green tea".to_string()),
                    metadata: Some(metadata),
                    vector: Some(vec![0.0, 1.0, 0.0]),
                },
            )
            .await
            .unwrap();

        let record = store.get("a").await.unwrap();
        assert_eq!(record.payload.content, "likes green tea");
        assert_eq!(record.payload.metadata["topic"], json!("drinks"));
        assert_eq!(record.payload.scope, Scope::user("u1"));
        assert_eq!(record.score, None);

        let hits = store.search(&[0.0, 1.0, 0.0], 1, &filters(json!({"user_id": "u1"}))).await.unwrap();
        assert_eq!(hits[0].id, "a");

        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap_err().is_not_found());
        assert!(store.delete("a").await.unwrap_err().is_not_found());
        assert!(
            store
                .update("a", &RecordUpdate::content("gone"))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_update_rejects_reserved_and_invalid_keys() {
        let store = adapter(IndexKind::DiskAnn, 3);
        seed(&store).await;

        for key in ["user_id", "expires_at", "$where", "a.b"] {
            let mut metadata = Map::new();
            metadata.insert(key.to_string(), json!("x"));
            let update = RecordUpdate {
                metadata: Some(metadata),
                ..RecordUpdate::default()
            };
            let err = store.update("a", &update).await.unwrap_err();
            assert!(matches!(err, VectorStoreError::Validation(_)), "key {key}");
        }
        let err = store.update("a", &RecordUpdate::default()).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        assert_eq!(store.get("a").await.unwrap().payload.scope, Scope::user("u1"));
    }

    #[tokio::test]
    async fn test_list_respects_limit_and_zero() {
        let store = adapter(IndexKind::DiskAnn, 3);
        seed(&store).await;
        assert_eq!(store.list(&Filters::new(), 2).await.unwrap().len(), 2);
        assert!(store.list(&Filters::new(), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collection_lifecycle() {
        let store = adapter(IndexKind::DiskAnn, 3);
        store.create_collection("memories", 3).await.unwrap();
        store.create_collection("memories", 3).await.unwrap();
        assert_eq!(store.store().count("createIndexes"), 1);

        let err = store.create_collection("memories", 4).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        let err = store.create_collection("other", 0).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));

        seed(&store).await;
        let info = store.collection_info("memories").await.unwrap();
        assert_eq!(info.count, 4);
        assert!(info.size > 0);
        assert_eq!(store.list_collections().await.unwrap(), vec!["memories"]);

        store.reset().await.unwrap();
        assert_eq!(store.collection_info("memories").await.unwrap().count, 0);
        assert_eq!(store.store().count("createIndexes"), 2);

        store.delete_collection("memories").await.unwrap();
        assert!(store.index_manager().cached("memories").is_none());
        assert!(store.collection_info("memories").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_verbatim() {
        let store = adapter(IndexKind::DiskAnn, 3);
        store.store().set_offline(true);
        let err = store.search(&[1.0, 0.0, 0.0], 1, &Filters::new()).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Store(ref m) if m.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_reaper_deletes_expired_then_nothing() {
        let store = adapter(IndexKind::DiskAnn, 3);
        seed(&store).await;
        let reaper = store.reaper();

        let first = reaper.delete_expired(NOW).await.unwrap();
        assert_eq!(first.deleted, 1);
        assert_eq!(first.ids, vec!["c"]);
        assert_eq!(reaper.delete_expired(NOW).await.unwrap().deleted, 0);

        let later = reaper.delete_expired(NOW + 3600).await.unwrap();
        assert_eq!(later.ids, vec!["d"]);
        assert_eq!(store.list(&Filters::new(), 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_service_ttl_stamps_hides_and_reaps() {
        let service = service(IndexKind::DiskAnn, 0);
        let scope = Scope::user("u1");

        let short = service
            .add(AddMemoryRequest::new("cheese omelette", MemoryCategory::Episodic, scope.clone()).with_ttl(60))
            .await
            .unwrap();
        let durable = service
            .add(AddMemoryRequest::new("cheese is tasty", MemoryCategory::Preference, scope.clone()))
            .await
            .unwrap();
        assert_eq!(short.event, MemoryEvent::Add);

        let stored = service.engine().store().get(short.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(stored.payload.expires_at, Some(NOW + 60));
        let stored = service.engine().store().get(durable.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(stored.payload.expires_at, None);

        let reaper = service.engine().store().reaper();
        assert_eq!(reaper.delete_expired(NOW + 59).await.unwrap().deleted, 0);
        let report = reaper.delete_expired(NOW + 60).await.unwrap();
        assert_eq!(report.ids, vec![short.id.unwrap()]);

        let hits = service
            .search(SearchMemoryRequest::new("cheese", scope))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, durable.id.unwrap());
    }

    #[tokio::test]
    async fn test_service_category_filter_and_scope_isolation() {
        let service = service(IndexKind::Hnsw, 0);
        for (text, category, user) in [
            ("rides a bicycle", MemoryCategory::Fact, "u1"),
            ("prefers mornings", MemoryCategory::Preference, "u1"),
            ("rides a horse", MemoryCategory::Fact, "u2"),
        ] {
            service
                .add(AddMemoryRequest::new(text, category, Scope::user(user)))
                .await
                .unwrap();
        }

        let mut request = SearchMemoryRequest::new("rides", Scope::user("u1"));
        request.categories = Some(vec![MemoryCategory::Fact]);
        let hits = service.search(request).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory, "rides a bicycle");

        let all = service.get_all(&Scope::user("u2"), 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].metadata["category"], json!("fact"));
    }

    #[tokio::test]
    async fn test_service_batch_rejects_oversized_and_isolates_failures() {
        let service = service(IndexKind::DiskAnn, 0);

        let oversized: Vec<AddMemoryRequest> = (0..51)
            .map(|i| AddMemoryRequest::new(format!("memory {i}"), MemoryCategory::Fact, Scope::user("u1")))
            .collect();
        let err = service.batch_add(oversized).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        assert_eq!(service.engine().store().store().count("insert"), 0);

        let requests: Vec<AddMemoryRequest> = (0..10)
            .map(|i| {
                let scope = if i == 4 { Scope::default() } else { Scope::user("u1") };
                AddMemoryRequest::new(format!("memory {i}"), MemoryCategory::Fact, scope)
            })
            .collect();
        let response = service.batch_add(requests).await.unwrap();
        assert_eq!(response.total, 10);
        assert_eq!(response.succeeded, 9);
        assert!(!response.results[4].is_ok());

        let ids: Vec<String> = response
            .results
            .iter()
            .filter_map(|r| r.result.as_ref().and_then(|o| o.id.clone()))
            .collect();
        let mut to_delete = ids[..3].to_vec();
        to_delete.push("missing".to_string());
        let deleted = service.batch_delete(to_delete).await.unwrap();
        assert_eq!(deleted.succeeded, 3);
        assert_eq!(deleted.failed, 1);
        assert_eq!(service.get_all(&Scope::user("u1"), 100).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_service_from_config_applies_batch_limit_and_default_ttl() {
        let config = DocmemConfig {
            embedding_dims: 8,
            default_ttl_seconds: 120,
            max_batch_size: 20,
            ..DocmemConfig::default()
        };
        let adapter =
            DocumentVectorStore::from_config(Arc::new(InMemoryDocumentStore::new()), &config).unwrap();
        let settings = adapter.settings().clone();
        let engine = DirectMemoryEngine::new(adapter, FoldEmbedder { dims: 8 });
        let service = MemoryService::from_settings(Arc::new(engine), &settings)
            .with_clock(Arc::new(FixedClock(NOW)));

        let requests: Vec<AddMemoryRequest> = (0..21)
            .map(|i| AddMemoryRequest::new(format!("memory {i}"), MemoryCategory::Fact, Scope::user("u1")))
            .collect();
        let err = service.batch_add(requests).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        assert_eq!(service.engine().store().store().count("insert"), 0);

        let requests: Vec<AddMemoryRequest> = (0..20)
            .map(|i| AddMemoryRequest::new(format!("memory {i}"), MemoryCategory::Fact, Scope::user("u1")))
            .collect();
        assert_eq!(service.batch_add(requests).await.unwrap().succeeded, 20);

        let all = service.get_all(&Scope::user("u1"), 100).await.unwrap();
        assert_eq!(all.len(), 20);
        assert!(all.iter().all(|m| m.expires_at() == Some(NOW + 120)));
    }

    #[tokio::test]
    async fn test_service_update_reembeds_content() {
        let service = service(IndexKind::DiskAnn, 0);
        let added = service
            .add(AddMemoryRequest::new("apples", MemoryCategory::Fact, Scope::agent("bot")))
            .await
            .unwrap();
        let id = added.id.unwrap();

        let updated = service.update(&id, "zebra").await.unwrap();
        assert_eq!(updated.memory, "zebra");

        let hits = service
            .search(SearchMemoryRequest::new("zebra", Scope::agent("bot")))
            .await
            .unwrap();
        assert!(hits[0].score.unwrap() > 0.99);
    }
}
