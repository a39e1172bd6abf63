//! Memory engine seam and a direct implementation over a vector store.
//!
//! The memory service never talks to the vector store itself: it drives a
//! [`MemoryEngine`]. In production that is the external orchestration engine
//! (fact extraction, deduplication, history); [`DirectMemoryEngine`] is the
//! minimal stand-in that embeds and stores content verbatim.

use std::future::Future;

use docmem_types::error::VectorStoreError;
use docmem_types::filter::Filters;
use docmem_types::memory::{
    AddOutcome, EXPIRES_AT_KEY, HistoryEntry, MemoryCategory, MemoryEvent, MemoryInput,
    MemoryItem, MemoryPayload, RecordUpdate, Scope,
};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::vector::store::VectorStore;

/// Trait for the memory-orchestration engine the service delegates to.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait MemoryEngine: Send + Sync {
    /// Store `input` under `scope`. `None` means nothing was stored.
    ///
    /// `metadata` carries `category` and, when set, `expires_at`.
    fn add(
        &self,
        input: &MemoryInput,
        scope: &Scope,
        metadata: Map<String, Value>,
    ) -> impl Future<Output = Result<Option<AddOutcome>, VectorStoreError>> + Send;

    fn search(
        &self,
        query: &str,
        scope: &Scope,
        limit: usize,
        filters: &Filters,
    ) -> impl Future<Output = Result<Vec<MemoryItem>, VectorStoreError>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = Result<MemoryItem, VectorStoreError>> + Send;

    fn get_all(
        &self,
        scope: &Scope,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<MemoryItem>, VectorStoreError>> + Send;

    /// Replace the content of a memory.
    fn update(
        &self,
        id: &str,
        data: &str,
    ) -> impl Future<Output = Result<(), VectorStoreError>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = Result<(), VectorStoreError>> + Send;

    fn history(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, VectorStoreError>> + Send;
}

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Embedder: Send + Sync {
    /// Embed texts into vectors, one per input.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, VectorStoreError>> + Send;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}

/// Memory engine that embeds content and writes it straight to a vector store.
///
/// No fact extraction or deduplication: every non-blank input becomes one
/// record with a time-sortable (UUID v7) id. History is not tracked.
pub struct DirectMemoryEngine<V: VectorStore, E: Embedder> {
    store: V,
    embedder: E,
}

impl<V: VectorStore, E: Embedder> DirectMemoryEngine<V, E> {
    pub fn new(store: V, embedder: E) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &V {
        &self.store
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, VectorStoreError> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| VectorStoreError::store("embedder returned no vector"))
    }
}

/// Pull the typed keys out of engine metadata.
fn split_metadata(
    mut metadata: Map<String, Value>,
) -> Result<(MemoryCategory, Option<i64>, Map<String, Value>), VectorStoreError> {
    let category = match metadata.remove("category") {
        Some(Value::String(s)) => s.parse().map_err(VectorStoreError::Validation)?,
        Some(other) => {
            return Err(VectorStoreError::validation(format!(
                "category must be a string, got {other}"
            )));
        }
        None => MemoryCategory::Semantic,
    };
    let expires_at = match metadata.remove(EXPIRES_AT_KEY) {
        Some(value) => Some(value.as_i64().ok_or_else(|| {
            VectorStoreError::validation(format!("{EXPIRES_AT_KEY} must be an integer"))
        })?),
        None => None,
    };
    Ok((category, expires_at, metadata))
}

/// Scope filters merged over caller filters; the scope wins on conflicts.
fn scoped_filters(scope: &Scope, filters: &Filters) -> Filters {
    let mut merged = filters.clone();
    merged.extend(scope.to_filters());
    merged
}

impl<V: VectorStore, E: Embedder> MemoryEngine for DirectMemoryEngine<V, E> {
    async fn add(
        &self,
        input: &MemoryInput,
        scope: &Scope,
        metadata: Map<String, Value>,
    ) -> Result<Option<AddOutcome>, VectorStoreError> {
        let text = input.to_text();
        if text.trim().is_empty() {
            return Ok(None);
        }
        scope.validate()?;

        let (category, expires_at, extra) = split_metadata(metadata)?;
        let mut payload = MemoryPayload::new(text.clone(), category, scope.clone()).with_metadata(extra);
        payload.expires_at = expires_at;

        let vector = self.embed_one(&text).await?;
        let id = Uuid::now_v7().to_string();
        self.store
            .insert(std::slice::from_ref(&id), &[vector], &[payload])
            .await?;

        info!(memory_id = %id, category = %category, "stored memory");
        Ok(Some(AddOutcome {
            id: Some(id),
            memory: text,
            event: MemoryEvent::Add,
        }))
    }

    async fn search(
        &self,
        query: &str,
        scope: &Scope,
        limit: usize,
        filters: &Filters,
    ) -> Result<Vec<MemoryItem>, VectorStoreError> {
        let filters = scoped_filters(scope, filters);
        let vector = self.embed_one(query).await?;
        let hits = self.store.search(&vector, limit, &filters).await?;
        debug!(hits = hits.len(), limit, "memory search");
        Ok(hits.into_iter().map(MemoryItem::from).collect())
    }

    async fn get(&self, id: &str) -> Result<MemoryItem, VectorStoreError> {
        Ok(self.store.get(id).await?.into())
    }

    async fn get_all(&self, scope: &Scope, limit: usize) -> Result<Vec<MemoryItem>, VectorStoreError> {
        let records = self.store.list(&scope.to_filters(), limit).await?;
        Ok(records.into_iter().map(MemoryItem::from).collect())
    }

    async fn update(&self, id: &str, data: &str) -> Result<(), VectorStoreError> {
        let vector = self.embed_one(data).await?;
        let update = RecordUpdate {
            content: Some(data.to_string()),
            metadata: None,
            vector: Some(vector),
        };
        self.store.update(id, &update).await
    }

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        self.store.delete(id).await
    }

    async fn history(&self, _id: &str) -> Result<Vec<HistoryEntry>, VectorStoreError> {
        Ok(Vec::new())
    }
}
