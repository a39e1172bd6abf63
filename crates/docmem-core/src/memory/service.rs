//! Long-term memory service.
//!
//! Orchestrates memory writes and reads through a [`MemoryEngine`]:
//! validates scope, stamps TTL expirations, translates category filters,
//! hides expired records from reads, and fans batch requests out through the
//! [`BatchCoordinator`]. Expired records are physically removed by the
//! [`TtlReaper`], using the same clock that stamped them.

use std::sync::Arc;

use docmem_types::batch::BatchResponse;
use docmem_types::config::AdapterSettings;
use docmem_types::error::VectorStoreError;
use docmem_types::filter::Filters;
use docmem_types::memory::{
    AddMemoryRequest, AddOutcome, EXPIRES_AT_KEY, HistoryEntry, MemoryItem, Scope,
    SearchMemoryRequest,
};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::batch::BatchCoordinator;
use crate::clock::{Clock, SystemClock};
use crate::store::document::DocumentStore;
use crate::ttl::{ReapReport, TtlReaper};

use super::engine::MemoryEngine;

/// Service for scoped long-term memory.
///
/// Generic over the engine so that docmem-core never depends on a concrete
/// backend. Cheap to clone; clones share the engine.
pub struct MemoryService<E: MemoryEngine> {
    engine: Arc<E>,
    default_ttl_seconds: i64,
    batch: BatchCoordinator,
    clock: Arc<dyn Clock>,
}

impl<E: MemoryEngine> Clone for MemoryService<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            default_ttl_seconds: self.default_ttl_seconds,
            batch: self.batch,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<E: MemoryEngine + 'static> MemoryService<E> {
    /// Create a new MemoryService.
    ///
    /// - `default_ttl_seconds`: applied when a request carries no TTL; 0 disables expiration
    /// - `batch`: size limit and optional deadline for batch operations
    pub fn new(engine: Arc<E>, default_ttl_seconds: i64, batch: BatchCoordinator) -> Self {
        Self {
            engine,
            default_ttl_seconds,
            batch,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a service with the default TTL and batch limit of `settings`.
    pub fn from_settings(engine: Arc<E>, settings: &AdapterSettings) -> Self {
        Self::new(
            engine,
            settings.default_ttl_seconds,
            BatchCoordinator::new(settings.max_batch_size),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Store a memory.
    ///
    /// The request TTL wins over the default. A positive TTL stamps
    /// `expires_at = now + ttl`. An engine that stores nothing yields a
    /// `NOOP` outcome.
    pub async fn add(&self, request: AddMemoryRequest) -> Result<AddOutcome, VectorStoreError> {
        request.validate()?;

        let mut metadata = request.metadata.unwrap_or_default();
        metadata.insert(
            "category".to_string(),
            Value::String(request.category.to_string()),
        );
        let ttl = request.ttl_seconds.unwrap_or(self.default_ttl_seconds);
        if ttl > 0 {
            let expires_at = self
                .clock
                .now()
                .checked_add(ttl)
                .ok_or_else(|| VectorStoreError::validation("ttl_seconds too large"))?;
            metadata.insert(EXPIRES_AT_KEY.to_string(), Value::from(expires_at));
        }

        let outcome = self
            .engine
            .add(&request.messages, &request.scope, metadata)
            .await?;
        match outcome {
            Some(outcome) => {
                info!(memory_id = ?outcome.id, category = %request.category, ttl, "memory added");
                Ok(outcome)
            }
            None => {
                debug!("engine stored nothing");
                Ok(AddOutcome::noop())
            }
        }
    }

    /// Scoped similarity search. Expired hits are dropped.
    pub async fn search(
        &self,
        request: SearchMemoryRequest,
    ) -> Result<Vec<MemoryItem>, VectorStoreError> {
        request.validate()?;

        let mut filters = Filters::new();
        if let Some(categories) = &request.categories {
            let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
            filters.insert("category".to_string(), json!({ "in": names }));
        }

        let items = self
            .engine
            .search(&request.query, &request.scope, request.limit, &filters)
            .await?;
        Ok(self.drop_expired(items))
    }

    pub async fn get(&self, id: &str) -> Result<MemoryItem, VectorStoreError> {
        self.engine.get(id).await
    }

    /// Every live memory of `scope`, up to `limit`.
    pub async fn get_all(
        &self,
        scope: &Scope,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, VectorStoreError> {
        scope.validate()?;
        let items = self.engine.get_all(scope, limit).await?;
        Ok(self.drop_expired(items))
    }

    /// Replace a memory's content and return the updated memory.
    pub async fn update(&self, id: &str, data: &str) -> Result<MemoryItem, VectorStoreError> {
        if data.trim().is_empty() {
            return Err(VectorStoreError::validation("memory content must not be empty"));
        }
        self.engine.update(id, data).await?;
        self.engine.get(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        self.engine.delete(id).await
    }

    pub async fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, VectorStoreError> {
        self.engine.history(id).await
    }

    pub async fn batch_add(
        &self,
        requests: Vec<AddMemoryRequest>,
    ) -> Result<BatchResponse<AddOutcome>, VectorStoreError> {
        let results = self
            .batch
            .run(requests, |_, request| {
                let service = self.clone();
                async move { service.add(request).await }
            })
            .await?;
        Ok(results.into())
    }

    pub async fn batch_search(
        &self,
        requests: Vec<SearchMemoryRequest>,
    ) -> Result<BatchResponse<Vec<MemoryItem>>, VectorStoreError> {
        let results = self
            .batch
            .run(requests, |_, request| {
                let service = self.clone();
                async move { service.search(request).await }
            })
            .await?;
        Ok(results.into())
    }

    /// Delete memories by id. Each successful item reports the deleted id.
    pub async fn batch_delete(
        &self,
        ids: Vec<String>,
    ) -> Result<BatchResponse<String>, VectorStoreError> {
        let results = self
            .batch
            .run(ids, |_, id| {
                let service = self.clone();
                async move { service.delete(&id).await.map(|()| id) }
            })
            .await?;
        Ok(results.into())
    }

    /// Sweep records expired at the service clock's current time.
    pub async fn delete_expired<S: DocumentStore>(
        &self,
        reaper: &TtlReaper<S>,
    ) -> Result<ReapReport, VectorStoreError> {
        reaper.delete_expired(self.clock.now()).await
    }

    fn drop_expired(&self, mut items: Vec<MemoryItem>) -> Vec<MemoryItem> {
        let now = self.clock.now();
        let before = items.len();
        items.retain(|item| !item.is_expired(now));
        if items.len() < before {
            debug!(hidden = before - items.len(), "dropped expired memories from results");
        }
        items
    }
}
