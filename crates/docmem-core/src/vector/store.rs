//! Vector store trait.
//!
//! The capability contract an external memory engine expects from its
//! vector backend. Implementations (e.g., the document-store adapter) live in
//! docmem-infra.

use docmem_types::error::VectorStoreError;
use docmem_types::filter::Filters;
use docmem_types::memory::{CollectionInfo, MemoryPayload, RecordUpdate, StoredMemory};

/// Trait for vector-indexed record storage with similarity search.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in docmem-infra.
pub trait VectorStore: Send + Sync {
    /// Create a collection with the given dimensionality. Idempotent.
    fn create_collection(
        &self,
        name: &str,
        dims: u32,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Bulk-write records. `ids`, `vectors` and `payloads` are parallel slices.
    ///
    /// Not atomic across records: a store failure may leave a prefix written.
    fn insert(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        payloads: &[MemoryPayload],
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Up to `k` records most similar to `vector`, best first.
    fn search(
        &self,
        vector: &[f32],
        k: usize,
        filters: &Filters,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMemory>, VectorStoreError>> + Send;

    /// Fetch one record. Missing ids signal [`VectorStoreError::NotFound`].
    fn get(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<StoredMemory, VectorStoreError>> + Send;

    /// Unordered page of records matching `filters`.
    fn list(
        &self,
        filters: &Filters,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMemory>, VectorStoreError>> + Send;

    /// Partially update a record's content, metadata or vector.
    fn update(
        &self,
        id: &str,
        update: &RecordUpdate,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    fn delete(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Drop a collection together with its index.
    fn delete_collection(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    fn collection_info(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<CollectionInfo, VectorStoreError>> + Send;

    /// Drop and recreate the configured collection.
    fn reset(&self) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    fn list_collections(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, VectorStoreError>> + Send;
}
