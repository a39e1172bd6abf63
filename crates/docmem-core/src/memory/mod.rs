//! Long-term memory on top of the vector store.
//!
//! This module defines the [`engine::MemoryEngine`] seam to the external
//! memory-orchestration engine, a minimal [`engine::DirectMemoryEngine`] that
//! talks to a [`VectorStore`](crate::vector::store::VectorStore) directly, and
//! the [`service::MemoryService`] that adds TTL stamping, expired-hit
//! filtering and batch operations.

pub mod engine;
pub mod service;
