//! Contracts and orchestration logic for docmem.
//!
//! This crate defines the "ports" the infrastructure layer implements: the
//! wire-level [`store::DocumentStore`] contract and the engine-facing
//! [`vector::store::VectorStore`] capability contract. On top of those it provides
//! the index lifecycle manager, filter translation and query construction for
//! both ANN dialects, the batch coordinator, the TTL reaper, and the memory
//! service. It depends only on `docmem-types` -- never on `docmem-infra` or
//! any driver crate.

pub mod batch;
pub mod clock;
pub mod index;
pub mod memory;
pub mod query;
pub mod store;
pub mod ttl;
pub mod vector;
