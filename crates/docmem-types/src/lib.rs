//! Shared domain types for docmem.
//!
//! Memory records and payloads, ANN index descriptors for the two supported
//! dialects, engine-level filter expressions, batch outcomes, configuration,
//! and the error taxonomy shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod batch;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod memory;
