//! Infrastructure layer for docmem.
//!
//! Contains implementations of the traits defined in `docmem-core`: the
//! in-process document store, the MongoDB-wire document store (feature
//! `mongodb`), the document-store vector adapter, and configuration loading.

pub mod config;
pub mod document;
pub mod vector;
