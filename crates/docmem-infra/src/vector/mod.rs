//! `VectorStore` implementations.

pub mod adapter;
