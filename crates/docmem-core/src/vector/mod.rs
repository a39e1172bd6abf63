//! Vector-store capability contract consumed by the memory engine.
//!
//! [`store::VectorStore`] is the RPITIT trait a backend implements.

pub mod store;
