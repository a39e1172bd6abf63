//! Similarity-query construction.
//!
//! [`filter::FilterTranslator`] maps engine filters onto store predicates;
//! [`pipeline::QueryBuilder`] assembles the per-dialect search pipeline.

pub mod filter;
pub mod pipeline;
