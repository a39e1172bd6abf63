//! Similarity-search pipeline construction for both ANN dialects.
//!
//! Every pipeline has the same three-stage shape:
//!
//! 1. `$search` with a `cosmosSearch` operator carrying the query vector, the
//!    result count and the dialect's exploration parameter
//! 2. `$project` of the native score field (via `{"$meta": "searchScore"}`)
//!    and the stored source as `document`
//! 3. an optional `$match` post-filter over `document.payload.*`
//!
//! Filters are never pushed into the similarity stage.

use docmem_types::index::{IndexKind, VECTOR_PATH};
use serde_json::{Value, json};

use crate::store::document::{Document, document, vector_value};

/// Query-time candidate list size for diskann-style indexes.
pub const DISKANN_L_SEARCH: u32 = 40;

/// Query-time candidate list size for hnsw-style indexes.
pub const HNSW_EF_SEARCH: u32 = 40;

/// Builds the native similarity-search pipeline for an index dialect.
pub struct QueryBuilder;

impl QueryBuilder {
    /// Exploration parameter value for `kind`.
    pub fn search_param_value(kind: IndexKind) -> u32 {
        match kind {
            IndexKind::DiskAnn => DISKANN_L_SEARCH,
            IndexKind::Hnsw => HNSW_EF_SEARCH,
        }
    }

    pub fn build(
        kind: IndexKind,
        vector: &[f32],
        k: usize,
        post_filter: Option<Document>,
    ) -> Vec<Document> {
        let mut cosmos_search = Document::new();
        cosmos_search.insert("vector".to_string(), vector_value(vector));
        cosmos_search.insert("path".to_string(), Value::from(VECTOR_PATH));
        cosmos_search.insert("k".to_string(), Value::from(k));
        cosmos_search.insert(
            kind.search_param().to_string(),
            Value::from(Self::search_param_value(kind)),
        );

        let search = document(json!({
            "$search": {
                "cosmosSearch": cosmos_search,
                "returnStoredSource": true,
            }
        }));

        let mut projection = Document::new();
        projection.insert(
            kind.score_field().to_string(),
            json!({ "$meta": "searchScore" }),
        );
        projection.insert("document".to_string(), Value::from("$$ROOT"));
        let project = document(json!({ "$project": projection }));

        let mut pipeline = vec![search, project];
        if let Some(filter) = post_filter {
            pipeline.push(document(json!({ "$match": filter })));
        }
        pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diskann_pipeline_shape() {
        let pipeline = QueryBuilder::build(IndexKind::DiskAnn, &[1.0, 0.0], 5, None);
        assert_eq!(pipeline.len(), 2);
        assert_eq!(
            Value::Object(pipeline[0].clone()),
            json!({"$search": {
                "cosmosSearch": {
                    "vector": [1.0, 0.0],
                    "path": "embedding",
                    "k": 5,
                    "lSearch": 40,
                },
                "returnStoredSource": true,
            }})
        );
        assert_eq!(
            Value::Object(pipeline[1].clone()),
            json!({"$project": {
                "similarityScore": {"$meta": "searchScore"},
                "document": "$$ROOT",
            }})
        );
    }

    #[test]
    fn test_hnsw_pipeline_uses_its_own_parameter_and_score_field() {
        let pipeline = QueryBuilder::build(IndexKind::Hnsw, &[0.5], 3, None);
        let search = &pipeline[0]["$search"]["cosmosSearch"];
        assert_eq!(search["efSearch"], json!(40));
        assert!(search.get("lSearch").is_none());
        assert!(pipeline[1]["$project"].get("score").is_some());
        assert!(pipeline[1]["$project"].get("similarityScore").is_none());
    }

    #[test]
    fn test_post_filter_is_a_trailing_match_stage() {
        let filter = document(json!({"$and": [{"document.payload.user_id": "u1"}]}));
        let pipeline = QueryBuilder::build(IndexKind::DiskAnn, &[1.0], 2, Some(filter.clone()));
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline[2]["$match"], Value::Object(filter));
        assert!(pipeline[0]["$search"]["cosmosSearch"].get("filter").is_none());
    }
}
