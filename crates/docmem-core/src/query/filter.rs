//! Engine filters to store-native predicates.

use docmem_types::error::VectorStoreError;
use docmem_types::filter::{FilterOp, Filters, parse_filters};
use serde_json::{Value, json};

use crate::store::document::Document;

/// Payload prefix after the search projection wraps the source as `document`.
pub const SEARCH_PAYLOAD_PREFIX: &str = "document.payload.";

/// Payload prefix for plain `find` queries.
pub const FIND_PAYLOAD_PREFIX: &str = "payload.";

/// Pure mapping from engine-level filters to store predicates.
pub struct FilterTranslator;

impl FilterTranslator {
    /// Translate `filters` into `{"$and": [...]}` with every field under `prefix`.
    ///
    /// Returns `None` for an empty filter set. Unsupported operators fail with
    /// [`VectorStoreError::Validation`] without touching the store.
    pub fn translate(
        filters: &Filters,
        prefix: &str,
    ) -> Result<Option<Document>, VectorStoreError> {
        let conditions = parse_filters(filters)?;
        if conditions.is_empty() {
            return Ok(None);
        }

        let clauses: Vec<Value> = conditions
            .into_iter()
            .map(|cond| {
                let path = format!("{prefix}{}", cond.field);
                match cond.op {
                    FilterOp::Eq(value) => json!({ path: value }),
                    FilterOp::In(values) => json!({ path: { "$in": values } }),
                }
            })
            .collect();

        let mut predicate = Document::new();
        predicate.insert("$and".to_string(), Value::Array(clauses));
        Ok(Some(predicate))
    }

    /// Like [`translate`](Self::translate), but an empty filter set becomes `{}`.
    pub fn translate_or_all(filters: &Filters, prefix: &str) -> Result<Document, VectorStoreError> {
        Ok(Self::translate(filters, prefix)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmem_types::filter::FilterCondition;
    use serde_json::Map;

    fn filters(pairs: &[(&str, Value)]) -> Filters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_filters_translate_to_none() {
        assert_eq!(
            FilterTranslator::translate(&Filters::new(), SEARCH_PAYLOAD_PREFIX).unwrap(),
            None
        );
        assert!(
            FilterTranslator::translate_or_all(&Filters::new(), FIND_PAYLOAD_PREFIX)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_translate_eq_and_in() {
        let f = filters(&[
            ("user_id", json!("u1")),
            ("category", json!({"in": ["fact", "preference"]})),
            ("agent_id", json!({"eq": "a1"})),
        ]);
        let predicate = FilterTranslator::translate(&f, SEARCH_PAYLOAD_PREFIX)
            .unwrap()
            .unwrap();
        assert_eq!(
            Value::Object(predicate),
            json!({"$and": [
                {"document.payload.agent_id": "a1"},
                {"document.payload.category": {"$in": ["fact", "preference"]}},
                {"document.payload.user_id": "u1"},
            ]})
        );
    }

    #[test]
    fn test_find_prefix() {
        let f = filters(&[("run_id", json!("s1"))]);
        let predicate = FilterTranslator::translate_or_all(&f, FIND_PAYLOAD_PREFIX).unwrap();
        assert_eq!(
            Value::Object(predicate),
            json!({"$and": [{"payload.run_id": "s1"}]})
        );
    }

    #[test]
    fn test_unsupported_operator_fails_fast() {
        let f = filters(&[("score", json!({"gt": 0.5}))]);
        let err = FilterTranslator::translate(&f, SEARCH_PAYLOAD_PREFIX).unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
    }

    /// Evaluate a translated `$and` of `{path: v}` / `{path: {"$in": [..]}}`
    /// clauses against a payload, resolving the prefix away.
    fn eval_translated(predicate: &Document, prefix: &str, payload: &Map<String, Value>) -> bool {
        let Some(Value::Array(clauses)) = predicate.get("$and") else {
            return true;
        };
        clauses.iter().all(|clause| {
            let (path, cond) = clause.as_object().unwrap().iter().next().unwrap();
            let field = path.strip_prefix(prefix).unwrap();
            let actual = payload.get(field);
            match cond.as_object().and_then(|o| o.get("$in")) {
                Some(Value::Array(options)) => options
                    .iter()
                    .any(|o| docmem_types::filter::value_matches_eq(actual, o)),
                _ => docmem_types::filter::value_matches_eq(actual, cond),
            }
        })
    }

    #[test]
    fn test_translation_agrees_with_in_memory_evaluation() {
        let payloads: Vec<Map<String, Value>> = [
            json!({"category": "fact", "user_id": "u1"}),
            json!({"category": "episodic", "user_id": "u1"}),
            json!({"category": "fact", "user_id": "u2"}),
            json!({"category": "preference", "user_id": "u1", "tags": ["x", "y"]}),
            json!({"user_id": "u3"}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();

        let cases = [
            filters(&[("category", json!("fact"))]),
            filters(&[("category", json!({"eq": "episodic"}))]),
            filters(&[("category", json!({"in": ["fact", "preference"]}))]),
            filters(&[("category", json!({"in": []}))]),
            filters(&[("user_id", json!("u1")), ("tags", json!("y"))]),
            filters(&[("category", Value::Null)]),
        ];

        for case in cases {
            let predicate = FilterTranslator::translate_or_all(&case, FIND_PAYLOAD_PREFIX).unwrap();
            let conditions = parse_filters(&case).unwrap();
            for payload in &payloads {
                let direct = conditions.iter().all(|c: &FilterCondition| c.matches(payload));
                assert_eq!(
                    eval_translated(&predicate, FIND_PAYLOAD_PREFIX, payload),
                    direct,
                    "filter {case:?} on {payload:?}"
                );
            }
        }
    }
}
