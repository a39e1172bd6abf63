//! In-process document store.
//!
//! Interprets the subset of the MongoDB dialect the adapter speaks: the
//! `create`, `createIndexes`, `listIndexes` and `collStats` commands, CRUD
//! verbs with query-operator filters, `$set` updates, and aggregation
//! pipelines made of `$search` (`cosmosSearch`), `$project`, `$match` and
//! `$limit`. Vector indexes are validated per dialect the way the managed
//! service does: a diskann-style definition must carry `maxDegree`/`lBuild`,
//! an hnsw-style one `m`/`efConstruction`, and searches must use the matching
//! exploration parameter.
//!
//! Every operation is appended to an operation log so tests can count
//! round trips, and the store can be switched offline to exercise
//! transport failures.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use docmem_core::index::COSMOS_SEARCH;
use docmem_core::store::document::{
    COLL_STATS, CREATE_INDEXES, Document, DocumentStore, LIST_INDEXES, UpdateResult, document,
    document_id, vector_from_value,
};
use docmem_types::error::VectorStoreError;
use docmem_types::filter::value_matches_eq;
use docmem_types::index::{IndexKind, SimilarityMetric};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use uuid::Uuid;

/// One logged operation: the verb and the collection it addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedOperation {
    pub verb: String,
    pub collection: String,
}

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<Document>,
    /// Index specs other than the implicit `_id_` index.
    indexes: Vec<Document>,
}

/// A vector index definition, parsed from its spec.
#[derive(Debug, Clone)]
struct VectorIndex {
    path: String,
    kind: IndexKind,
    dimensions: usize,
    similarity: SimilarityMetric,
}

/// A pipeline row: the current document plus the similarity score, once computed.
struct Row {
    doc: Document,
    score: Option<f64>,
}

/// In-process implementation of [`DocumentStore`].
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<BTreeMap<String, Collection>>,
    log: Mutex<Vec<LoggedOperation>>,
    offline: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Every operation received so far, oldest first.
    pub fn operations(&self) -> Vec<LoggedOperation> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of operations with the given verb.
    pub fn count(&self, verb: &str) -> usize {
        self.operations().iter().filter(|op| op.verb == verb).count()
    }

    pub fn clear_operations(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    fn begin(&self, verb: &str, collection: &str) -> Result<(), VectorStoreError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(LoggedOperation {
                verb: verb.to_string(),
                collection: collection.to_string(),
            });
        }
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(VectorStoreError::store(
                "connection refused: document store unreachable",
            ));
        }
        Ok(())
    }

    async fn create_indexes(&self, command: &Document) -> Result<Document, VectorStoreError> {
        let collection = command_collection(command, CREATE_INDEXES)?;
        let specs = command
            .get("indexes")
            .and_then(Value::as_array)
            .filter(|specs| !specs.is_empty())
            .ok_or_else(|| VectorStoreError::store("createIndexes requires a non-empty 'indexes' array"))?;

        let specs: Vec<Document> = specs
            .iter()
            .map(|spec| {
                let spec = spec
                    .as_object()
                    .cloned()
                    .ok_or_else(|| VectorStoreError::store("index spec must be a document"))?;
                validate_index_spec(&spec)?;
                Ok(spec)
            })
            .collect::<Result<_, VectorStoreError>>()?;

        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        let before = coll.indexes.len();
        for spec in specs {
            let name = spec.get("name").cloned();
            match coll.indexes.iter().find(|existing| existing.get("name") == name.as_ref()) {
                Some(existing) if *existing == spec => {}
                Some(_) => {
                    return Err(VectorStoreError::store(format!(
                        "Index already exists with a different definition: {}",
                        name.unwrap_or(Value::Null)
                    )));
                }
                None => {
                    let path = vector_path(&spec);
                    if path.is_some()
                        && coll.indexes.iter().any(|existing| vector_path(existing) == path)
                    {
                        return Err(VectorStoreError::store(
                            "only one vector index per path is supported",
                        ));
                    }
                    coll.indexes.push(spec);
                }
            }
        }

        Ok(document(json!({
            "numIndexesBefore": before + 1,
            "numIndexesAfter": coll.indexes.len() + 1,
            "ok": 1,
        })))
    }

    async fn list_indexes(&self, command: &Document) -> Result<Document, VectorStoreError> {
        let collection = command_collection(command, LIST_INDEXES)?;
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::not_found(format!("ns does not exist: {collection}")))?;

        let mut batch = vec![json!({"v": 2, "key": {"_id": 1}, "name": "_id_"})];
        batch.extend(coll.indexes.iter().cloned().map(Value::Object));
        Ok(document(json!({
            "cursor": {"id": 0, "ns": collection, "firstBatch": batch},
            "ok": 1,
        })))
    }

    async fn coll_stats(&self, command: &Document) -> Result<Document, VectorStoreError> {
        let collection = command_collection(command, COLL_STATS)?;
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::not_found(format!("ns does not exist: {collection}")))?;

        let size: usize = coll
            .docs
            .iter()
            .map(|doc| Value::Object(doc.clone()).to_string().len())
            .sum();
        Ok(document(json!({
            "ns": collection,
            "count": coll.docs.len(),
            "size": size,
            "nindexes": coll.indexes.len() + 1,
            "ok": 1,
        })))
    }

    fn search_stage(
        coll: &Collection,
        stage: &Value,
    ) -> Result<Vec<Row>, VectorStoreError> {
        let search = stage
            .get("cosmosSearch")
            .and_then(Value::as_object)
            .ok_or_else(|| VectorStoreError::store("$search requires a 'cosmosSearch' operator"))?;

        let index = coll
            .indexes
            .iter()
            .find_map(parse_vector_index)
            .ok_or_else(|| VectorStoreError::store("$search requires a vector index on the collection"))?;

        for key in search.keys() {
            match key.as_str() {
                "vector" | "path" | "k" => {}
                "lSearch" if index.kind == IndexKind::DiskAnn => {}
                "efSearch" if index.kind == IndexKind::Hnsw => {}
                other => {
                    return Err(VectorStoreError::store(format!(
                        "'{other}' is not a valid search option for a {} index",
                        index.kind.wire_name()
                    )));
                }
            }
        }

        let query = search
            .get("vector")
            .and_then(vector_from_value)
            .ok_or_else(|| VectorStoreError::store("cosmosSearch.vector must be an array of numbers"))?;
        if query.len() != index.dimensions {
            return Err(VectorStoreError::store(format!(
                "query vector has {} dimensions, index expects {}",
                query.len(),
                index.dimensions
            )));
        }
        let path = search.get("path").and_then(Value::as_str).unwrap_or_default();
        if path != index.path {
            return Err(VectorStoreError::store(format!(
                "cosmosSearch.path '{path}' is not indexed"
            )));
        }
        let k = search
            .get("k")
            .and_then(Value::as_u64)
            .filter(|k| *k > 0)
            .ok_or_else(|| VectorStoreError::store("cosmosSearch.k must be a positive integer"))?;

        let mut rows: Vec<Row> = coll
            .docs
            .iter()
            .filter_map(|doc| {
                let stored = doc.get(&index.path).and_then(vector_from_value)?;
                (stored.len() == query.len()).then(|| Row {
                    score: Some(similarity(index.similarity, &query, &stored)),
                    doc: doc.clone(),
                })
            })
            .collect();

        let ascending = index.similarity == SimilarityMetric::Euclidean;
        // Equal scores come back in `_id` order.
        rows.sort_by(|a, b| {
            let (sa, sb) = (a.score.unwrap_or_default(), b.score.unwrap_or_default());
            let ord = sa.partial_cmp(&sb).unwrap_or(Ordering::Equal);
            let ord = if ascending { ord } else { ord.reverse() };
            ord.then_with(|| id_order(&a.doc, &b.doc))
        });
        rows.truncate(usize::try_from(k).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    async fn list_collection_names(&self) -> Result<Vec<String>, VectorStoreError> {
        self.begin("listCollections", "")?;
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.begin("create", name)?;
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.begin("drop", name)?;
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn run_command(&self, command: Document) -> Result<Document, VectorStoreError> {
        let verb = command.keys().next().cloned().unwrap_or_default();
        let target = command
            .get(&verb)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.begin(&verb, &target)?;

        match verb.as_str() {
            CREATE_INDEXES => self.create_indexes(&command).await,
            LIST_INDEXES => self.list_indexes(&command).await,
            COLL_STATS => self.coll_stats(&command).await,
            "create" => {
                let mut collections = self.collections.write().await;
                if collections.contains_key(&target) {
                    return Err(VectorStoreError::store(format!(
                        "Collection already exists. NS: {target}"
                    )));
                }
                collections.insert(target, Collection::default());
                Ok(document(json!({"ok": 1})))
            }
            "ping" => Ok(document(json!({"ok": 1}))),
            other => Err(VectorStoreError::store(format!("no such command: '{other}'"))),
        }
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<u64, VectorStoreError> {
        self.begin("insert", collection)?;
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();

        // Ordered insert: documents before a duplicate stay written.
        let mut inserted = 0;
        for mut doc in docs {
            let id = doc
                .entry("_id".to_string())
                .or_insert_with(|| Value::String(Uuid::now_v7().to_string()))
                .clone();
            if coll.docs.iter().any(|existing| existing.get("_id") == Some(&id)) {
                return Err(VectorStoreError::store(format!(
                    "E11000 duplicate key error collection: {collection} dup key: {{ _id: {id} }}"
                )));
            }
            coll.docs.push(doc);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, VectorStoreError> {
        self.begin("find", collection)?;
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let limit = limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for doc in &coll.docs {
            if out.len() >= limit {
                break;
            }
            if matches_filter(doc, &filter)? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, VectorStoreError> {
        self.begin("findOne", collection)?;
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(None);
        };
        for doc in &coll.docs {
            if matches_filter(doc, &filter)? {
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, VectorStoreError> {
        self.begin("aggregate", collection)?;
        let collections = self.collections.read().await;
        let empty = Collection::default();
        let coll = collections.get(collection).unwrap_or(&empty);

        let mut rows: Option<Vec<Row>> = None;
        for (position, stage) in pipeline.iter().enumerate() {
            let mut entries = stage.iter();
            let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
                return Err(VectorStoreError::store("a pipeline stage must have exactly one field"));
            };

            let current = match name.as_str() {
                "$search" => {
                    if position != 0 {
                        return Err(VectorStoreError::store("$search is only valid as the first stage"));
                    }
                    Self::search_stage(coll, spec)?
                }
                "$project" => {
                    let spec = spec
                        .as_object()
                        .ok_or_else(|| VectorStoreError::store("$project requires a document"))?;
                    take_rows(rows, coll)
                        .into_iter()
                        .map(|row| project(row, spec))
                        .collect::<Result<_, _>>()?
                }
                "$match" => {
                    let filter = spec
                        .as_object()
                        .ok_or_else(|| VectorStoreError::store("$match requires a document"))?;
                    let mut kept = Vec::new();
                    for row in take_rows(rows, coll) {
                        if matches_filter(&row.doc, filter)? {
                            kept.push(row);
                        }
                    }
                    kept
                }
                "$limit" => {
                    let n = spec
                        .as_u64()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| VectorStoreError::store("$limit must be a positive integer"))?;
                    let mut current = take_rows(rows, coll);
                    current.truncate(usize::try_from(n).unwrap_or(usize::MAX));
                    current
                }
                other => {
                    return Err(VectorStoreError::store(format!(
                        "Unrecognized pipeline stage name: '{other}'"
                    )));
                }
            };
            rows = Some(current);
        }

        Ok(take_rows(rows, coll).into_iter().map(|row| row.doc).collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, VectorStoreError> {
        self.begin("update", collection)?;
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(UpdateResult::default());
        };

        for doc in coll.docs.iter_mut() {
            if !matches_filter(doc, &filter)? {
                continue;
            }
            let before = doc.clone();
            apply_update(doc, &update)?;
            return Ok(UpdateResult {
                matched: 1,
                modified: u64::from(*doc != before),
            });
        }
        Ok(UpdateResult::default())
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, VectorStoreError> {
        self.begin("deleteOne", collection)?;
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        for position in 0..coll.docs.len() {
            if matches_filter(&coll.docs[position], &filter)? {
                coll.docs.remove(position);
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, VectorStoreError> {
        self.begin("deleteMany", collection)?;
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut kept = Vec::with_capacity(coll.docs.len());
        let mut deleted = 0;
        for doc in coll.docs.drain(..) {
            if matches_filter(&doc, &filter)? {
                deleted += 1;
            } else {
                kept.push(doc);
            }
        }
        coll.docs = kept;
        Ok(deleted)
    }
}

fn id_order(a: &Document, b: &Document) -> Ordering {
    document_id(a).cmp(&document_id(b))
}

fn take_rows(rows: Option<Vec<Row>>, coll: &Collection) -> Vec<Row> {
    rows.unwrap_or_else(|| {
        coll.docs
            .iter()
            .map(|doc| Row {
                doc: doc.clone(),
                score: None,
            })
            .collect()
    })
}

fn command_collection<'a>(command: &'a Document, verb: &str) -> Result<&'a str, VectorStoreError> {
    command
        .get(verb)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| VectorStoreError::store(format!("{verb} requires a collection name")))
}

fn vector_path(spec: &Document) -> Option<String> {
    spec.get("key")?
        .as_object()?
        .iter()
        .find(|(_, kind)| kind.as_str() == Some(COSMOS_SEARCH))
        .map(|(path, _)| path.clone())
}

fn parse_vector_index(spec: &Document) -> Option<VectorIndex> {
    let path = vector_path(spec)?;
    let options = spec.get("cosmosSearchOptions")?;
    Some(VectorIndex {
        path,
        kind: IndexKind::from_wire_name(options.get("kind")?.as_str()?)?,
        dimensions: usize::try_from(options.get("dimensions")?.as_u64()?).ok()?,
        similarity: SimilarityMetric::from_wire_name(options.get("similarity")?.as_str()?)?,
    })
}

/// Reject index definitions the managed service would reject.
fn validate_index_spec(spec: &Document) -> Result<(), VectorStoreError> {
    if spec.get("name").and_then(Value::as_str).is_none_or(str::is_empty) {
        return Err(VectorStoreError::store("index spec requires a 'name'"));
    }
    let key = spec
        .get("key")
        .and_then(Value::as_object)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| VectorStoreError::store("index spec requires a 'key' document"))?;

    if !key.values().any(|v| v.as_str() == Some(COSMOS_SEARCH)) {
        return Ok(());
    }

    let options = spec
        .get("cosmosSearchOptions")
        .and_then(Value::as_object)
        .ok_or_else(|| VectorStoreError::store("cosmosSearch index requires 'cosmosSearchOptions'"))?;
    let kind_name = options.get("kind").and_then(Value::as_str).unwrap_or_default();
    let kind = IndexKind::from_wire_name(kind_name)
        .ok_or_else(|| VectorStoreError::store(format!("unsupported vector index kind '{kind_name}'")))?;

    let positive = |name: &str| options.get(name).and_then(Value::as_u64).is_some_and(|v| v > 0);
    if !positive("dimensions") {
        return Err(VectorStoreError::store("'dimensions' must be a positive integer"));
    }
    let similarity = options.get("similarity").and_then(Value::as_str).unwrap_or_default();
    if SimilarityMetric::from_wire_name(similarity).is_none() {
        return Err(VectorStoreError::store(format!("unsupported similarity '{similarity}'")));
    }

    let (required, forbidden): (&[&str], &[&str]) = match kind {
        IndexKind::DiskAnn => (&["maxDegree", "lBuild"], &["m", "efConstruction"]),
        IndexKind::Hnsw => (&["m", "efConstruction"], &["maxDegree", "lBuild"]),
    };
    if let Some(missing) = required.iter().find(|name| !positive(**name)) {
        return Err(VectorStoreError::store(format!(
            "{} index requires a positive '{missing}'",
            kind.wire_name()
        )));
    }
    if let Some(extra) = forbidden.iter().find(|name| options.contains_key(**name)) {
        return Err(VectorStoreError::store(format!(
            "'{extra}' is not a valid option for a {} index",
            kind.wire_name()
        )));
    }
    Ok(())
}

fn similarity(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    match metric {
        SimilarityMetric::InnerProduct => dot,
        SimilarityMetric::Cosine => {
            let norm = |v: &[f32]| v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
            let denom = norm(a) * norm(b);
            if denom == 0.0 { 0.0 } else { dot / denom }
        }
        SimilarityMetric::Euclidean => a
            .iter()
            .zip(b)
            .map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2))
            .sum::<f64>()
            .sqrt(),
    }
}

fn project(row: Row, spec: &Document) -> Result<Row, VectorStoreError> {
    let mut out = Document::new();
    let exclude_id = spec.get("_id").is_some_and(|v| v == &json!(0) || v == &json!(false));
    if !exclude_id {
        if let Some(id) = row.doc.get("_id") {
            out.insert("_id".to_string(), id.clone());
        }
    }

    for (field, expr) in spec {
        if field == "_id" {
            continue;
        }
        let value = match expr {
            Value::Object(obj) if obj.get("$meta").and_then(Value::as_str) == Some("searchScore") => {
                row.score.map(Value::from).unwrap_or(Value::Null)
            }
            Value::String(s) if s == "$$ROOT" => Value::Object(row.doc.clone()),
            Value::String(s) if s.starts_with('$') => {
                lookup(&row.doc, &s[1..]).cloned().unwrap_or(Value::Null)
            }
            Value::Bool(true) | Value::Number(_) if expr != &json!(0) => {
                match lookup(&row.doc, field) {
                    Some(v) => v.clone(),
                    None => continue,
                }
            }
            other => {
                return Err(VectorStoreError::store(format!(
                    "unsupported $project expression for '{field}': {other}"
                )));
            }
        };
        out.insert(field.clone(), value);
    }

    Ok(Row {
        doc: out,
        score: row.score,
    })
}

/// Resolve a dotted path through nested documents.
fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn matches_filter(doc: &Document, filter: &Document) -> Result<bool, VectorStoreError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => sub_filters(key, cond)?
                .iter()
                .try_fold(true, |acc, f| Ok::<_, VectorStoreError>(acc && matches_filter(doc, f)?))?,
            "$or" => sub_filters(key, cond)?
                .iter()
                .try_fold(false, |acc, f| Ok::<_, VectorStoreError>(acc || matches_filter(doc, f)?))?,
            op if op.starts_with('$') => {
                return Err(VectorStoreError::store(format!("unknown top level operator: {op}")));
            }
            path => matches_condition(lookup(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(op: &str, cond: &'a Value) -> Result<Vec<&'a Document>, VectorStoreError> {
    cond.as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| VectorStoreError::store(format!("{op} argument must be a non-empty array")))?
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| VectorStoreError::store(format!("{op} entries must be documents")))
        })
        .collect()
}

fn matches_condition(actual: Option<&Value>, cond: &Value) -> Result<bool, VectorStoreError> {
    let operators = match cond {
        Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) => obj,
        _ => return Ok(value_matches_eq(actual, cond)),
    };

    for (op, operand) in operators {
        let ok = match op.as_str() {
            "$eq" => value_matches_eq(actual, operand),
            "$ne" => !value_matches_eq(actual, operand),
            "$in" => operand
                .as_array()
                .ok_or_else(|| VectorStoreError::store("$in needs an array"))?
                .iter()
                .any(|o| value_matches_eq(actual, o)),
            "$nin" => !operand
                .as_array()
                .ok_or_else(|| VectorStoreError::store("$nin needs an array"))?
                .iter()
                .any(|o| value_matches_eq(actual, o)),
            "$exists" => {
                let present = actual.is_some();
                present == operand.as_bool().unwrap_or(true)
            }
            "$lt" => compare(actual, operand).is_some_and(Ordering::is_lt),
            "$lte" => compare(actual, operand).is_some_and(Ordering::is_le),
            "$gt" => compare(actual, operand).is_some_and(Ordering::is_gt),
            "$gte" => compare(actual, operand).is_some_and(Ordering::is_ge),
            other => {
                return Err(VectorStoreError::store(format!("unknown operator: {other}")));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Ordering between values of the same type; `None` across types.
fn compare(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (actual?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn apply_update(doc: &mut Document, update: &Document) -> Result<(), VectorStoreError> {
    if update.is_empty() {
        return Err(VectorStoreError::store("update document must not be empty"));
    }
    for (op, fields) in update {
        let fields = fields
            .as_object()
            .ok_or_else(|| VectorStoreError::store(format!("{op} requires a document")))?;
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if path == "_id" {
                        return Err(VectorStoreError::store("Performing an update on the path '_id' would modify the immutable field '_id'"));
                    }
                    set_path(doc, path, value.clone())?;
                }
            }
            "$unset" => {
                for path in fields.keys() {
                    unset_path(doc, path);
                }
            }
            other => {
                return Err(VectorStoreError::store(format!("Unknown modifier: {other}")));
            }
        }
    }
    Ok(())
}

fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<(), VectorStoreError> {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = parts.pop().unwrap_or_default();
    let mut current = doc;
    for part in parts {
        let next = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        current = next.as_object_mut().ok_or_else(|| {
            VectorStoreError::store(format!("Cannot create field '{last}' in non-document '{part}'"))
        })?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

fn unset_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = doc.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}
