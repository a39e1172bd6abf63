//! Memory types for docmem.
//!
//! A memory record is one document in the store: an id, an embedding vector,
//! and a flat payload carrying content, category, scope identifiers,
//! expiration, and free-form metadata. The engine-facing request and item
//! types used by the memory service live here too.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::fmt;
use std::str::FromStr;

use crate::error::VectorStoreError;
use crate::filter::Filters;

/// Payload keys owned by typed fields. Metadata may not shadow them.
pub const RESERVED_PAYLOAD_KEYS: &[&str] = &[
    "data",
    "category",
    "user_id",
    "agent_id",
    "run_id",
    "expires_at",
];

/// Payload key holding the expiration timestamp (Unix seconds).
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Category of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Semantic,
    Episodic,
    Fact,
    Preference,
}

impl MemoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Semantic => "semantic",
            MemoryCategory::Episodic => "episodic",
            MemoryCategory::Fact => "fact",
            MemoryCategory::Preference => "preference",
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "semantic" => Ok(MemoryCategory::Semantic),
            "episodic" => Ok(MemoryCategory::Episodic),
            "fact" => Ok(MemoryCategory::Fact),
            "preference" => Ok(MemoryCategory::Preference),
            other => Err(format!("invalid memory category: '{other}'")),
        }
    }
}

/// Ownership dimensions of a memory. At least one must be present.
///
/// The session dimension is stored under the engine's `run_id` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(
        default,
        rename = "run_id",
        alias = "session_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
}

impl Scope {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// True when no dimension carries a non-empty identifier.
    pub fn is_empty(&self) -> bool {
        [&self.user_id, &self.agent_id, &self.session_id]
            .iter()
            .all(|v| v.as_deref().is_none_or(str::is_empty))
    }

    pub fn validate(&self) -> Result<(), VectorStoreError> {
        if self.is_empty() {
            return Err(VectorStoreError::validation(
                "at least one of user_id, agent_id, or session_id must be provided",
            ));
        }
        Ok(())
    }

    /// Equality filters selecting records owned by this scope.
    pub fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        let dims = [
            ("user_id", &self.user_id),
            ("agent_id", &self.agent_id),
            ("run_id", &self.session_id),
        ];
        for (key, value) in dims {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                filters.insert(key.to_string(), Value::String(v.to_string()));
            }
        }
        filters
    }
}

/// The stored payload of a memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    /// Textual content of the memory.
    #[serde(rename = "data")]
    pub content: String,
    pub category: MemoryCategory,
    #[serde(flatten)]
    pub scope: Scope,
    /// Unix seconds after which the record is eligible for removal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Free-form metadata, flattened alongside the typed keys.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl MemoryPayload {
    pub fn new(content: impl Into<String>, category: MemoryCategory, scope: Scope) -> Self {
        Self {
            content: content.into(),
            category,
            scope,
            expires_at: None,
            metadata: Map::new(),
        }
    }

    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Merge metadata keys into the payload. Reserved keys are skipped.
    pub fn merge_metadata(&mut self, metadata: Map<String, Value>) {
        for (key, value) in metadata {
            if RESERVED_PAYLOAD_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.metadata.insert(key, value);
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.merge_metadata(metadata);
        self
    }

    /// Expired once `expires_at <= now`, the same rule the TTL sweep applies.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    pub fn to_document(&self) -> Result<Map<String, Value>, VectorStoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(VectorStoreError::validation(format!(
                "payload serialized to non-object: {other}"
            ))),
            Err(e) => Err(VectorStoreError::validation(format!(
                "failed to serialize payload: {e}"
            ))),
        }
    }

    pub fn from_document(doc: Map<String, Value>) -> Result<Self, VectorStoreError> {
        serde_json::from_value(Value::Object(doc))
            .map_err(|e| VectorStoreError::store(format!("malformed stored payload: {e}")))
    }
}

/// A record as written by the adapter's insert.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: MemoryPayload,
}

impl MemoryRecord {
    /// Check the record invariants against the collection's dimensionality.
    pub fn validate(&self, dims: usize) -> Result<(), VectorStoreError> {
        if self.id.is_empty() {
            return Err(VectorStoreError::validation("record id must not be empty"));
        }
        if self.vector.len() != dims {
            return Err(VectorStoreError::validation(format!(
                "record '{}' has {} dimensions, collection expects {dims}",
                self.id,
                self.vector.len()
            )));
        }
        self.payload.scope.validate().map_err(|e| {
            VectorStoreError::validation(format!("record '{}': {e}", self.id))
        })
    }
}

/// A record read back from the store. `score` is set for search hits only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMemory {
    pub id: String,
    pub score: Option<f32>,
    pub payload: MemoryPayload,
}

/// Partial update of a stored record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub content: Option<String>,
    /// Keys merged into the existing payload metadata.
    pub metadata: Option<Map<String, Value>>,
    /// Replacement embedding for re-embedded content.
    pub vector: Option<Vec<f32>>,
}

impl RecordUpdate {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.metadata.is_none() && self.vector.is_none()
    }
}

/// Basic collection statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: u64,
    pub size: u64,
}

// ---------------------------------------------------------------------------
// Engine-facing types
// ---------------------------------------------------------------------------

/// A single conversational message handed to the memory engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Input to `add`: either raw text or a list of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryInput {
    Text(String),
    Messages(Vec<ChatMessage>),
}

impl MemoryInput {
    /// Flatten the input to the text that gets embedded.
    pub fn to_text(&self) -> String {
        match self {
            MemoryInput::Text(text) => text.clone(),
            MemoryInput::Messages(messages) => messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.to_text().trim().is_empty()
    }
}

impl From<&str> for MemoryInput {
    fn from(text: &str) -> Self {
        MemoryInput::Text(text.to_string())
    }
}

impl From<String> for MemoryInput {
    fn from(text: String) -> Self {
        MemoryInput::Text(text)
    }
}

/// Request to store a memory through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMemoryRequest {
    #[serde(flatten)]
    pub scope: Scope,
    pub messages: MemoryInput,
    pub category: MemoryCategory,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    /// `None` uses the configured default, `Some(0)` disables expiration.
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

impl AddMemoryRequest {
    pub fn new(messages: impl Into<MemoryInput>, category: MemoryCategory, scope: Scope) -> Self {
        Self {
            scope,
            messages: messages.into(),
            category,
            metadata: None,
            ttl_seconds: None,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn validate(&self) -> Result<(), VectorStoreError> {
        self.scope.validate()?;
        if self.messages.is_blank() {
            return Err(VectorStoreError::validation("messages must not be empty"));
        }
        if self.ttl_seconds.is_some_and(|t| t < 0) {
            return Err(VectorStoreError::validation("ttl_seconds must not be negative"));
        }
        Ok(())
    }
}

fn default_search_limit() -> usize {
    100
}

/// Request to search memories through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMemoryRequest {
    #[serde(flatten)]
    pub scope: Scope,
    pub query: String,
    #[serde(default)]
    pub categories: Option<Vec<MemoryCategory>>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl SearchMemoryRequest {
    pub fn new(query: impl Into<String>, scope: Scope) -> Self {
        Self {
            scope,
            query: query.into(),
            categories: None,
            limit: default_search_limit(),
        }
    }

    pub fn validate(&self) -> Result<(), VectorStoreError> {
        self.scope.validate()?;
        if self.limit == 0 {
            return Err(VectorStoreError::validation("limit must be at least 1"));
        }
        Ok(())
    }
}

/// What the engine did with an add request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryEvent {
    Add,
    Update,
    Delete,
    /// Nothing new was stored (duplicate detected upstream).
    Noop,
}

/// Result of an add request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub id: Option<String>,
    pub memory: String,
    pub event: MemoryEvent,
}

impl AddOutcome {
    pub fn noop() -> Self {
        Self {
            id: None,
            memory: String::new(),
            event: MemoryEvent::Noop,
        }
    }
}

/// A memory as the engine reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub memory: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl MemoryItem {
    pub fn expires_at(&self) -> Option<i64> {
        self.metadata.get(EXPIRES_AT_KEY).and_then(Value::as_i64)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at().is_some_and(|t| t <= now)
    }
}

impl From<StoredMemory> for MemoryItem {
    fn from(stored: StoredMemory) -> Self {
        let payload = stored.payload;
        let mut metadata = payload.metadata;
        metadata.insert(
            "category".to_string(),
            Value::String(payload.category.to_string()),
        );
        if let Some(expires_at) = payload.expires_at {
            metadata.insert(EXPIRES_AT_KEY.to_string(), Value::from(expires_at));
        }
        Self {
            id: stored.id,
            memory: payload.content,
            metadata,
            score: stored.score,
        }
    }
}

/// One entry of a memory's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub memory_id: String,
    pub event: MemoryEvent,
    #[serde(default)]
    pub old_memory: Option<String>,
    #[serde(default)]
    pub new_memory: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
