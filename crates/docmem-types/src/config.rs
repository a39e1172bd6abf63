//! Configuration types for docmem.
//!
//! `DocmemConfig` is the on-disk `docmem.toml` (plus environment overrides).
//! It is kept loosely typed so that operator mistakes surface as validation
//! errors when the adapter is constructed, via [`DocmemConfig::adapter_settings`].

use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_MAX_BATCH_SIZE;
use crate::error::VectorStoreError;
use crate::index::IndexKind;

/// Top-level configuration. All fields have defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocmemConfig {
    /// Connection string of the document store.
    #[serde(default = "default_store_uri")]
    pub store_uri: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Dimensionality of the embedding vectors.
    #[serde(default = "default_embedding_dims")]
    pub embedding_dims: u32,

    /// `diskann` or `hnsw`.
    #[serde(default = "default_index_kind")]
    pub index_kind: String,

    /// TTL applied when a request carries none. 0 disables expiration.
    #[serde(default)]
    pub default_ttl_seconds: i64,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_store_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "docmem".to_string()
}

fn default_collection() -> String {
    "memories".to_string()
}

fn default_embedding_dims() -> u32 {
    1536
}

fn default_index_kind() -> String {
    IndexKind::default().to_string()
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl Default for DocmemConfig {
    fn default() -> Self {
        Self {
            store_uri: default_store_uri(),
            database: default_database(),
            collection: default_collection(),
            embedding_dims: default_embedding_dims(),
            index_kind: default_index_kind(),
            default_ttl_seconds: 0,
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl DocmemConfig {
    /// Validate the configuration into the settings the adapter runs with.
    pub fn adapter_settings(&self) -> Result<AdapterSettings, VectorStoreError> {
        let index_kind: IndexKind = self.index_kind.parse()?;
        if self.collection.trim().is_empty() {
            return Err(VectorStoreError::validation("collection name must not be empty"));
        }
        if self.embedding_dims == 0 {
            return Err(VectorStoreError::validation("embedding_dims must be positive"));
        }
        if self.max_batch_size == 0 {
            return Err(VectorStoreError::validation("max_batch_size must be positive"));
        }
        if self.default_ttl_seconds < 0 {
            return Err(VectorStoreError::validation(
                "default_ttl_seconds must not be negative",
            ));
        }
        Ok(AdapterSettings {
            collection: self.collection.clone(),
            dimensions: self.embedding_dims,
            index_kind,
            default_ttl_seconds: self.default_ttl_seconds,
            max_batch_size: self.max_batch_size,
        })
    }
}

/// Validated settings of a vector-store adapter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    pub collection: String,
    pub dimensions: u32,
    pub index_kind: IndexKind,
    /// TTL stamped on memories whose request carries none. 0 disables expiration.
    pub default_ttl_seconds: i64,
    pub max_batch_size: usize,
}

impl AdapterSettings {
    /// Settings with no default TTL and the default batch limit.
    pub fn new(collection: impl Into<String>, dimensions: u32, index_kind: IndexKind) -> Self {
        Self {
            collection: collection.into(),
            dimensions,
            index_kind,
            default_ttl_seconds: 0,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}
