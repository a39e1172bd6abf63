//! Application state wiring the adapter to the configured document store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use docmem_infra::config::{default_config_dir, load_config_from_env};
use docmem_infra::document::mongo::MongoDocumentStore;
use docmem_infra::vector::adapter::DocumentVectorStore;
use docmem_types::config::DocmemConfig;

/// The adapter pinned to the MongoDB-wire backend.
pub type ConcreteVectorStore = DocumentVectorStore<MongoDocumentStore>;

pub struct AppState {
    pub config: DocmemConfig,
    pub config_dir: PathBuf,
    pub vector_store: ConcreteVectorStore,
}

impl AppState {
    /// Load the configuration only. Nothing is contacted.
    pub async fn load_config(config_dir: Option<PathBuf>) -> anyhow::Result<(DocmemConfig, PathBuf)> {
        let config_dir = config_dir.unwrap_or_else(default_config_dir);
        let config = load_config_from_env(&config_dir)
            .await
            .context("Invalid docmem environment override")?;
        Ok((config, config_dir))
    }

    /// Load the configuration and connect to the document store.
    pub async fn init(config_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let (config, config_dir) = Self::load_config(config_dir).await?;
        let settings = config
            .adapter_settings()
            .context("Invalid docmem configuration")?;

        let store = MongoDocumentStore::connect(&config.store_uri, &config.database)
            .await
            .with_context(|| format!("Failed to connect to the document store (database '{}')", config.database))?;
        tracing::debug!(
            collection = %settings.collection,
            kind = %settings.index_kind,
            dims = settings.dimensions,
            "adapter configured"
        );

        Ok(Self {
            vector_store: DocumentVectorStore::new(Arc::new(store), settings),
            config,
            config_dir,
        })
    }
}
