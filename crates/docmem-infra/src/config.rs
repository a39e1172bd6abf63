//! Configuration loader for docmem.
//!
//! Reads `docmem.toml` from the config directory (`~/.docmem/` by default)
//! and deserializes it into [`DocmemConfig`]. Falls back to defaults when the
//! file is missing or malformed. `DOCMEM_*` environment variables override
//! individual fields afterwards.

use std::path::{Path, PathBuf};

use docmem_types::config::DocmemConfig;
use docmem_types::error::ConfigError;

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE: &str = "docmem.toml";

/// `~/.docmem`, or `./.docmem` when there is no home directory.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docmem")
}

/// Load configuration from `{config_dir}/docmem.toml`.
///
/// - If the file does not exist, returns [`DocmemConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
pub async fn load_config(config_dir: &Path) -> DocmemConfig {
    let config_path = config_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", config_path.display());
            return DocmemConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return DocmemConfig::default();
        }
    };

    match toml::from_str::<DocmemConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            DocmemConfig::default()
        }
    }
}

/// Load the file configuration, then apply the process environment.
pub async fn load_config_from_env(config_dir: &Path) -> Result<DocmemConfig, ConfigError> {
    apply_env_overrides(load_config(config_dir).await, |key| std::env::var(key).ok())
}

/// Override fields from `DOCMEM_*` variables resolved through `lookup`.
///
/// Numeric variables that fail to parse are an error rather than ignored.
pub fn apply_env_overrides(
    mut config: DocmemConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<DocmemConfig, ConfigError> {
    if let Some(v) = lookup("DOCMEM_STORE_URI") {
        config.store_uri = v;
    }
    if let Some(v) = lookup("DOCMEM_DATABASE") {
        config.database = v;
    }
    if let Some(v) = lookup("DOCMEM_COLLECTION") {
        config.collection = v;
    }
    if let Some(v) = lookup("DOCMEM_INDEX_KIND") {
        config.index_kind = v;
    }
    if let Some(v) = lookup("DOCMEM_EMBEDDING_DIMS") {
        config.embedding_dims = parse_var("DOCMEM_EMBEDDING_DIMS", &v)?;
    }
    if let Some(v) = lookup("DOCMEM_DEFAULT_TTL_SECONDS") {
        config.default_ttl_seconds = parse_var("DOCMEM_DEFAULT_TTL_SECONDS", &v)?;
    }
    if let Some(v) = lookup("DOCMEM_MAX_BATCH_SIZE") {
        config.max_batch_size = parse_var("DOCMEM_MAX_BATCH_SIZE", &v)?;
    }
    Ok(config)
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{value}': {e}"),
    })
}
