//! Application configuration.
//!
//! Settings load from a YAML file (`config.yml` next to the binary, or the
//! path in `LUATVIET_CONFIG`). A missing file is not an error: every section
//! has defaults good enough for local development. Validation runs once at
//! startup so a bad value fails the process instead of a request.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::types::GenerationConfig;
use crate::rag::chunker::ChunkingConfig;
use crate::rag::embedder::EmbeddingConfig;

pub const CONFIG_PATH_ENV: &str = "LUATVIET_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Overridable at runtime via the `PORT` environment variable.
    pub port: u16,
    pub log_dir: PathBuf,
    /// CORS allowlist; empty falls back to the local development origins.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            log_dir: PathBuf::from("logs"),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// JSON snapshot of the legal knowledge base.
    pub snapshot_path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/knowledge.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Neighbors returned per query when the caller does not ask for a count.
    pub top_k: usize,
    /// Hard ceiling on caller-requested neighbor counts.
    pub max_top_k: usize,
    /// Questions at or above this many characters are treated as worth a
    /// corpus lookup even when no legal keyword matches.
    pub min_retrieval_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_top_k: 20,
            min_retrieval_chars: 60,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `LUATVIET_CONFIG` or `config.yml`, falling
    /// back to defaults when neither exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let config = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_yaml::from_str::<AppConfig>(&raw)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            AppConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.chunking.window_size > 0, "chunking.window_size must be positive")?;
        ensure(
            self.chunking.overlap < self.chunking.window_size,
            "chunking.overlap must be smaller than chunking.window_size",
        )?;
        ensure(self.embedding.dimension > 0, "embedding.dimension must be positive")?;
        ensure(
            self.embedding.max_input_chars > 0,
            "embedding.max_input_chars must be positive",
        )?;
        ensure(self.retrieval.top_k > 0, "retrieval.top_k must be positive")?;
        ensure(
            self.retrieval.max_top_k >= self.retrieval.top_k,
            "retrieval.max_top_k must be at least retrieval.top_k",
        )?;
        ensure(
            self.generation.timeout_secs > 0,
            "generation.timeout_secs must be positive",
        )?;
        ensure(
            !self.generation.base_url.trim().is_empty(),
            "generation.base_url must not be empty",
        )?;
        ensure(!self.generation.model.trim().is_empty(), "generation.model must not be empty")?;
        Ok(())
    }
}

fn ensure(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_overlap_not_smaller_than_window() {
        let mut config = AppConfig::default();
        config.chunking.window_size = 100;
        config.chunking.overlap = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn rejects_max_top_k_below_top_k() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 10;
        config.retrieval.max_top_k = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let raw = "server:\n  port: 9090\nretrieval:\n  top_k: 3\n";
        let config: AppConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.max_top_k, RetrievalConfig::default().max_top_k);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
