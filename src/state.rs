use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::AppConfig;
use crate::engine::RagEngine;
use crate::llm::ollama::OllamaClient;
use crate::rag::embedder::build_embedder;

pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<RagEngine>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wires the engine from configuration and runs the initial index build.
    pub async fn initialize(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let embedder = build_embedder(&config.embedding);
        let backend = Arc::new(OllamaClient::new(config.generation.clone()));
        let engine = Arc::new(RagEngine::new(config.clone(), embedder, backend));

        let report = engine.load_and_build().await?;
        tracing::info!(
            "Corpus ready: {} chunks from {} records (generation {}, {} skipped)",
            report.chunks_indexed,
            report.records,
            report.generation,
            report.chunks_skipped
        );

        let started_at = Utc::now();
        Ok(Arc::new(AppState {
            config,
            engine,
            started_at,
        }))
    }
}
