//! Question-answering engine.
//!
//! `RagEngine` ties the pieces together behind two lifecycle calls:
//! `load_and_build` (re)indexes the corpus snapshot, `answer` runs one
//! question through the fixed path route → retrieve → generate. Per-question
//! failures never escape `answer`: retrieval and generation problems degrade
//! to fixed Vietnamese fallback texts, and the `reason` field records which
//! path produced the reply.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::config::AppConfig;
use crate::corpus::{self, CorpusError, RecordKind};
use crate::intent::{Intent, IntentRouter};
use crate::llm::prompt;
use crate::llm::provider::GenerationBackend;
use crate::llm::types::{GenerationOptions, GenerationRequest};
use crate::rag::embedder::TextEmbedder;
use crate::rag::index::Metric;
use crate::rag::retriever::{BuildReport, RetrievalError, RetrievedChunk, Retriever};

/// Reply when the retrieval side is down but the service keeps answering.
pub const SEARCH_UNAVAILABLE: &str = "Hệ thống tra cứu văn bản đang tạm thời gián đoạn. Bạn vui lòng thử lại sau ít \
     phút, hoặc đặt lịch tư vấn trực tiếp với luật sư của LuatViet.";

/// Reply when the generation backend cannot produce an answer.
pub const ASSISTANT_UNAVAILABLE: &str = "Trợ lý đang tạm thời quá tải. Bạn vui lòng thử lại sau ít phút, hoặc để lại câu \
     hỏi để đội ngũ LuatViet hỗ trợ sớm nhất.";

/// Startup/reload failures. Per-question failures never surface here; they
/// degrade inside [`RagEngine::answer`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

/// Source descriptor attached to a grounded answer. Serializes with the
/// field names the frontend consumes.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    #[serde(rename = "id")]
    pub chunk_id: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub title: String,
    #[serde(rename = "originalId")]
    pub record_id: String,
}

impl From<&RetrievedChunk> for Provenance {
    fn from(retrieved: &RetrievedChunk) -> Self {
        Self {
            chunk_id: retrieved.chunk.id.clone(),
            kind: retrieved.chunk.kind,
            title: retrieved.chunk.title.clone(),
            record_id: retrieved.chunk.record_id.clone(),
        }
    }
}

/// Which path produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerReason {
    /// Generated against retrieved corpus excerpts.
    Grounded,
    /// Generated without grounding (no excerpts applied).
    Conversational,
    /// Answered from the canned reply table.
    ShortCircuit(Intent),
    /// Retrieval failed; the text is the search fallback.
    RetrievalFailed,
    /// Generation failed; the text is the assistant fallback.
    GenerationFailed,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub provenance: Vec<Provenance>,
    pub reason: AnswerReason,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub backend_connected: bool,
    pub model_name: String,
    pub indexed_chunks: usize,
    pub generation: u64,
}

pub struct RagEngine {
    config: AppConfig,
    router: IntentRouter,
    retriever: Retriever,
    backend: Arc<dyn GenerationBackend>,
}

impl RagEngine {
    pub fn new(
        config: AppConfig,
        embedder: Arc<dyn TextEmbedder>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        let router = IntentRouter::new(config.retrieval.min_retrieval_chars);
        let retriever = Retriever::new(embedder, config.chunking.clone(), Metric::Cosine);
        Self {
            config,
            router,
            retriever,
            backend,
        }
    }

    /// Loads the corpus snapshot and rebuilds the index. Runs at startup and
    /// whenever the reload endpoint fires; queries in flight keep the index
    /// they started with.
    pub async fn load_and_build(&self) -> Result<BuildReport, EngineError> {
        let records = corpus::load_records(&self.config.corpus.snapshot_path)?;
        let report = self.retriever.build_index(&records).await?;
        Ok(report)
    }

    /// Answers one question. This never fails: every failure path inside
    /// degrades to a fixed fallback text with the corresponding reason.
    pub async fn answer(
        &self,
        question: &str,
        options: GenerationOptions,
        requested_top_k: Option<usize>,
    ) -> Answer {
        let question = question.trim();

        let intent = self.router.classify(question);
        if let Some(reply) = self.router.canned_reply(intent) {
            tracing::debug!("Short-circuited question with intent {:?}", intent);
            return Answer {
                text: reply.to_string(),
                provenance: Vec::new(),
                reason: AnswerReason::ShortCircuit(intent),
            };
        }

        let top_k = requested_top_k
            .unwrap_or(self.config.retrieval.top_k)
            .clamp(1, self.config.retrieval.max_top_k);

        let mut retrieved: Vec<RetrievedChunk> = Vec::new();
        if self.router.is_legal_question(question) {
            match self.retriever.retrieve(question, top_k).await {
                Ok(hits) => retrieved = hits,
                Err(err) => {
                    tracing::warn!("Retrieval failed: {}", err);
                    return Answer {
                        text: SEARCH_UNAVAILABLE.to_string(),
                        provenance: Vec::new(),
                        reason: AnswerReason::RetrievalFailed,
                    };
                }
            }
        }

        let grounded = !retrieved.is_empty();
        let system = if grounded {
            prompt::grounded_system(&retrieved)
        } else {
            prompt::conversational_system().to_string()
        };

        let request = GenerationRequest {
            system,
            user: question.to_string(),
            options,
        };
        match self.backend.generate(request).await {
            Ok(text) => Answer {
                provenance: retrieved.iter().map(Provenance::from).collect(),
                text,
                reason: if grounded {
                    AnswerReason::Grounded
                } else {
                    AnswerReason::Conversational
                },
            },
            Err(err) => {
                tracing::warn!("Generation failed: {}", err);
                Answer {
                    text: ASSISTANT_UNAVAILABLE.to_string(),
                    provenance: Vec::new(),
                    reason: AnswerReason::GenerationFailed,
                }
            }
        }
    }

    pub async fn backend_connected(&self) -> bool {
        self.backend.check_health().await
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            backend_connected: self.backend.check_health().await,
            model_name: self.backend.model_name().to_string(),
            indexed_chunks: self.retriever.indexed_chunks().await,
            generation: self.retriever.generation().await,
        }
    }
}
