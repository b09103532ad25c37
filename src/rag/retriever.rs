//! Retrieval orchestration.
//!
//! The retriever owns the published corpus index. `build_index` chunks,
//! embeds, and indexes a complete replacement off to the side, then publishes
//! it with one pointer swap at the end. Queries running during a rebuild keep
//! the snapshot they started with, so every result set comes from exactly one
//! corpus generation, never a half-built mix.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::corpus::CorpusRecord;
use crate::rag::chunker::{chunk_record, Chunk, ChunkingConfig};
use crate::rag::embedder::{EmbeddingError, TextEmbedder};
use crate::rag::index::{Metric, VectorIndex};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to embed query: {0}")]
    QueryEmbedding(#[from] EmbeddingError),
    #[error("index build produced no usable chunks ({failed} embedding failures)")]
    NothingIndexed { failed: usize },
}

/// One fully built corpus generation. Position `i` in the index maps to
/// `chunks[i]`.
pub struct CorpusIndex {
    generation: u64,
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

impl CorpusIndex {
    fn empty(dim: usize, metric: Metric) -> Self {
        Self {
            generation: 0,
            chunks: Vec::new(),
            index: VectorIndex::new(dim, metric, 0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A chunk returned for a query, tagged with the generation of the index it
/// came from.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub generation: u64,
}

/// Outcome of one index build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub generation: u64,
    pub records: usize,
    pub chunks_indexed: usize,
    pub chunks_skipped: usize,
}

pub struct Retriever {
    embedder: Arc<dyn TextEmbedder>,
    chunking: ChunkingConfig,
    metric: Metric,
    builds: AtomicU64,
    published: RwLock<Arc<CorpusIndex>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn TextEmbedder>, chunking: ChunkingConfig, metric: Metric) -> Self {
        let empty = CorpusIndex::empty(embedder.dimension(), metric);
        Self {
            embedder,
            chunking,
            metric,
            builds: AtomicU64::new(0),
            published: RwLock::new(Arc::new(empty)),
        }
    }

    /// Builds a fresh index over `records` and publishes it. Chunks whose
    /// embedding fails are skipped with a warning; a non-empty corpus where
    /// every chunk fails is an error and leaves the previous index in place.
    pub async fn build_index(&self, records: &[CorpusRecord]) -> Result<BuildReport, RetrievalError> {
        let generation = self.builds.fetch_add(1, Ordering::Relaxed) + 1;

        let mut pending: Vec<Chunk> = Vec::new();
        for record in records {
            pending.extend(chunk_record(record, &self.chunking));
        }

        let mut index = VectorIndex::new(self.embedder.dimension(), self.metric, pending.len());
        let mut chunks: Vec<Chunk> = Vec::with_capacity(pending.len());
        let mut skipped = 0usize;

        for chunk in pending {
            match self.embedder.embed(&chunk.text).await {
                Ok(vector) => match index.add_point(vector, &chunk.id) {
                    Ok(_) => chunks.push(chunk),
                    Err(err) => {
                        skipped += 1;
                        tracing::warn!("Skipping chunk {}: {}", chunk.id, err);
                    }
                },
                Err(err) => {
                    skipped += 1;
                    tracing::warn!("Skipping chunk {} after embedding failure: {}", chunk.id, err);
                }
            }
        }

        if chunks.is_empty() && skipped > 0 {
            return Err(RetrievalError::NothingIndexed { failed: skipped });
        }

        let report = BuildReport {
            generation,
            records: records.len(),
            chunks_indexed: chunks.len(),
            chunks_skipped: skipped,
        };

        let built = Arc::new(CorpusIndex {
            generation,
            chunks,
            index,
        });
        *self.published.write().await = built;

        tracing::info!(
            "Published corpus index generation {}: {} chunks from {} records ({} skipped)",
            report.generation,
            report.chunks_indexed,
            report.records,
            report.chunks_skipped
        );
        Ok(report)
    }

    /// Returns the `top_k` chunks nearest to `question`, best first. An empty
    /// index yields an empty result without touching the embedder.
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let current = Arc::clone(&*self.published.read().await);
        if current.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(question).await?;
        let hits = current.index.search_knn(&query, top_k);
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                chunk: current.chunks[hit.position].clone(),
                score: hit.score,
                generation: current.generation,
            })
            .collect())
    }

    pub async fn indexed_chunks(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn generation(&self) -> u64 {
        self.published.read().await.generation()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;

    use super::*;
    use crate::corpus::RecordKind;
    use crate::rag::embedder::HashingEmbedder;

    fn record(id: &str, kind: RecordKind, title: &str, body: &str) -> CorpusRecord {
        CorpusRecord {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    fn retriever() -> Retriever {
        Retriever::new(
            Arc::new(HashingEmbedder::new(128)),
            ChunkingConfig::default(),
            Metric::Cosine,
        )
    }

    /// Embedder that can be told to start failing, wholesale or only for
    /// texts containing a marker, for exercising skip and error paths.
    struct FailSwitchEmbedder {
        inner: HashingEmbedder,
        failing: AtomicBool,
        fail_containing: Option<&'static str>,
    }

    impl FailSwitchEmbedder {
        fn new(failing: bool) -> Self {
            Self {
                inner: HashingEmbedder::new(128),
                failing: AtomicBool::new(failing),
                fail_containing: None,
            }
        }

        fn failing_on(marker: &'static str) -> Self {
            Self {
                inner: HashingEmbedder::new(128),
                failing: AtomicBool::new(false),
                fail_containing: Some(marker),
            }
        }
    }

    #[async_trait]
    impl TextEmbedder for FailSwitchEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let marked = self
                .fail_containing
                .map(|marker| text.contains(marker))
                .unwrap_or(false);
            if self.failing.load(Ordering::Relaxed) || marked {
                return Err(EmbeddingError::Inference("forced failure".to_string()));
            }
            self.inner.embed(text).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            "fail-switch"
        }
    }

    #[tokio::test]
    async fn retrieval_finds_the_overlapping_record() {
        let retriever = retriever();
        let records = vec![
            record(
                "act-1",
                RecordKind::Act,
                "Luật Hôn nhân và Gia đình",
                "Điều kiện đăng ký kết hôn: nam từ đủ 20 tuổi, nữ từ đủ 18 tuổi.",
            ),
            record(
                "act-2",
                RecordKind::Act,
                "Luật Giao thông đường bộ",
                "Người điều khiển xe máy phải đội mũ bảo hiểm khi tham gia giao thông.",
            ),
        ];
        retriever.build_index(&records).await.unwrap();

        let hits = retriever
            .retrieve("điều kiện đăng ký kết hôn là gì", 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.record_id, "act-1");
    }

    #[tokio::test]
    async fn empty_corpus_yields_empty_results() {
        let retriever = retriever();
        let report = retriever.build_index(&[]).await.unwrap();
        assert_eq!(report.chunks_indexed, 0);

        let hits = retriever.retrieve("bất kỳ câu hỏi nào", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn retrieval_before_any_build_is_empty() {
        let retriever = retriever();
        let hits = retriever.retrieve("câu hỏi", 5).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(retriever.generation().await, 0);
    }

    #[tokio::test]
    async fn rebuild_replaces_the_previous_corpus() {
        let retriever = retriever();
        let old = vec![record(
            "act-old",
            RecordKind::Act,
            "Quy định cũ",
            "thuế thu nhập cá nhân mức cũ",
        )];
        retriever.build_index(&old).await.unwrap();
        let first = retriever.retrieve("thuế thu nhập", 3).await.unwrap();
        assert_eq!(first[0].generation, 1);

        let new = vec![record(
            "act-new",
            RecordKind::Act,
            "Quy định mới",
            "thuế thu nhập cá nhân mức mới",
        )];
        let report = retriever.build_index(&new).await.unwrap();
        assert_eq!(report.generation, 2);

        let second = retriever.retrieve("thuế thu nhập", 3).await.unwrap();
        assert!(second.iter().all(|h| h.generation == 2));
        assert!(second.iter().all(|h| h.chunk.record_id == "act-new"));
    }

    #[tokio::test]
    async fn rebuilding_an_unchanged_corpus_is_idempotent() {
        let retriever = retriever();
        let records = vec![
            record(
                "act-1",
                RecordKind::Act,
                "Luật Lao động",
                &"hợp đồng lao động và tiền lương ".repeat(60),
            ),
            record("faq-1", RecordKind::Faq, "Hỏi?", "Hỏi?\nĐáp."),
        ];

        let first = retriever.build_index(&records).await.unwrap();
        let before = retriever.retrieve("hợp đồng lao động", 5).await.unwrap();

        let second = retriever.build_index(&records).await.unwrap();
        let after = retriever.retrieve("hợp đồng lao động", 5).await.unwrap();

        assert_eq!(first.chunks_indexed, second.chunks_indexed);
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.chunk, a.chunk);
            assert!((b.score - a.score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn failed_chunks_are_skipped_and_counted() {
        let embedder = Arc::new(FailSwitchEmbedder::failing_on("không nhúng được"));
        let retriever = Retriever::new(
            embedder as Arc<dyn TextEmbedder>,
            ChunkingConfig::default(),
            Metric::Cosine,
        );
        let records = vec![
            record("faq-1", RecordKind::Faq, "Câu hỏi?", "Câu hỏi?\nTrả lời."),
            record("faq-2", RecordKind::Faq, "Hỏng?", "Hỏng?\nkhông nhúng được"),
            record("faq-3", RecordKind::Faq, "Câu khác?", "Câu khác?\nTrả lời khác."),
        ];
        let report = retriever.build_index(&records).await.unwrap();
        assert_eq!(report.chunks_indexed, 2);
        assert_eq!(report.chunks_skipped, 1);

        // The failed chunk must not be retrievable; the survivors must be.
        let hits = retriever.retrieve("câu trả lời", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.chunk.record_id != "faq-2"));
    }

    #[tokio::test]
    async fn build_with_all_embeddings_failing_is_an_error() {
        let embedder = Arc::new(FailSwitchEmbedder::new(true));
        let retriever = Retriever::new(
            embedder as Arc<dyn TextEmbedder>,
            ChunkingConfig::default(),
            Metric::Cosine,
        );
        let records = vec![record("faq-1", RecordKind::Faq, "Hỏi?", "Hỏi?\nĐáp.")];
        let err = retriever.build_index(&records).await.unwrap_err();
        assert!(matches!(err, RetrievalError::NothingIndexed { failed: 1 }));

        // The previous (empty, generation 0) index must still be live.
        assert_eq!(retriever.generation().await, 0);
    }

    #[tokio::test]
    async fn query_embedding_failure_surfaces_as_error() {
        let embedder = Arc::new(FailSwitchEmbedder::new(false));
        let retriever = Retriever::new(
            Arc::clone(&embedder) as Arc<dyn TextEmbedder>,
            ChunkingConfig::default(),
            Metric::Cosine,
        );
        let records = vec![record("faq-1", RecordKind::Faq, "Hỏi?", "Hỏi?\nĐáp.")];
        retriever.build_index(&records).await.unwrap();

        embedder.failing.store(true, Ordering::Relaxed);
        let err = retriever.retrieve("câu hỏi", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::QueryEmbedding(_)));
    }

    #[tokio::test]
    async fn top_k_caps_result_size() {
        let retriever = retriever();
        let records: Vec<CorpusRecord> = (0..6)
            .map(|i| {
                record(
                    &format!("faq-{i}"),
                    RecordKind::Faq,
                    "Hỏi?",
                    &format!("Hỏi?\nĐáp số {i}."),
                )
            })
            .collect();
        let report = retriever.build_index(&records).await.unwrap();
        // Six atomic FAQ records, no failures: the index holds exactly six.
        assert_eq!(report.chunks_indexed, 6);
        assert_eq!(retriever.indexed_chunks().await, 6);

        assert_eq!(retriever.retrieve("hỏi đáp", 4).await.unwrap().len(), 4);
        assert!(retriever.retrieve("hỏi đáp", 0).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_retrievals_never_see_a_mixed_corpus() {
        let retriever = Arc::new(retriever());
        let corpus_a = vec![record(
            "act-a",
            RecordKind::Act,
            "Phiên bản A",
            "nội dung kết hôn phiên bản a ".repeat(50).as_str(),
        )];
        retriever.build_index(&corpus_a).await.unwrap();

        let reader = {
            let retriever = Arc::clone(&retriever);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let hits = retriever.retrieve("kết hôn", 5).await.unwrap();
                    if let Some(first) = hits.first() {
                        assert!(
                            hits.iter().all(|h| h.generation == first.generation),
                            "result set mixed corpus generations"
                        );
                    }
                }
            })
        };

        for _ in 0..20 {
            let corpus_b = vec![record(
                "act-b",
                RecordKind::Act,
                "Phiên bản B",
                "nội dung kết hôn phiên bản b ".repeat(50).as_str(),
            )];
            retriever.build_index(&corpus_b).await.unwrap();
        }

        reader.await.unwrap();
        assert_eq!(retriever.generation().await, 21);
    }
}
