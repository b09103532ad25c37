//! Legal knowledge corpus.
//!
//! The corpus ships as a static JSON snapshot with three named categories:
//! statute texts (`legal_acts`), curated question/answer pairs (`faqs`) and
//! editorial articles (`articles`). Loading flattens the snapshot into a
//! uniform record list; records are immutable once loaded and chunking
//! happens downstream in [`crate::rag::chunker`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse corpus snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Category a record came from. Drives chunking policy (FAQ pairs stay
/// atomic) and the provenance labels returned with answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Act,
    Faq,
    Article,
}

/// One unit of source text after the snapshot is flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub id: String,
    pub kind: RecordKind,
    pub title: String,
    pub body: String,
}

/// Raw shape of the snapshot file. All categories are optional so a partial
/// snapshot (say, FAQs only) still loads.
#[derive(Debug, Default, Deserialize)]
pub struct KnowledgeSnapshot {
    #[serde(default)]
    pub legal_acts: Vec<ActEntry>,
    #[serde(default)]
    pub faqs: Vec<FaqEntry>,
    #[serde(default)]
    pub articles: Vec<ArticleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ActEntry {
    pub id: Option<String>,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FaqEntry {
    pub id: Option<String>,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct ArticleEntry {
    pub id: Option<String>,
    pub title: String,
    pub content: String,
}

impl KnowledgeSnapshot {
    pub fn from_path(path: &Path) -> Result<Self, CorpusError> {
        let raw = fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CorpusError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Flattens the snapshot into records, in category order (acts, FAQs,
    /// articles) and file order within each category. Entries without an id
    /// get a deterministic one derived from their position, so repeated loads
    /// of the same snapshot produce identical record ids.
    pub fn into_records(self) -> Vec<CorpusRecord> {
        let mut records =
            Vec::with_capacity(self.legal_acts.len() + self.faqs.len() + self.articles.len());

        for (position, act) in self.legal_acts.into_iter().enumerate() {
            records.push(CorpusRecord {
                id: act.id.unwrap_or_else(|| format!("act-{}", position + 1)),
                kind: RecordKind::Act,
                title: act.title,
                body: act.content,
            });
        }

        for (position, faq) in self.faqs.into_iter().enumerate() {
            let body = format!("{}\n{}", faq.question, faq.answer);
            records.push(CorpusRecord {
                id: faq.id.unwrap_or_else(|| format!("faq-{}", position + 1)),
                kind: RecordKind::Faq,
                title: faq.question,
                body,
            });
        }

        for (position, article) in self.articles.into_iter().enumerate() {
            records.push(CorpusRecord {
                id: article.id.unwrap_or_else(|| format!("article-{}", position + 1)),
                kind: RecordKind::Article,
                title: article.title,
                body: article.content,
            });
        }

        records
    }
}

/// Loads and flattens a snapshot in one step.
pub fn load_records(path: &Path) -> Result<Vec<CorpusRecord>, CorpusError> {
    let records = KnowledgeSnapshot::from_path(path)?.into_records();
    if records.is_empty() {
        tracing::warn!("Corpus snapshot {} contains no records", path.display());
    }
    Ok(records)
}
