//! Corpus chunking.
//!
//! Long record bodies are cut into overlapping character windows so each
//! indexed unit fits the embedding model's effective context. Windows are
//! counted in characters, not bytes: the corpus is Vietnamese and byte
//! offsets would split UTF-8 sequences. FAQ records are exempt: a curated
//! question/answer pair is already one retrieval unit.

use serde::{Deserialize, Serialize};

use crate::corpus::{CorpusRecord, RecordKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub window_size: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            overlap: 100,
        }
    }
}

/// One indexable slice of a corpus record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<record-id>#<seq>`, unique within one index build.
    pub id: String,
    pub record_id: String,
    pub kind: RecordKind,
    pub title: String,
    /// Position of this chunk within its record.
    pub seq: usize,
    pub text: String,
}

/// Splits a record into chunks. FAQ records come back as a single chunk
/// regardless of length; everything else goes through the sliding window.
pub fn chunk_record(record: &CorpusRecord, config: &ChunkingConfig) -> Vec<Chunk> {
    let pieces = match record.kind {
        RecordKind::Faq => vec![record.body.clone()],
        _ => chunk_text(&record.body, config.window_size, config.overlap),
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(seq, text)| Chunk {
            id: format!("{}#{}", record.id, seq),
            record_id: record.id.clone(),
            kind: record.kind,
            title: record.title.clone(),
            seq,
            text,
        })
        .collect()
}

/// Splits text into overlapping character windows.
///
/// The window advances by `window_size - overlap` per step. A final remainder
/// shorter than half a window is appended to the previous window instead of
/// becoming its own undersized chunk, so every character of the input lands
/// in exactly one (boundary-adjusted) window and no fragment too small to
/// embed meaningfully is ever emitted. Text at or under `window_size`
/// characters (including empty text) yields a single chunk.
pub fn chunk_text(text: &str, window_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total <= window_size {
        return vec![text.to_string()];
    }

    let stride = window_size.saturating_sub(overlap).max(1);
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + window_size).min(total);

        if end == total {
            if end - start < window_size / 2 {
                if let Some(last) = spans.last_mut() {
                    // Undersized tail: extend the previous window to the end
                    // of the text instead of emitting it on its own.
                    last.1 = total;
                    break;
                }
            }
            spans.push((start, end));
            break;
        }

        spans.push((start, end));
        start += stride;
    }

    spans
        .into_iter()
        .map(|(s, e)| chars[s..e].iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: RecordKind, body: &str) -> CorpusRecord {
        CorpusRecord {
            id: "rec-1".to_string(),
            kind,
            title: "Tiêu đề".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("ngắn", 100, 10), vec!["ngắn".to_string()]);
    }

    #[test]
    fn empty_text_is_one_empty_chunk() {
        assert_eq!(chunk_text("", 100, 10), vec![String::new()]);
    }

    #[test]
    fn windows_reconstruct_the_original_text() {
        let text = "abcdefghij".repeat(7); // 70 chars
        let window = 16;
        let overlap = 4;
        let chunks = chunk_text(&text, window, overlap);
        assert!(chunks.len() > 1);

        // Dropping the overlapping prefix of every chunk after the first
        // must give back the input exactly: nothing lost, nothing doubled.
        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn undersized_tail_merges_into_previous_window() {
        // stride 8: spans (0,10), (8,18); remainder 16..20 is 4 chars < 5.
        let text: String = ('a'..='t').collect(); // 20 chars
        let chunks = chunk_text(&text, 10, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], text.chars().skip(8).collect::<String>());
        assert!(chunks[1].chars().count() > 10);
    }

    #[test]
    fn half_window_tail_stays_standalone() {
        // stride 8: spans (0,10), (8,18), (16,21); tail is exactly 5 chars.
        let text: String = ('a'..='u').collect(); // 21 chars
        let chunks = chunk_text(&text, 10, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn windows_count_characters_not_bytes() {
        let text = "ậ".repeat(30); // 3 bytes per char
        let chunks = chunk_text(&text, 20, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 20);
    }

    #[test]
    fn faq_records_stay_atomic() {
        let body = "Câu hỏi dài? ".repeat(200);
        let chunks = chunk_record(&record(RecordKind::Faq, &body), &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, body);
    }

    #[test]
    fn act_records_are_windowed_with_sequential_ids() {
        let body = "Điều khoản. ".repeat(300);
        let config = ChunkingConfig {
            window_size: 500,
            overlap: 50,
        };
        let chunks = chunk_record(&record(RecordKind::Act, &body), &config);
        assert!(chunks.len() > 1);
        for (seq, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq, seq);
            assert_eq!(chunk.id, format!("rec-1#{seq}"));
            assert_eq!(chunk.record_id, "rec-1");
        }
    }
}
