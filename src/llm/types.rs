use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("cannot reach generation backend: {0}")]
    Connect(String),
    #[error("generation request timed out")]
    Timeout,
    #[error("generation backend returned status {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("malformed response from generation backend: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-request decoding overrides. Unset fields fall back to the configured
/// defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
}

/// One chat completion to run: a system prompt (persona plus any grounding
/// excerpts), the user's question, and decoding overrides.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Health probes get a much shorter deadline than completions.
    pub health_timeout_secs: u64,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            timeout_secs: 90,
            health_timeout_secs: 2,
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
        }
    }
}
