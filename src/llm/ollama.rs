use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::GenerationBackend;
use super::types::{ChatMessage, GenerationConfig, GenerationError, GenerationOptions, GenerationRequest};

/// Chat-completion client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    config: GenerationConfig,
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: GenerationConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            config,
            base_url,
            client: Client::new(),
        }
    }

    fn merged_options(&self, overrides: &GenerationOptions) -> Value {
        json!({
            "temperature": overrides.temperature.unwrap_or(self.config.temperature),
            "top_p": overrides.top_p.unwrap_or(self.config.top_p),
            "top_k": overrides.top_k.unwrap_or(self.config.top_k),
        })
    }
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Connect(err.to_string())
    }
}

fn extract_content(payload: &Value) -> Result<String, GenerationError> {
    payload
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|content| content.trim().to_string())
        .ok_or_else(|| GenerationError::MalformedResponse("missing message.content".to_string()))
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let res = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.health_timeout_secs))
            .send()
            .await;
        match res {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/api/chat", self.base_url);

        let messages = vec![
            ChatMessage::system(request.system),
            ChatMessage::user(request.user),
        ];
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "options": self.merged_options(&request.options),
        });

        let res = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = res.json().await.map_err(|err| {
            if err.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::MalformedResponse(err.to_string())
            }
        })?;

        extract_content(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trimmed_message_content() {
        let payload = json!({
            "model": "qwen2.5:7b-instruct",
            "message": { "role": "assistant", "content": "  Trả lời của mô hình.  " }
        });
        assert_eq!(extract_content(&payload).unwrap(), "Trả lời của mô hình.");
    }

    #[test]
    fn missing_content_is_malformed() {
        let payload = json!({ "model": "qwen2.5:7b-instruct", "done": true });
        let err = extract_content(&payload).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn request_overrides_win_over_configured_defaults() {
        let client = OllamaClient::new(GenerationConfig::default());
        let merged = client.merged_options(&GenerationOptions {
            temperature: Some(0.7),
            top_p: None,
            top_k: Some(10),
        });
        assert_eq!(merged["temperature"], 0.7);
        assert_eq!(merged["top_p"], 0.9);
        assert_eq!(merged["top_k"], 10);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires a running Ollama server
    async fn chat_round_trip_against_live_server() {
        let client = OllamaClient::new(GenerationConfig::default());
        assert!(client.check_health().await);

        let reply = client
            .generate(GenerationRequest {
                system: "Bạn là trợ lý. Trả lời thật ngắn gọn.".to_string(),
                user: "Chào bạn".to_string(),
                options: GenerationOptions::default(),
            })
            .await
            .unwrap();
        assert!(!reply.is_empty());
    }
}
