// Copyright 2025 Chatcache Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

// Ollama Provider (Local)

use async_trait::async_trait;
use chatcache_core::{ChatError, LanguageModel, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::LLMConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Ollama `/api/chat` client sending the rendered prompt as one user turn
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &LLMConfig) -> anyhow::Result<Self> {
        Self::new(
            config.ollama_base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl LanguageModel for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::ModelInvocation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChatError::ModelInvocation(format!(
                "Ollama returned {}: {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ModelInvocation(format!("malformed response: {}", e)))?;

        let content = parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| ChatError::ModelInvocation("response has no message".to_string()))?;

        debug!(
            model = %parsed.model.as_deref().unwrap_or(&self.model),
            duration_ms = start.elapsed().as_millis() as u64,
            "Ollama completion finished"
        );

        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OllamaProvider {
        OllamaProvider::new(server.uri(), "llama3.2:1b", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_complete_sends_single_user_turn() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "model": "llama3.2:1b",
                "messages": [{"role": "user", "content": "\nHello\n"}],
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2:1b",
                "message": {"role": "assistant", "content": "Hi! How can I help?"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = provider(&server).complete("\nHello\n").await.unwrap();
        assert_eq!(answer, "Hi! How can I help?");
    }

    #[tokio::test]
    async fn test_error_status_is_model_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = provider(&server).complete("Hello").await.unwrap_err();
        match err {
            ChatError::ModelInvocation(msg) => assert!(msg.contains("model not found")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_message_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&server)
            .await;

        let err = provider(&server).complete("Hello").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelInvocation(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider =
            OllamaProvider::new("http://localhost:11434/", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.name(), "m");
    }
}
