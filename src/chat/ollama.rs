use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_success, non_empty, ChatModel, ChatRequest, CHAT_TIMEOUT};

/// Default local Ollama server.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Local Ollama `/api/chat` provider, non-streaming.
pub struct OllamaChat {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaChat {
    /// Builds a provider for the server at `base_url`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .context("failed to build Ollama HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

impl ChatModel for OllamaChat {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let body = OllamaRequest {
            model: &self.model,
            stream: false,
            messages: [
                OllamaMessage {
                    role: "system",
                    content: request.system,
                },
                OllamaMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .with_context(|| format!("failed to call Ollama at {}", self.endpoint))?;
        let parsed: OllamaResponse = ensure_success(resp, "Ollama")?
            .json()
            .context("failed to parse Ollama response")?;
        non_empty(parsed.message.content, "Ollama")
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: [OllamaMessage<'a>; 2],
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaReply,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_targets_chat_api() {
        let chat = OllamaChat::new("http://localhost:11434/", "llama2").unwrap();
        assert_eq!(chat.endpoint, "http://localhost:11434/api/chat");
    }

    #[test]
    fn parses_non_streaming_reply() {
        let parsed: OllamaResponse = serde_json::from_str(
            r#"{"model":"llama2","message":{"role":"assistant","content":"Try Dr. Doe."},"done":true}"#,
        )
        .unwrap();
        assert_eq!(parsed.message.content, "Try Dr. Doe.");
    }
}
