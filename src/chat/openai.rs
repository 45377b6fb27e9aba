use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ensure_success, non_empty, ChatModel, ChatRequest, CHAT_TIMEOUT};

/// OpenAI-compatible `/chat/completions` provider.
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenAiChat {
    /// Builds a provider for `{base_url}/chat/completions`.
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(CHAT_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

impl ChatModel for OpenAiChat {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: [
                Message {
                    role: "system",
                    content: request.system,
                },
                Message {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .context("failed to call OpenAI chat completions")?;
        let parsed: CompletionResponse = ensure_success(resp, "OpenAI")?
            .json()
            .context("failed to parse OpenAI response")?;
        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();
        non_empty(answer, "OpenAI")
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
