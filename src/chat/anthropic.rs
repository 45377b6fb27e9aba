use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ensure_success, non_empty, ChatModel, ChatRequest, CHAT_TIMEOUT};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic messages API provider.
pub struct AnthropicChat {
    client: Client,
    model: String,
}

impl AnthropicChat {
    /// Builds a provider for `model`.
    pub fn new(api_key: &str, model: impl Into<String>) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Anthropic API key");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(CHAT_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }
}

impl ChatModel for AnthropicChat {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            system: request.system,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![UserMessage {
                role: "user",
                content: vec![ContentBlock {
                    kind: "text",
                    text: request.prompt,
                }],
            }],
        };
        let resp = self
            .client
            .post(MESSAGES_URL)
            .json(&body)
            .send()
            .context("failed to call Anthropic messages API")?;
        let parsed: MessagesResponse = ensure_success(resp, "Anthropic")?
            .json()
            .context("failed to parse Anthropic response")?;
        non_empty(parsed.text(), "Anthropic")
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: usize,
    temperature: f32,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

impl MessagesResponse {
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
