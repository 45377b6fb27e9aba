//! OpenAI-compatible `/embeddings` client.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ensure_batch_len, post_json_with_retry, Embedder, HttpEmbedderOptions};

/// Blocking client for OpenAI-compatible embedding endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    options: HttpEmbedderOptions,
}

impl OpenAiEmbedder {
    /// Builds a client for `{base_url}/embeddings`.
    ///
    /// `dimensions` is forwarded to models that support shortened vectors.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        dimensions: Option<usize>,
        options: HttpEmbedderOptions,
    ) -> Result<Self> {
        let model = model.into();
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing OpenAI model name");
        let options = options.normalized();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(options.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;

        Ok(Self {
            client,
            endpoint: embeddings_endpoint(base_url),
            model,
            dimensions,
            options,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn batch_size(&self) -> usize {
        self.options.batch_size
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        ensure_batch_len(inputs, self.options.batch_size)?;
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };
        let response: EmbeddingResponse = post_json_with_retry(
            &self.client,
            &self.endpoint,
            &request,
            self.options.max_retries,
            "OpenAI",
        )?;
        response.into_vectors(inputs.len())
    }
}

fn embeddings_endpoint(base_url: &str) -> String {
    format!("{}/embeddings", base_url.trim_end_matches('/'))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingResponse {
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>> {
        anyhow::ensure!(
            self.data.len() == expected,
            "OpenAI returned {} embeddings for {} inputs",
            self.data.len(),
            expected
        );
        self.data.sort_by_key(|entry| entry.index);
        Ok(self.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_ignores_trailing_slash() {
        assert_eq!(
            embeddings_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn response_is_reordered_by_index() {
        let body = r#"{"data":[
            {"embedding":[2.0],"index":1},
            {"embedding":[1.0],"index":0}
        ]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_vectors(2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn response_count_must_match() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[1.0],"index":0}]}"#).unwrap();
        assert!(parsed.into_vectors(2).is_err());
    }

    #[test]
    fn request_omits_absent_dimensions() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &["hello"],
            dimensions: None,
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"model":"text-embedding-3-small","input":["hello"]}"#
        );
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = OpenAiEmbedder::new(
            " ",
            "https://api.openai.com/v1",
            "text-embedding-3-small",
            None,
            HttpEmbedderOptions::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "missing OpenAI API key");
    }
}
