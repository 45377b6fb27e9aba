//! Qdrant Cloud Inference client.
//!
//! Serves sentence-transformer models such as `qdrant/all-MiniLM-L6-v2`
//! without a local model runtime.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ensure_batch_len, post_json_with_retry, Embedder, HttpEmbedderOptions};

/// Model served by default; produces 384-dimensional vectors.
pub const DEFAULT_QDRANT_MODEL: &str = "qdrant/all-MiniLM-L6-v2";

/// Blocking client for a Qdrant `/inference/text` endpoint.
#[derive(Clone)]
pub struct QdrantEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    options: HttpEmbedderOptions,
}

impl QdrantEmbedder {
    /// Builds a client.
    ///
    /// # Arguments
    /// * `api_key` - Value for the `api-key` header (usually `QDRANT_API_KEY`)
    /// * `endpoint` - Full inference URL, e.g. `https://cluster-id.cloud.qdrant.io/inference/text`
    /// * `model` - Model identifier advertised by the cluster
    pub fn new(
        api_key: &str,
        endpoint: &str,
        model: impl Into<String>,
        options: HttpEmbedderOptions,
    ) -> Result<Self> {
        let model = model.into();
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Qdrant API key");
        anyhow::ensure!(
            endpoint.starts_with("http://") || endpoint.starts_with("https://"),
            "Qdrant endpoint must be an http(s) URL"
        );
        anyhow::ensure!(!model.trim().is_empty(), "missing Qdrant model name");
        let options = options.normalized();

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Qdrant API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(options.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Qdrant HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            options,
        })
    }
}

impl Embedder for QdrantEmbedder {
    fn batch_size(&self) -> usize {
        self.options.batch_size
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        ensure_batch_len(inputs, self.options.batch_size)?;
        let request = InferenceRequest {
            model: &self.model,
            inputs,
        };
        let response: InferenceResponse = post_json_with_retry(
            &self.client,
            &self.endpoint,
            &request,
            self.options.max_retries,
            "Qdrant",
        )?;
        response.into_embeddings(inputs.len())
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [&'a str],
}

/// Clusters answer either `{data: [{embedding, index}]}` or `{embeddings: [[..]]}`.
#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    data: Vec<InferenceData>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct InferenceData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl InferenceResponse {
    fn into_embeddings(self, expected_len: usize) -> Result<Vec<Vec<f32>>> {
        let vectors = if !self.data.is_empty() {
            let mut data = self.data;
            data.sort_by_key(|d| d.index.unwrap_or(0));
            data.into_iter().map(|d| d.embedding).collect::<Vec<_>>()
        } else if !self.embeddings.is_empty() {
            self.embeddings
        } else {
            return Err(anyhow!("Qdrant response missing embedding payloads"));
        };
        anyhow::ensure!(
            vectors.len() == expected_len,
            "Qdrant returned {} embeddings for {} inputs",
            vectors.len(),
            expected_len
        );
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_data_shaped_payloads() {
        let payload: InferenceResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[0.5,0.5],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#,
        )
        .unwrap();
        assert_eq!(
            payload.into_embeddings(2).unwrap(),
            vec![vec![1.0, 0.0], vec![0.5, 0.5]]
        );
    }

    #[test]
    fn accepts_bare_embedding_lists() {
        let payload: InferenceResponse =
            serde_json::from_str(r#"{"embeddings":[[1.0],[2.0]]}"#).unwrap();
        assert_eq!(payload.into_embeddings(2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn empty_payload_is_an_error() {
        let payload: InferenceResponse = serde_json::from_str("{}").unwrap();
        let err = payload.into_embeddings(1).unwrap_err();
        assert!(err.to_string().contains("missing embedding payloads"));
    }

    #[test]
    fn endpoint_must_be_http() {
        let result = QdrantEmbedder::new(
            "key",
            "cluster.qdrant.io/inference/text",
            DEFAULT_QDRANT_MODEL,
            HttpEmbedderOptions::default(),
        );
        assert!(result.is_err());
    }
}
