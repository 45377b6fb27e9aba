//! Embedding model clients.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

mod openai;
mod qdrant;

pub use openai::OpenAiEmbedder;
pub use qdrant::{QdrantEmbedder, DEFAULT_QDRANT_MODEL};

/// Converts text into fixed-length vectors.
pub trait Embedder {
    /// Largest number of inputs accepted by one [`Embedder::embed_batch`] call.
    fn batch_size(&self) -> usize;

    /// Embeds a batch; output order matches input order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single string.
    fn embed(&self, input: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[input])?
            .pop()
            .context("embedding model returned no vector")
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn batch_size(&self) -> usize {
        (**self).batch_size()
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(inputs)
    }
}

/// Transport settings shared by the HTTP embedding clients.
#[derive(Debug, Clone, Copy)]
pub struct HttpEmbedderOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts per batch, including the first.
    pub max_retries: usize,
    /// Inputs per request.
    pub batch_size: usize,
}

impl Default for HttpEmbedderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 5,
            batch_size: 64,
        }
    }
}

impl HttpEmbedderOptions {
    fn normalized(self) -> Self {
        Self {
            timeout: self.timeout,
            max_retries: self.max_retries.max(1),
            batch_size: self.batch_size.max(1),
        }
    }
}

/// Embeds any number of inputs, splitting them into `batch_size` requests.
pub fn embed_all<E, S>(embedder: &E, inputs: &[S]) -> Result<Vec<Vec<f32>>>
where
    E: Embedder + ?Sized,
    S: AsRef<str>,
{
    let batch_size = embedder.batch_size().max(1);
    let mut vectors = Vec::with_capacity(inputs.len());
    for batch in inputs.chunks(batch_size) {
        let refs: Vec<&str> = batch.iter().map(AsRef::as_ref).collect();
        let embedded = embedder.embed_batch(&refs)?;
        anyhow::ensure!(
            embedded.len() == refs.len(),
            "embedding model returned {} vectors for {} inputs",
            embedded.len(),
            refs.len()
        );
        vectors.extend(embedded);
    }
    Ok(vectors)
}

fn ensure_batch_len(inputs: &[&str], batch_size: usize) -> Result<()> {
    anyhow::ensure!(
        inputs.len() <= batch_size,
        "batch of {} exceeds configured max {}",
        inputs.len(),
        batch_size
    );
    Ok(())
}

/// POSTs `body` as JSON, retrying throttling, server errors and transient
/// transport failures up to `max_retries` attempts.
fn post_json_with_retry<B, R>(
    client: &Client,
    endpoint: &str,
    body: &B,
    max_retries: usize,
    service: &str,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut attempt = 0usize;
    loop {
        match client.post(endpoint).json(body).send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return resp
                        .json()
                        .with_context(|| format!("failed to parse {service} embedding response"));
                }
                let text = resp
                    .text()
                    .unwrap_or_else(|_| "<body unavailable>".to_string());
                if should_retry(status) && attempt + 1 < max_retries {
                    attempt += 1;
                    tracing::warn!(service, %status, attempt, "retrying embedding request");
                    thread::sleep(retry_backoff(attempt));
                    continue;
                }
                anyhow::bail!("{service} embeddings request failed ({status}): {text}");
            }
            Err(err) => {
                if is_retryable_error(&err) && attempt + 1 < max_retries {
                    attempt += 1;
                    tracing::warn!(service, error = %err, attempt, "retrying embedding request");
                    thread::sleep(retry_backoff(attempt));
                    continue;
                }
                return Err(err).with_context(|| format!("failed to call {service} at {endpoint}"));
            }
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    /// Deterministic embedder: each vector is `[chars, words, 1.0]`.
    pub(crate) struct CountingEmbedder {
        pub(crate) batch_size: usize,
        pub(crate) calls: RefCell<Vec<usize>>,
    }

    impl CountingEmbedder {
        pub(crate) fn new(batch_size: usize) -> Self {
            Self {
                batch_size,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Embedder for CountingEmbedder {
        fn batch_size(&self) -> usize {
            self.batch_size
        }

        fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            ensure_batch_len(inputs, self.batch_size)?;
            self.calls.borrow_mut().push(inputs.len());
            Ok(inputs
                .iter()
                .map(|text| {
                    vec![
                        text.chars().count() as f32,
                        text.split_whitespace().count() as f32,
                        1.0,
                    ]
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CountingEmbedder;
    use super::*;

    #[test]
    fn embed_all_splits_into_batches() {
        let embedder = CountingEmbedder::new(2);
        let inputs = ["a", "bb", "ccc", "dddd", "eeeee"];
        let vectors = embed_all(&embedder, &inputs).unwrap();
        assert_eq!(*embedder.calls.borrow(), vec![2, 2, 1]);
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn embed_all_with_no_inputs_makes_no_calls() {
        let embedder = CountingEmbedder::new(4);
        let vectors = embed_all::<_, &str>(&embedder, &[]).unwrap();
        assert!(vectors.is_empty());
        assert!(embedder.calls.borrow().is_empty());
    }

    #[test]
    fn single_embed_goes_through_batch() {
        let embedder: Box<dyn Embedder> = Box::new(CountingEmbedder::new(1));
        assert_eq!(embedder.embed("two words").unwrap(), vec![9.0, 2.0, 1.0]);
    }

    #[test]
    fn oversized_batches_are_rejected() {
        let err = ensure_batch_len(&["a", "b", "c"], 2).unwrap_err();
        assert_eq!(err.to_string(), "batch of 3 exceeds configured max 2");
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_backoff(1), Duration::from_millis(1000));
        assert_eq!(retry_backoff(5), retry_backoff(9));
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::UNAUTHORIZED));
    }
}
