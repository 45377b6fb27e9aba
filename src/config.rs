//! Command-line argument groups shared by the binaries.
//!
//! Every option can also be set through the environment (or a `.env` file
//! loaded by the binary before parsing).

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};

use crate::chat::{AnthropicChat, ChatModel, OllamaChat, OpenAiChat, DEFAULT_OLLAMA_URL};
use crate::chunker::{ChunkError, Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embedder::{
    Embedder, HttpEmbedderOptions, OpenAiEmbedder, QdrantEmbedder, DEFAULT_QDRANT_MODEL,
};
use crate::fetch::{read_url_list, HttpFetcher};
use crate::store::{
    PgVectorStore, StoreTables, DEFAULT_EMBEDDINGS_TABLE, DEFAULT_PROFESSORS_TABLE,
};

/// Window configuration for the chunker.
#[derive(Args, Debug, Clone)]
pub struct ChunkArgs {
    /// Maximum characters per chunk
    #[arg(long, env = "PROFMATCH_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "PROFMATCH_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,
}

impl ChunkArgs {
    /// Validated chunker.
    pub fn build(&self) -> Result<Chunker, ChunkError> {
        Chunker::new(self.chunk_size, self.chunk_overlap)
    }
}

/// Which profile pages to fetch and how.
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Profile URL to scrape (repeatable)
    #[arg(long = "url")]
    pub urls: Vec<String>,

    /// File with one profile URL per line (`#` starts a comment)
    #[arg(long, env = "PROFMATCH_URL_FILE")]
    pub url_file: Option<PathBuf>,

    /// Seconds before a page request is abandoned
    #[arg(long, env = "PROFMATCH_FETCH_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,
}

impl FetchArgs {
    /// URLs from `--url` followed by those in `--url-file`.
    pub fn urls(&self) -> Result<Vec<String>> {
        let mut urls = self.urls.clone();
        if let Some(path) = &self.url_file {
            let file =
                File::open(path).with_context(|| format!("failed to open URL file {:?}", path))?;
            urls.extend(read_url_list(BufReader::new(file))?);
        }
        anyhow::ensure!(!urls.is_empty(), "no URLs given; use --url or --url-file");
        Ok(urls)
    }

    /// Blocking page fetcher with the configured timeout.
    pub fn build_fetcher(&self) -> Result<HttpFetcher> {
        HttpFetcher::new(Duration::from_secs(self.timeout_secs.max(1)))
    }
}

/// Credentials and endpoint for OpenAI-compatible APIs.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// API key for OpenAI-compatible endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,
}

impl OpenAiArgs {
    fn api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set for the OpenAI provider"))
    }
}

/// Embedding backends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings`.
    Openai,
    /// Qdrant Cloud Inference.
    Qdrant,
}

/// Embedding model selection.
#[derive(Args, Debug, Clone)]
pub struct EmbedderArgs {
    /// Embedding backend
    #[arg(
        long,
        env = "PROFMATCH_EMBED_PROVIDER",
        value_enum,
        default_value_t = EmbeddingProvider::Qdrant
    )]
    pub embedding_provider: EmbeddingProvider,

    /// OpenAI credentials, shared with the chat provider.
    #[command(flatten)]
    pub openai: OpenAiArgs,

    /// OpenAI embedding model
    #[arg(
        long,
        env = "PROFMATCH_OPENAI_EMBED_MODEL",
        default_value = "text-embedding-3-small"
    )]
    pub openai_embedding_model: String,

    /// Requested vector size for models that support shortening
    #[arg(long, env = "PROFMATCH_EMBED_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Qdrant Cloud API key
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    /// Qdrant inference endpoint, e.g. https://<cluster>.cloud.qdrant.io/inference/text
    #[arg(long, env = "PROFMATCH_QDRANT_ENDPOINT")]
    pub qdrant_endpoint: Option<String>,

    /// Qdrant inference model
    #[arg(long, env = "PROFMATCH_QDRANT_MODEL", default_value = DEFAULT_QDRANT_MODEL)]
    pub qdrant_model: String,

    /// Inputs per embedding request
    #[arg(long, env = "PROFMATCH_EMBED_BATCH", default_value_t = 64)]
    pub embed_batch_size: usize,

    /// Attempts per embedding request
    #[arg(long, env = "PROFMATCH_EMBED_MAX_RETRIES", default_value_t = 5)]
    pub embed_max_retries: usize,

    /// Seconds before an embedding request is abandoned
    #[arg(long, env = "PROFMATCH_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    pub embed_timeout_secs: u64,
}

impl EmbedderArgs {
    fn options(&self) -> HttpEmbedderOptions {
        HttpEmbedderOptions {
            timeout: Duration::from_secs(self.embed_timeout_secs.max(1)),
            max_retries: self.embed_max_retries,
            batch_size: self.embed_batch_size,
        }
    }

    /// Builds the selected embedding client.
    pub fn build(&self) -> Result<Box<dyn Embedder + Send>> {
        let embedder: Box<dyn Embedder + Send> = match self.embedding_provider {
            EmbeddingProvider::Openai => Box::new(OpenAiEmbedder::new(
                self.openai.api_key()?,
                &self.openai.openai_base_url,
                self.openai_embedding_model.as_str(),
                self.embedding_dimensions,
                self.options(),
            )?),
            EmbeddingProvider::Qdrant => {
                let api_key = self
                    .qdrant_api_key
                    .as_deref()
                    .ok_or_else(|| anyhow!("QDRANT_API_KEY must be set for the Qdrant provider"))?;
                let endpoint = self.qdrant_endpoint.as_deref().ok_or_else(|| {
                    anyhow!("PROFMATCH_QDRANT_ENDPOINT must be set for the Qdrant provider")
                })?;
                Box::new(QdrantEmbedder::new(
                    api_key,
                    endpoint,
                    self.qdrant_model.as_str(),
                    self.options(),
                )?)
            }
        };
        Ok(embedder)
    }
}

/// Postgres connection and table names.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Postgres connection string (postgres://...)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Schema holding both tables
    #[arg(long, env = "PROFMATCH_PG_SCHEMA", default_value = "public")]
    pub schema: String,

    /// Professors table
    #[arg(long, env = "PROFMATCH_PROFESSORS_TABLE", default_value = DEFAULT_PROFESSORS_TABLE)]
    pub professors_table: String,

    /// Chunk embeddings table
    #[arg(long, env = "PROFMATCH_EMBEDDINGS_TABLE", default_value = DEFAULT_EMBEDDINGS_TABLE)]
    pub embeddings_table: String,
}

impl StoreArgs {
    /// Validated table names.
    pub fn tables(&self) -> Result<StoreTables> {
        StoreTables::new(&self.schema, &self.professors_table, &self.embeddings_table)
    }

    /// Opens the store.
    pub fn connect(&self) -> Result<PgVectorStore> {
        PgVectorStore::connect(&self.database_url, self.tables()?)
    }
}

/// Chat backends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChatProvider {
    /// OpenAI-compatible chat completions.
    Openai,
    /// Anthropic messages API.
    Anthropic,
    /// Local Ollama server.
    Ollama,
}

/// Answer model selection.
#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Target LLM provider
    #[arg(
        long,
        env = "PROFMATCH_LLM_PROVIDER",
        value_enum,
        default_value_t = ChatProvider::Ollama
    )]
    pub llm_provider: ChatProvider,

    /// OpenAI chat model
    #[arg(long, env = "PROFMATCH_OPENAI_CHAT_MODEL", default_value = "gpt-4o-mini")]
    pub openai_chat_model: String,

    /// Anthropic API key (required when --llm-provider anthropic)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Anthropic model identifier
    #[arg(
        long,
        env = "PROFMATCH_ANTHROPIC_MODEL",
        default_value = "claude-3-5-sonnet-latest"
    )]
    pub anthropic_model: String,

    /// Ollama server URL
    #[arg(long, env = "PROFMATCH_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Ollama model
    #[arg(long, env = "PROFMATCH_OLLAMA_MODEL", default_value = "llama2")]
    pub ollama_model: String,
}

impl ChatArgs {
    /// Builds the selected provider; OpenAI credentials come from `openai`.
    pub fn build(&self, openai: &OpenAiArgs) -> Result<Box<dyn ChatModel>> {
        let chat: Box<dyn ChatModel> = match self.llm_provider {
            ChatProvider::Openai => Box::new(OpenAiChat::new(
                openai.api_key()?,
                &openai.openai_base_url,
                self.openai_chat_model.as_str(),
            )?),
            ChatProvider::Anthropic => {
                let key = self.anthropic_api_key.as_deref().ok_or_else(|| {
                    anyhow!("ANTHROPIC_API_KEY must be set for the Anthropic provider")
                })?;
                Box::new(AnthropicChat::new(key, self.anthropic_model.as_str())?)
            }
            ChatProvider::Ollama => Box::new(OllamaChat::new(
                &self.ollama_url,
                self.ollama_model.as_str(),
            )?),
        };
        Ok(chat)
    }
}
