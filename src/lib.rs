#![warn(missing_docs)]
//! Faculty profile scraping, chunking and pgvector retrieval for matching
//! students with professors.

pub mod api;
pub mod chat;
pub mod chunker;
pub mod config;
pub mod documents;
pub mod embedder;
pub mod extractor;
pub mod fetch;
mod logging;
pub mod pipeline;
pub mod rag;
pub mod record;
pub mod store;

pub use chat::{ChatModel, ChatRequest};
pub use chunker::{chunk, ChunkError, Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use documents::{DocumentError, DocumentReader, FileDocumentReader};
pub use embedder::{embed_all, Embedder};
pub use extractor::{extract, ProfileExtractor};
pub use fetch::{scrape_batch, FetchError, FetchedPage, HttpFetcher, PageFetcher, ScrapeReport};
pub use logging::init_tracing;
pub use pipeline::{upload_record, upload_records, UploadOptions, UploadOutcome, UploadReport};
pub use rag::{answer_query, QueryAnswer, QueryOptions};
pub use record::{ProfessorRecord, ProfileSummary};
pub use store::{
    PgVectorStore, ProfessorMatch, ProfessorRow, ProfileStore, ReplacedProfile, StoreTables,
    TableName,
};
