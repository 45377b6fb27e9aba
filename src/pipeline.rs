//! Scraped record → chunks → vectors → store.

use anyhow::Result;
use thiserror::Error;

use crate::chunker::Chunker;
use crate::embedder::{embed_all, Embedder};
use crate::record::ProfessorRecord;
use crate::store::{ProfessorRow, ProfileStore, ReplacedProfile};

/// How a record is turned into stored vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    /// Splits the profile body before embedding; `None` embeds it whole.
    pub chunker: Option<Chunker>,
    /// Leaves professors whose primary email is already stored untouched.
    pub skip_existing: bool,
}

/// Result of uploading one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Professor row written along with `chunks` embeddings.
    Uploaded {
        /// Database id.
        professor_id: i64,
        /// Primary email.
        email: String,
        /// Number of stored chunks.
        chunks: usize,
    },
    /// Professor already present and `skip_existing` was set.
    Skipped {
        /// Primary email.
        email: String,
    },
}

/// The record cannot be stored.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Email is the natural key.
    #[error("record from {source_url} has no email address")]
    MissingEmail {
        /// Page the record came from.
        source_url: String,
    },
    /// Embedding or storage failed.
    #[error(transparent)]
    Service(#[from] anyhow::Error),
}

/// Stores one record and its embeddings.
pub fn upload_record<E, S>(
    record: &ProfessorRecord,
    embedder: &E,
    store: &mut S,
    options: &UploadOptions,
) -> Result<UploadOutcome, UploadError>
where
    E: Embedder + ?Sized,
    S: ProfileStore + ?Sized,
{
    let row = ProfessorRow::from_record(record).ok_or_else(|| UploadError::MissingEmail {
        source_url: record.source_url.clone(),
    })?;
    if options.skip_existing && store.professor_exists(&row.email)? {
        tracing::info!(email = %row.email, "professor already stored; skipping");
        return Ok(UploadOutcome::Skipped { email: row.email });
    }

    let chunks = match &options.chunker {
        Some(chunker) => chunker.chunk(&row.research_areas),
        None => vec![row.research_areas.clone()],
    };
    let vectors = embed_all(embedder, &chunks)?;
    let embedded: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();

    let ReplacedProfile {
        professor_id,
        pruned,
    } = store.replace_profile(&row, &embedded)?;
    tracing::info!(
        email = %row.email,
        professor_id,
        chunks = embedded.len(),
        pruned,
        "uploaded professor"
    );
    Ok(UploadOutcome::Uploaded {
        professor_id,
        email: row.email,
        chunks: embedded.len(),
    })
}

/// Totals for a batch upload.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Records written.
    pub uploaded: usize,
    /// Records skipped because they were already stored.
    pub skipped: usize,
    /// Records that could not be stored, with their source URL.
    pub failures: Vec<(String, UploadError)>,
}

/// Uploads every record in order; one failing record never stops the batch.
pub fn upload_records<E, S>(
    records: &[ProfessorRecord],
    embedder: &E,
    store: &mut S,
    options: &UploadOptions,
) -> UploadReport
where
    E: Embedder + ?Sized,
    S: ProfileStore + ?Sized,
{
    let mut report = UploadReport::default();
    for record in records {
        match upload_record(record, embedder, store, options) {
            Ok(UploadOutcome::Uploaded { .. }) => report.uploaded += 1,
            Ok(UploadOutcome::Skipped { .. }) => report.skipped += 1,
            Err(err) => {
                tracing::warn!(url = %record.source_url, error = %err, "upload failed");
                report.failures.push((record.source_url.clone(), err));
            }
        }
    }
    report
}
