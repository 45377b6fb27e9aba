//! Plain-text and PDF document readers feeding the chunker.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure to turn a document into text.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The PDF could not be parsed.
    #[error("failed to extract text from PDF {}: {message}", path.display())]
    Pdf {
        /// Offending path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Source of document text.
pub trait DocumentReader {
    /// Returns the full text of the document at `path`.
    fn read(&self, path: &Path) -> Result<String, DocumentError>;
}

/// Reads UTF-8 text files directly and extracts text from `.pdf` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDocumentReader;

impl FileDocumentReader {
    fn read_pdf(path: &Path) -> Result<String, DocumentError> {
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|err| DocumentError::Pdf {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

impl DocumentReader for FileDocumentReader {
    fn read(&self, path: &Path) -> Result<String, DocumentError> {
        if is_pdf(path) {
            return Self::read_pdf(path);
        }
        fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
