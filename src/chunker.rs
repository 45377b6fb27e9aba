//! Fixed-size overlapping text windows for embedding.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::documents::{DocumentError, DocumentReader};

/// Chunk size used by the upload and chunk tools when none is given.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Overlap used by the upload and chunk tools when none is given.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Invalid chunker parameters, raised before any text is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// A chunk must hold at least one character.
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    /// The cursor would never advance.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge {
        /// Requested chunk size.
        chunk_size: usize,
        /// Requested overlap.
        overlap: usize,
    },
}

/// Splits text into windows of at most `chunk_size` characters where
/// consecutive windows share `overlap` characters.
///
/// Lengths count Unicode scalar values, never bytes, so multi-byte text is
/// never split inside a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Validates the window configuration.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Splits `text` into overlapping windows.
    ///
    /// The final window ends exactly at the end of the text; no window is
    /// emitted that lies entirely inside the previous one.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character plus the end of the string, so
        // character positions map straight onto slice bounds.
        let mut bounds: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        bounds.push(text.len());
        let char_len = bounds.len() - 1;

        let mut chunks = Vec::with_capacity(char_len / self.step() + 1);
        let mut cursor = 0usize;
        loop {
            let end = (cursor + self.chunk_size).min(char_len);
            chunks.push(text[bounds[cursor]..bounds[end]].to_string());
            if end >= char_len {
                break;
            }
            cursor += self.step();
        }
        chunks
    }

    /// Reads and chunks every document, isolating per-document failures.
    pub fn chunk_documents<R, P>(&self, reader: &R, paths: &[P]) -> DocumentBatch
    where
        R: DocumentReader + ?Sized,
        P: AsRef<Path>,
    {
        let mut batch = DocumentBatch::default();
        for path in paths {
            let path = path.as_ref();
            match reader.read(path) {
                Ok(text) => {
                    let chunks = self.chunk(&text);
                    tracing::debug!(path = %path.display(), chunks = chunks.len(), "chunked document");
                    batch.documents.push(ChunkedDocument {
                        path: path.to_path_buf(),
                        chunks,
                    });
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to read document");
                    batch.failures.push(DocumentFailure {
                        path: path.to_path_buf(),
                        error: err,
                    });
                }
            }
        }
        batch
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// One-shot helper: validates the parameters and chunks `text`.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    Ok(Chunker::new(chunk_size, overlap)?.chunk(text))
}

/// Chunks produced from a single document.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkedDocument {
    /// Source path.
    pub path: PathBuf,
    /// Windows in document order.
    pub chunks: Vec<String>,
}

/// A document that could not be read.
#[derive(Debug)]
pub struct DocumentFailure {
    /// Source path.
    pub path: PathBuf,
    /// Reader failure.
    pub error: DocumentError,
}

/// Outcome of chunking a batch of documents.
#[derive(Debug, Default)]
pub struct DocumentBatch {
    /// Documents that were read and chunked, in input order.
    pub documents: Vec<ChunkedDocument>,
    /// Documents that failed to read, in input order.
    pub failures: Vec<DocumentFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapReader(HashMap<PathBuf, String>);

    impl DocumentReader for MapReader {
        fn read(&self, path: &Path) -> Result<String, DocumentError> {
            self.0.get(path).cloned().ok_or_else(|| DocumentError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            })
        }
    }

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len == 0 {
            0
        } else if len <= overlap {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let chunker = Chunker::new(10, 2).unwrap();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn default_windows_on_1200_chars() {
        let text: String = (0..1200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = Chunker::new(500, 100).unwrap().chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], text[0..500]);
        assert_eq!(chunks[1], text[400..900]);
        assert_eq!(chunks[2], text[800..1200]);
        assert_eq!(chunks[2].len(), 400);
    }

    #[test]
    fn rejects_overlap_not_below_size() {
        assert_eq!(
            Chunker::new(100, 100),
            Err(ChunkError::OverlapTooLarge {
                chunk_size: 100,
                overlap: 100
            })
        );
        assert!(Chunker::new(10, 50).is_err());
        assert_eq!(Chunker::new(0, 0), Err(ChunkError::ZeroChunkSize));
        assert!(chunk("abc", 3, 3).is_err());
    }

    #[test]
    fn chunk_counts_and_coverage_hold_across_sizes() {
        let text: String = "The quick brown fox jumps over the lazy dog. ".repeat(13);
        let chars: Vec<char> = text.chars().collect();
        for (size, overlap) in [(1, 0), (7, 3), (50, 0), (64, 63), (500, 100), (1000, 10)] {
            for len in [1, 2, 63, 64, 65, 200, chars.len()] {
                let sample: String = chars[..len].iter().collect();
                let chunks = chunk(&sample, size, overlap).unwrap();
                assert_eq!(
                    chunks.len(),
                    expected_count(len, size, overlap),
                    "size={size} overlap={overlap} len={len}"
                );

                let step = size - overlap;
                let mut covered = vec![false; len];
                for (idx, piece) in chunks.iter().enumerate() {
                    let start = idx * step;
                    let piece_chars: Vec<char> = piece.chars().collect();
                    assert!(piece_chars.len() <= size);
                    assert_eq!(&piece_chars[..], &chars[start..start + piece_chars.len()]);
                    for slot in &mut covered[start..start + piece_chars.len()] {
                        *slot = true;
                    }
                }
                assert!(covered.iter().all(|c| *c));
            }
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunk(text, 10, 4).unwrap();
        assert_eq!(chunks, vec!["abcdefghij", "ghijklmnop", "mnopqrstuv", "stuvwxyz"]);
        for pair in chunks.windows(2) {
            assert_eq!(&pair[0][6..], &pair[1][..4]);
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "日本語のテキストです";
        let chunks = chunk(text, 4, 1).unwrap();
        assert_eq!(chunks, vec!["日本語の", "のテキス", "ストです"]);
    }

    #[test]
    fn document_batch_isolates_failures() {
        let mut docs = HashMap::new();
        docs.insert(PathBuf::from("a.txt"), "0123456789".to_string());
        docs.insert(PathBuf::from("c.txt"), "abc".to_string());
        let reader = MapReader(docs);
        let chunker = Chunker::new(6, 2).unwrap();

        let batch = chunker.chunk_documents(&reader, &["a.txt", "b.txt", "c.txt"]);

        assert_eq!(batch.documents.len(), 2);
        assert_eq!(batch.documents[0].chunks, vec!["012345", "456789"]);
        assert_eq!(batch.documents[1].path, PathBuf::from("c.txt"));
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].path, PathBuf::from("b.txt"));
    }
}
