use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use profmatch::config::ChunkArgs;
use profmatch::{init_tracing, FileDocumentReader};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "profmatch-chunk",
    about = "Split text and PDF documents into overlapping chunks (JSONL)"
)]
struct ChunkCli {
    /// Documents to chunk (.pdf files are text-extracted)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[command(flatten)]
    chunk: ChunkArgs,

    /// Output file (defaults to stdout)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ChunkLine<'a> {
    document: &'a Path,
    chunk_index: usize,
    text: &'a str,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = ChunkCli::parse();
    let chunker = cli.chunk.build()?;

    let batch = chunker.chunk_documents(&FileDocumentReader, &cli.paths);

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create output {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut total = 0usize;
    for document in &batch.documents {
        for (chunk_index, text) in document.chunks.iter().enumerate() {
            let line = ChunkLine {
                document: &document.path,
                chunk_index,
                text,
            };
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
            total += 1;
        }
    }
    out.flush().context("failed to flush chunk output")?;

    eprintln!(
        "Chunked {} of {} documents into {} chunks.",
        batch.documents.len(),
        cli.paths.len(),
        total
    );
    for failure in &batch.failures {
        eprintln!("  {}", failure.error);
    }
    Ok(())
}
