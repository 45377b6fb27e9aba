use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use profmatch::config::{ChunkArgs, EmbedderArgs, FetchArgs, StoreArgs};
use profmatch::record::read_jsonl;
use profmatch::{
    init_tracing, scrape_batch, upload_records, Embedder, ProfileExtractor, UploadOptions,
};

#[derive(Parser, Debug)]
#[command(
    name = "profmatch-upload",
    about = "Scrape or load professor records, embed them and store them in pgvector"
)]
struct UploadCli {
    #[command(flatten)]
    fetch: FetchArgs,

    /// Load records from a profmatch-scrape JSONL file instead of fetching URLs
    #[arg(long, env = "PROFMATCH_RECORDS")]
    records: Option<PathBuf>,

    #[command(flatten)]
    chunk: ChunkArgs,

    /// Embed each profile as a single vector instead of chunking it
    #[arg(long, env = "PROFMATCH_NO_CHUNK", default_value_t = false)]
    no_chunk: bool,

    /// Leave professors whose email is already stored untouched
    #[arg(long, env = "PROFMATCH_SKIP_EXISTING", default_value_t = false)]
    skip_existing: bool,

    /// Create the vector extension and tables automatically if missing
    #[arg(long, env = "PROFMATCH_PREPARE", default_value_t = true, action = ArgAction::Set)]
    prepare: bool,

    #[command(flatten)]
    embedder: EmbedderArgs,

    #[command(flatten)]
    store: StoreArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = UploadCli::parse();

    let chunker = if cli.no_chunk {
        None
    } else {
        Some(cli.chunk.build()?)
    };

    let (records, scrape_failures) = match &cli.records {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open records file {:?}", path))?;
            (read_jsonl(BufReader::new(file))?, 0)
        }
        None => {
            let urls = cli.fetch.urls()?;
            let fetcher = cli.fetch.build_fetcher()?;
            let report = scrape_batch(&fetcher, &ProfileExtractor::new(), &urls);
            let failed = report.failures.len();
            (report.records, failed)
        }
    };
    if records.is_empty() {
        println!("No professor records to upload; nothing to do.");
        return Ok(());
    }

    let embedder = cli.embedder.build()?;
    let mut store = cli.store.connect()?;
    if cli.prepare {
        let dims = embedder
            .embed("dimension probe")
            .context("failed to probe embedding dimension")?
            .len();
        store.ensure_schema(dims)?;
    }

    let options = UploadOptions {
        chunker,
        skip_existing: cli.skip_existing,
    };
    let report = upload_records(&records, &*embedder, &mut store, &options);

    println!(
        "Uploaded {}, skipped {}, failed {} of {} records into {}.",
        report.uploaded,
        report.skipped,
        report.failures.len(),
        records.len(),
        store.tables().professors.qualified()
    );
    if scrape_failures > 0 {
        println!("{scrape_failures} URL(s) could not be scraped.");
    }
    for (url, err) in &report.failures {
        println!("  {url}: {err}");
    }
    Ok(())
}
