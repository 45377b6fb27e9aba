use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use profmatch::config::FetchArgs;
use profmatch::record::{write_csv, write_jsonl};
use profmatch::{init_tracing, scrape_batch, ProfileExtractor};

#[derive(Parser, Debug)]
#[command(
    name = "profmatch-scrape",
    about = "Scrape faculty profile pages into JSONL and CSV records"
)]
struct ScrapeCli {
    #[command(flatten)]
    fetch: FetchArgs,

    /// JSON Lines output (one record per line)
    #[arg(long, env = "PROFMATCH_JSONL_OUTPUT", default_value = "professors.jsonl")]
    jsonl: PathBuf,

    /// CSV output with list fields joined
    #[arg(long, env = "PROFMATCH_CSV_OUTPUT", default_value = "professors.csv")]
    csv: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = ScrapeCli::parse();

    let urls = cli.fetch.urls()?;
    let fetcher = cli.fetch.build_fetcher()?;
    let report = scrape_batch(&fetcher, &ProfileExtractor::new(), &urls);

    let file = File::create(&cli.jsonl)
        .with_context(|| format!("failed to create JSONL output {:?}", cli.jsonl))?;
    let mut writer = BufWriter::new(file);
    write_jsonl(&mut writer, &report.records)?;
    writer.flush().context("failed to flush JSONL output")?;

    let file = File::create(&cli.csv)
        .with_context(|| format!("failed to create CSV output {:?}", cli.csv))?;
    write_csv(BufWriter::new(file), &report.records)?;

    let written = report.records.len();
    println!(
        "Wrote {} record{} to {} and {}.",
        written,
        if written == 1 { "" } else { "s" },
        cli.jsonl.display(),
        cli.csv.display()
    );
    println!(
        "{} of {} URLs succeeded, {} failed.",
        written,
        report.attempted(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  {failure}");
    }
    Ok(())
}
