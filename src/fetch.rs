//! Blocking page fetching and sequential batch scraping.

use std::io::BufRead;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use reqwest::blocking::Client;
use thiserror::Error;
use url::Url;

use crate::extractor::ProfileExtractor;
use crate::record::ProfessorRecord;

/// User agent sent with every profile request.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; FacultyProfileScraper/1.0; +https://example.org/bot)";
/// Connect plus read budget for a single page.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_REDIRECTS: usize = 10;

/// A single URL could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The string is not an absolute URL.
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        /// Offending input.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// Connection, timeout, or body read failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Client error.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
}

impl FetchError {
    /// The URL the failure belongs to.
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. } | Self::Transport { url, .. } | Self::Status { url, .. } => {
                url
            }
        }
    }
}

/// Decoded body of a successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// When the body finished downloading.
    pub fetched_at: SystemTime,
    /// Response body.
    pub body: String,
}

/// Source of profile pages.
pub trait PageFetcher {
    /// Fetches one page; non-success statuses are errors.
    fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// `reqwest` blocking client with a fixed timeout and redirect limit.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher that gives up on any request after `timeout`.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = client_builder(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

fn client_builder(timeout: Duration) -> reqwest::blocking::ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .connect_timeout(timeout)
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(parsed).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let final_url = response.url().clone();
        let body = response.text().map_err(transport)?;
        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            fetched_at: SystemTime::now(),
            body,
        })
    }
}

/// Records and failures of a batch, both in input order.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Successfully extracted records.
    pub records: Vec<ProfessorRecord>,
    /// URLs that could not be fetched.
    pub failures: Vec<FetchError>,
}

impl ScrapeReport {
    /// Number of URLs attempted.
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Fetches and extracts one profile page.
pub fn scrape<F>(
    fetcher: &F,
    extractor: &ProfileExtractor,
    url: &str,
) -> Result<ProfessorRecord, FetchError>
where
    F: PageFetcher + ?Sized,
{
    let page = fetcher.fetch(url)?;
    Ok(extractor.extract(&page.body, &page.url))
}

/// Scrapes every URL in order; a failed URL is recorded and skipped.
pub fn scrape_batch<F, S>(fetcher: &F, extractor: &ProfileExtractor, urls: &[S]) -> ScrapeReport
where
    F: PageFetcher + ?Sized,
    S: AsRef<str>,
{
    let mut report = ScrapeReport::default();
    for (idx, url) in urls.iter().enumerate() {
        let url = url.as_ref();
        match scrape(fetcher, extractor, url) {
            Ok(record) => {
                tracing::info!(url, progress = idx + 1, total = urls.len(), "ok");
                report.records.push(record);
            }
            Err(err) => {
                tracing::warn!(url, progress = idx + 1, total = urls.len(), error = %err, "error");
                report.failures.push(err);
            }
        }
    }
    report
}

/// Reads one URL per line, ignoring blank lines and `#` comments.
pub fn read_url_list<R: BufRead>(reader: R) -> anyhow::Result<Vec<String>> {
    let mut urls = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read URL list line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        urls.push(trimmed.to_string());
    }
    Ok(urls)
}
