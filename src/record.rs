//! Professor records plus their JSONL / CSV persistence and text rendering.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Placeholder used when a field could not be extracted.
pub const MISSING: &str = "N/A";
/// Separator for the email list in summaries and CSV rows.
pub const EMAIL_SEPARATOR: &str = "; ";
/// Separator for the publication list in CSV rows.
pub const PUBLICATION_SEPARATOR: &str = " || ";

/// Structured result of scraping one faculty profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorRecord {
    /// Final URL after redirects.
    pub source_url: String,
    /// Display name, when one could be found.
    pub name: Option<String>,
    /// Deduplicated addresses, academic domains first.
    pub emails: Vec<String>,
    /// Normalized biography text.
    pub information: Option<String>,
    /// Deduplicated publication entries.
    pub publications: Vec<String>,
}

impl ProfessorRecord {
    /// Highest-ranked address; used as the professor's identity downstream.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// Presentation form used for embedding and storage.
    pub fn summarize(&self) -> ProfileSummary {
        let name = self.name.clone().unwrap_or_else(|| MISSING.to_string());
        let emails = if self.emails.is_empty() {
            MISSING.to_string()
        } else {
            self.emails.join(EMAIL_SEPARATOR)
        };

        let mut body = String::new();
        body.push_str(self.information.as_deref().unwrap_or(MISSING));
        body.push_str("\n\n");
        if self.publications.is_empty() {
            body.push_str(MISSING);
        } else {
            let lines: Vec<String> = self
                .publications
                .iter()
                .map(|publication| format!("- {publication}"))
                .collect();
            body.push_str(&lines.join("\n"));
        }

        ProfileSummary { name, emails, body }
    }

    fn csv_row(&self) -> CsvRow<'_> {
        CsvRow {
            source_url: &self.source_url,
            name: self.name.as_deref().unwrap_or_default(),
            emails: self.emails.join(EMAIL_SEPARATOR),
            information: self.information.as_deref().unwrap_or_default(),
            publications: self.publications.join(PUBLICATION_SEPARATOR),
        }
    }
}

/// Name, joined emails and markdown body of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    /// Name or [`MISSING`].
    pub name: String,
    /// Emails joined by [`EMAIL_SEPARATOR`], or [`MISSING`].
    pub emails: String,
    /// Biography followed by a bulleted publication list.
    pub body: String,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    source_url: &'a str,
    name: &'a str,
    emails: String,
    information: &'a str,
    publications: String,
}

/// Writes one JSON object per record.
pub fn write_jsonl<W: Write>(writer: &mut W, records: &[ProfessorRecord]) -> Result<usize> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(records.len())
}

/// Reads records written by [`write_jsonl`], skipping blank lines.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<ProfessorRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ProfessorRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid professor record at line {}", line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Writes a header plus one flat row per record; list fields are joined.
pub fn write_csv<W: Write>(writer: W, records: &[ProfessorRecord]) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv.write_record(["source_url", "name", "emails", "information", "publications"])?;
    }
    for record in records {
        csv.serialize(record.csv_row())?;
    }
    csv.flush().context("failed to flush CSV output")?;
    Ok(records.len())
}
