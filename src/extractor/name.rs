use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

use super::text::{collapse_whitespace, inline_text};
use super::Selectors;

/// Headings longer than this are page titles, not names.
const MAX_NAME_WORDS: usize = 8;

/// Structured data, then Open Graph, then headings, then `<title>`.
pub(crate) fn extract_name(document: &Html, selectors: &Selectors) -> Option<String> {
    schema_person_name(document, selectors)
        .or_else(|| og_title_name(document, selectors))
        .or_else(|| heading_name(document, selectors))
        .or_else(|| title_name(document, selectors))
}

fn schema_person_name(document: &Html, selectors: &Selectors) -> Option<String> {
    let element = document.select(&selectors.schema_person_name).next()?;
    let name = inline_text(&element);
    (!name.is_empty()).then_some(name)
}

fn og_title_name(document: &Html, selectors: &Selectors) -> Option<String> {
    document
        .select(&selectors.og_title)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .and_then(strip_site_suffix)
}

fn heading_name(document: &Html, selectors: &Selectors) -> Option<String> {
    selectors.name_headings.iter().find_map(|selector| {
        let element = document.select(selector).next()?;
        let candidate = inline_text(&element);
        let words = candidate.split_whitespace().count();
        (!candidate.is_empty() && words <= MAX_NAME_WORDS).then_some(candidate)
    })
}

fn title_name(document: &Html, selectors: &Selectors) -> Option<String> {
    let title = document.select(&selectors.title).next()?;
    let raw: String = title.text().collect();
    strip_site_suffix(&raw)
}

fn title_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[-–|•·]\s+").expect("title separator regex"))
}

/// `"Jane Doe - Computer Science"` becomes `"Jane Doe"`.
pub(crate) fn strip_site_suffix(raw: &str) -> Option<String> {
    let normalized = collapse_whitespace(raw);
    let head = title_separator()
        .split(&normalized)
        .next()
        .unwrap_or_default()
        .trim();
    (!head.is_empty()).then(|| head.to_string())
}
