use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

use super::text::visible_text;
use super::Selectors;

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}";

/// Domain suffixes of universities that get top billing.
const ACADEMIC_SUFFIXES: &[&str] = &[
    ".edu", ".ac.uk", ".ac.in", ".ac.jp", ".ac.cn", ".ac.nz", ".ac.za", ".ac.au",
];

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email regex"))
}

fn exact_email_regex() -> &'static Regex {
    static EXACT: OnceLock<Regex> = OnceLock::new();
    EXACT.get_or_init(|| Regex::new(&format!("^{EMAIL_PATTERN}$")).expect("exact email regex"))
}

/// Whether `candidate` is a single well-formed address.
pub fn is_email(candidate: &str) -> bool {
    exact_email_regex().is_match(candidate)
}

/// Collects `mailto:` targets and addresses mentioned in the visible text,
/// academic domains first.
pub(crate) fn extract_emails(document: &Html, selectors: &Selectors) -> Vec<String> {
    let mut found = BTreeSet::new();

    for anchor in document.select(&selectors.mailto) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let target = href.trim_start_matches("mailto:");
        let address = target.split('?').next().unwrap_or_default().trim();
        if is_email(address) {
            found.insert(address.to_string());
        }
    }

    let text = visible_text(&document.root_element());
    for hit in email_regex().find_iter(&text) {
        found.insert(hit.as_str().to_string());
    }

    let mut emails: Vec<String> = found.into_iter().collect();
    emails.sort_by_cached_key(|email| (domain_priority(email), email.clone()));
    emails
}

/// 0 for known academic suffixes, 1 for any other `.ac.` domain, 2 otherwise.
fn domain_priority(email: &str) -> u8 {
    let domain = email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .unwrap_or(email)
        .to_ascii_lowercase();
    if ACADEMIC_SUFFIXES
        .iter()
        .any(|suffix| domain.ends_with(suffix))
    {
        0
    } else if domain.contains(".ac.") {
        1
    } else {
        2
    }
}
