//! Heuristic extraction of professor profiles from faculty web pages.
//!
//! Every field is extracted independently through an ordered chain of
//! fallbacks. A field that no heuristic can find is left empty; extraction
//! itself never fails.

mod biography;
mod emails;
mod name;
mod publications;
mod sections;
mod text;

use scraper::{Html, Selector};
use url::Url;

use crate::record::ProfessorRecord;

pub use biography::{MAX_BIO_CHARS, MIN_BIO_CHARS, MIN_META_CHARS};
pub use emails::is_email;
pub use publications::MAX_PUBLICATIONS;

/// Heading selectors tried in order when looking for a display name.
const NAME_HEADING_SELECTORS: &[&str] = &[
    "h1",
    "header h1",
    "article h1",
    ".page-title",
    ".title h1",
    ".person-name",
    "h1.person",
    "h1.profile",
    "h1.profname",
    "h2.person-name",
    "h2",
];

/// Pre-compiled selectors shared by the field extractors.
#[derive(Clone)]
pub(crate) struct Selectors {
    schema_person_name: Selector,
    og_title: Selector,
    name_headings: Vec<Selector>,
    title: Selector,
    mailto: Selector,
    section_headings: Selector,
    meta_description: Selector,
    paragraphs: Selector,
    pub_containers: Selector,
    list_items: Selector,
}

impl Selectors {
    pub(crate) fn new() -> Self {
        Self {
            schema_person_name: parse(r#"[itemtype*="schema.org/Person"] [itemprop="name"]"#),
            og_title: parse(r#"meta[property="og:title"]"#),
            name_headings: NAME_HEADING_SELECTORS.iter().map(|s| parse(s)).collect(),
            title: parse("title"),
            mailto: parse(r#"a[href^="mailto:"]"#),
            section_headings: parse("h1, h2, h3, h4, h5, h6, .section-title, .subhead, .heading"),
            meta_description: parse(
                r#"meta[name="description"], meta[property="og:description"]"#,
            ),
            paragraphs: parse("p"),
            pub_containers: parse(
                r#"[id*="pub"], [class*="pub"], [id*="Public"], [class*="Public"]"#,
            ),
            list_items: parse("li"),
        }
    }
}

fn parse(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector")
}

/// Stateless profile extractor; one instance can serve any number of pages.
#[derive(Clone)]
pub struct ProfileExtractor {
    selectors: Selectors,
}

impl ProfileExtractor {
    /// Builds an extractor with its selectors compiled.
    pub fn new() -> Self {
        Self {
            selectors: Selectors::new(),
        }
    }

    /// Extracts a best-effort professor record from one HTML document.
    ///
    /// `base_url` is the final URL the document was served from.
    pub fn extract(&self, html: &str, base_url: &Url) -> ProfessorRecord {
        let document = Html::parse_document(html);
        let record = ProfessorRecord {
            source_url: base_url.to_string(),
            name: self.extract_name(&document),
            emails: self.extract_emails(&document),
            information: self.extract_biography(&document),
            publications: self.extract_publications(&document),
        };
        tracing::debug!(
            url = %base_url,
            name = record.name.as_deref().unwrap_or("-"),
            emails = record.emails.len(),
            has_bio = record.information.is_some(),
            publications = record.publications.len(),
            "extracted profile"
        );
        record
    }

    /// Best-effort display name.
    pub fn extract_name(&self, document: &Html) -> Option<String> {
        name::extract_name(document, &self.selectors)
    }

    /// Addresses found on the page, academic domains first.
    pub fn extract_emails(&self, document: &Html) -> Vec<String> {
        emails::extract_emails(document, &self.selectors)
    }

    /// Normalized biography capped at [`MAX_BIO_CHARS`].
    pub fn extract_biography(&self, document: &Html) -> Option<String> {
        biography::extract_biography(document, &self.selectors)
    }

    /// Up to [`MAX_PUBLICATIONS`] deduplicated publication entries.
    pub fn extract_publications(&self, document: &Html) -> Vec<String> {
        publications::extract_publications(document, &self.selectors)
    }
}

impl Default for ProfileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper around [`ProfileExtractor::extract`].
pub fn extract(html: &str, base_url: &Url) -> ProfessorRecord {
    ProfileExtractor::new().extract(html, base_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_compile() {
        let selectors = Selectors::new();
        assert_eq!(selectors.name_headings.len(), NAME_HEADING_SELECTORS.len());
    }

    #[test]
    fn extracts_every_field_from_one_page() {
        let html = r#"<html><head>
            <title>Jane Doe | Example University</title>
            <meta property="og:title" content="Jane Doe - Computer Science">
            </head><body>
            <h1>Jane Doe</h1>
            <a href="mailto:jdoe@cs.example.edu">jdoe@cs.example.edu</a>
            <h2>Biography</h2>
            <div>
              <p>Jane Doe is a professor of computer science who works on operating systems.</p>
              <p>She received her PhD from Example University in 2010.</p>
            </div>
            <h2>Publications</h2>
            <ul>
              <li>Doe, J. Kernel bypass networking. SOSP 2019.</li>
            </ul>
            </body></html>"#;
        let url = Url::parse("https://www.example.edu/people/jdoe").unwrap();
        let record = extract(html, &url);

        assert_eq!(record.source_url, "https://www.example.edu/people/jdoe");
        assert_eq!(record.name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.emails, vec!["jdoe@cs.example.edu"]);
        assert!(record
            .information
            .as_deref()
            .unwrap()
            .starts_with("Jane Doe is a professor"));
        assert_eq!(
            record.publications,
            vec!["Doe, J. Kernel bypass networking. SOSP 2019."]
        );
    }

    #[test]
    fn empty_document_yields_empty_record() {
        let url = Url::parse("https://example.org/").unwrap();
        let record = extract("", &url);
        assert_eq!(record.name, None);
        assert!(record.emails.is_empty());
        assert_eq!(record.information, None);
        assert!(record.publications.is_empty());
    }
}
