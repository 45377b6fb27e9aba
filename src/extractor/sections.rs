use scraper::{ElementRef, Html};

use super::text::{element_text, stripped_text_len};
use super::Selectors;

/// Siblings with less stripped text than this are treated as decoration.
const MIN_SIBLING_CHARS: usize = 20;

pub(crate) const BIO_HEADINGS: &[&str] = &[
    "biography",
    "bio",
    "about",
    "profile",
    "overview",
    "research summary",
];

pub(crate) const PUB_HEADINGS: &[&str] = &[
    "publications",
    "selected publications",
    "recent publications",
    "papers",
    "articles",
    "books",
];

/// Finds the content container belonging to the first heading whose text
/// mentions one of `keywords`.
///
/// The heading's next sibling element wins when it carries real text,
/// otherwise the heading's parent element is used.
pub(crate) fn find_section<'a>(
    document: &'a Html,
    selectors: &Selectors,
    keywords: &[&str],
) -> Option<ElementRef<'a>> {
    let heading = document.select(&selectors.section_headings).find(|heading| {
        let text = element_text(heading).to_lowercase();
        keywords.iter().any(|keyword| text.contains(keyword))
    })?;

    let sibling = heading.next_siblings().find_map(ElementRef::wrap);
    if let Some(sibling) = sibling {
        if stripped_text_len(&sibling) > MIN_SIBLING_CHARS {
            return Some(sibling);
        }
    }
    Some(
        heading
            .parent()
            .and_then(ElementRef::wrap)
            .unwrap_or(heading),
    )
}
