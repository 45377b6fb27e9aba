use scraper::{ElementRef, Html};

use super::sections::{find_section, BIO_HEADINGS};
use super::text::{
    char_len, descendants_named, element_text, inline_text, joined_text, truncate_on_sentence,
};
use super::Selectors;

/// Character budget for the biography field.
pub const MAX_BIO_CHARS: usize = 1500;
/// Shorter section or paragraph-block text is discarded.
pub const MIN_BIO_CHARS: usize = 80;
/// Shorter meta descriptions are discarded.
pub const MIN_META_CHARS: usize = 60;

const SECTION_PARAGRAPHS: usize = 6;
const BLOCK_PARAGRAPHS: usize = 8;
/// Paragraphs shorter than this split paragraph blocks.
const MIN_BLOCK_PARAGRAPH_CHARS: usize = 30;

/// Heading section, then meta description, then the densest paragraph block.
pub(crate) fn extract_biography(document: &Html, selectors: &Selectors) -> Option<String> {
    section_biography(document, selectors)
        .or_else(|| meta_biography(document, selectors))
        .or_else(|| paragraph_block_biography(document, selectors))
}

fn section_biography(document: &Html, selectors: &Selectors) -> Option<String> {
    let section = find_section(document, selectors, BIO_HEADINGS)?;
    let paragraphs = descendants_named(&section, &["p"]);
    if !paragraphs.is_empty() {
        let limit = paragraphs.len().min(SECTION_PARAGRAPHS);
        let text = joined_text(&paragraphs[..limit], MAX_BIO_CHARS);
        if char_len(&text) >= MIN_BIO_CHARS {
            return Some(text);
        }
    }
    let text = truncate_on_sentence(&element_text(&section), MAX_BIO_CHARS);
    (char_len(&text) >= MIN_BIO_CHARS).then_some(text)
}

fn meta_biography(document: &Html, selectors: &Selectors) -> Option<String> {
    let content = document
        .select(&selectors.meta_description)
        .next()?
        .value()
        .attr("content")?;
    let text = truncate_on_sentence(content, MAX_BIO_CHARS);
    (char_len(&text) >= MIN_META_CHARS).then_some(text)
}

fn paragraph_block_biography(document: &Html, selectors: &Selectors) -> Option<String> {
    let mut blocks: Vec<(usize, Vec<ElementRef<'_>>)> = Vec::new();
    let mut current: Vec<ElementRef<'_>> = Vec::new();
    let mut current_len = 0usize;

    for paragraph in document.select(&selectors.paragraphs) {
        let len = char_len(&inline_text(&paragraph));
        if len < MIN_BLOCK_PARAGRAPH_CHARS {
            if !current.is_empty() {
                blocks.push((current_len, std::mem::take(&mut current)));
                current_len = 0;
            }
            continue;
        }
        current.push(paragraph);
        current_len += len;
    }
    if !current.is_empty() {
        blocks.push((current_len, current));
    }

    // First block wins ties.
    let mut best: Option<&(usize, Vec<ElementRef<'_>>)> = None;
    for block in &blocks {
        if best.map(|(len, _)| block.0 > *len).unwrap_or(true) {
            best = Some(block);
        }
    }
    let (_, paragraphs) = best?;
    let limit = paragraphs.len().min(BLOCK_PARAGRAPHS);
    let text = joined_text(&paragraphs[..limit], MAX_BIO_CHARS);
    (char_len(&text) >= MIN_BIO_CHARS).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bio_of(html: &str) -> Option<String> {
        extract_biography(&Html::parse_document(html), &Selectors::new())
    }

    fn words(count: usize, word: &str) -> String {
        // "word " repeated, trimmed, gives count * (len + 1) - 1 characters.
        vec![word; count].join(" ")
    }

    #[test]
    fn picks_densest_paragraph_block() {
        // Lengths 10, 200, 180, 5, 90 with 10 and 5 acting as separators.
        let p10 = "a".repeat(10);
        let p200 = "b".repeat(200);
        let p180 = "c".repeat(180);
        let p5 = "d".repeat(5);
        let p90 = "e".repeat(90);
        let html = format!(
            "<html><body><p>{p10}</p><p>{p200}</p><p>{p180}</p><p>{p5}</p><p>{p90}</p></body></html>"
        );
        let bio = bio_of(&html).unwrap();
        assert_eq!(bio, format!("{p200} {p180}"));
    }

    #[test]
    fn inline_markup_does_not_inflate_paragraph_length() {
        // Fourteen two-letter <b> runs are 28 characters, below the block threshold.
        let separator = "<b>ab</b>".repeat(14);
        let p200 = "b".repeat(200);
        let p180 = "c".repeat(180);
        let html = format!(
            "<html><body><p>{p200}</p><p>{separator}</p><p>{p180}</p></body></html>"
        );
        assert_eq!(bio_of(&html).unwrap(), p200);
    }

    #[test]
    fn heading_section_is_preferred() {
        let body = words(20, "research");
        let html = format!(
            r#"<html><head><meta name="description" content="{meta}"></head><body>
            <h2>About</h2>
            <div><p>{body}</p><p>Second paragraph of the biography.</p></div>
            </body></html>"#,
            meta = words(20, "meta")
        );
        let bio = bio_of(&html).unwrap();
        assert!(bio.starts_with("research research"));
        assert!(bio.ends_with("Second paragraph of the biography."));
    }

    #[test]
    fn section_without_paragraphs_uses_container_text() {
        let html = format!(
            "<html><body><section><h3>Biography</h3><span>x</span>{}</section></body></html>",
            words(20, "systems")
        );
        let bio = bio_of(&html).unwrap();
        assert!(bio.starts_with("Biography x systems"));
    }

    #[test]
    fn meta_description_is_second_choice() {
        let meta = words(12, "robotics");
        let html = format!(
            r#"<html><head><meta property="og:description" content="  {meta}  "></head>
            <body><p>short</p></body></html>"#
        );
        assert_eq!(bio_of(&html), Some(meta));
    }

    #[test]
    fn short_meta_description_is_rejected() {
        let html = r#"<html><head><meta name="description" content="Faculty page"></head>
            <body><p>tiny</p></body></html>"#;
        assert_eq!(bio_of(html), None);
    }

    #[test]
    fn long_biography_is_truncated_on_sentence() {
        let sentence = "Professor Doe studies large scale machine learning systems. ";
        let body = sentence.repeat(40);
        let html = format!("<html><body><h2>Bio</h2><div><p>{body}</p></div></body></html>");
        let bio = bio_of(&html).unwrap();
        assert!(char_len(&bio) <= MAX_BIO_CHARS);
        assert!(bio.ends_with("systems."));
    }
}
