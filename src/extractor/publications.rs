use std::collections::HashSet;

use scraper::{ElementRef, Html, Node};

use super::sections::{find_section, PUB_HEADINGS};
use super::text::{char_len, collapse_whitespace, descendants_named, element_text};
use super::Selectors;

/// Upper bound on publications kept per record.
pub const MAX_PUBLICATIONS: usize = 50;

/// Entries at or below this length are navigation noise.
const MIN_ITEM_CHARS: usize = 10;
/// Document-wide list items need to be longer to look like citations.
const MIN_LOOSE_ITEM_CHARS: usize = 30;
const CITATION_MARKERS: &[char] = &['.', '—', '-'];

/// Publication heading section, then `pub`-named containers, then any
/// citation-shaped list items.
pub(crate) fn extract_publications(document: &Html, selectors: &Selectors) -> Vec<String> {
    if let Some(section) = find_section(document, selectors, PUB_HEADINGS) {
        let items = list_items(&section);
        if !items.is_empty() {
            return capped(items);
        }
    }

    for container in document.select(&selectors.pub_containers) {
        let items = list_items(&container);
        if !items.is_empty() {
            return capped(items);
        }
    }

    let mut loose: Vec<String> = document
        .select(&selectors.list_items)
        .map(|li| element_text(&li))
        .filter(|text| {
            char_len(text) > MIN_LOOSE_ITEM_CHARS && text.contains(CITATION_MARKERS)
        })
        .collect();
    loose.sort_by_key(|text| std::cmp::Reverse(char_len(text)));
    capped(dedupe(loose))
}

/// `<li>` entries, else `<br>`-separated lines, else `<p>` entries.
fn list_items(container: &ElementRef<'_>) -> Vec<String> {
    let list_elements = descendants_named(container, &["li"]);
    let mut items: Vec<String> = if !list_elements.is_empty() {
        list_elements.iter().map(element_text).collect()
    } else if !descendants_named(container, &["br"]).is_empty() {
        break_separated_lines(container)
    } else {
        Vec::new()
    };
    items.retain(|item| char_len(item) > MIN_ITEM_CHARS);

    if items.is_empty() {
        items = descendants_named(container, &["p"])
            .iter()
            .map(element_text)
            .filter(|item| char_len(item) > MIN_ITEM_CHARS)
            .collect();
    }
    dedupe(items)
}

fn break_separated_lines(container: &ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for node in container.descendants().skip(1) {
        match node.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(el) if el.name() == "br" => {
                lines.push(collapse_whitespace(&current));
                current.clear();
            }
            Node::Element(el) if matches!(el.name(), "p" | "div") => current.push(' '),
            _ => {}
        }
    }
    lines.push(collapse_whitespace(&current));
    lines
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn capped(mut items: Vec<String>) -> Vec<String> {
    items.truncate(MAX_PUBLICATIONS);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubs_of(html: &str) -> Vec<String> {
        extract_publications(&Html::parse_document(html), &Selectors::new())
    }

    #[test]
    fn reads_list_under_publications_heading() {
        let html = r#"<html><body><section>
            <h2>Selected Publications</h2>
            <ul>
              <li>Doe, J. Scalable consensus. OSDI 2021.</li>
              <li>Home</li>
              <li>Doe, J. Scalable consensus. OSDI 2021.</li>
              <li>Doe, J. and Roe, R. Learned indexes. VLDB 2019.</li>
            </ul>
            </section></body></html>"#;
        assert_eq!(
            pubs_of(html),
            vec![
                "Doe, J. Scalable consensus. OSDI 2021.",
                "Doe, J. and Roe, R. Learned indexes. VLDB 2019."
            ]
        );
    }

    #[test]
    fn splits_on_line_breaks_without_list_items() {
        let html = r#"<html><body>
            <h3>Papers</h3>
            <div>First paper title, 2020.<br>Second paper title, 2021.<br/>tiny<br></div>
            </body></html>"#;
        assert_eq!(
            pubs_of(html),
            vec!["First paper title, 2020.", "Second paper title, 2021."]
        );
    }

    #[test]
    fn falls_back_to_paragraphs() {
        let html = r#"<html><body>
            <h3>Books</h3>
            <div><p>Introduction to Algorithms, 3rd ed.</p><p>Short</p></div>
            </body></html>"#;
        assert_eq!(pubs_of(html), vec!["Introduction to Algorithms, 3rd ed."]);
    }

    #[test]
    fn uses_pub_named_containers() {
        let html = r#"<html><body>
            <div id="recent-pubs"><ol><li>A study of caching, 2018.</li></ol></div>
            </body></html>"#;
        assert_eq!(pubs_of(html), vec!["A study of caching, 2018."]);
    }

    #[test]
    fn loose_list_items_sorted_by_length() {
        let html = r#"<html><body><ul>
            <li>Contact</li>
            <li>Short citation - Journal of Things 2001</li>
            <li>A considerably longer citation. Proceedings of Stuff 2005</li>
            <li>No citation markers in this fairly long list entry</li>
            </ul></body></html>"#;
        assert_eq!(
            pubs_of(html),
            vec![
                "A considerably longer citation. Proceedings of Stuff 2005",
                "Short citation - Journal of Things 2001"
            ]
        );
    }

    #[test]
    fn caps_at_fifty_entries() {
        let mut html = String::from("<html><body><h2>Publications</h2><ul>");
        for i in 0..80 {
            html.push_str(&format!("<li>Paper number {i} in the list.</li>"));
        }
        html.push_str("</ul></body></html>");
        let pubs = pubs_of(&html);
        assert_eq!(pubs.len(), MAX_PUBLICATIONS);
        assert_eq!(pubs[0], "Paper number 0 in the list.");
    }

    #[test]
    fn empty_when_nothing_looks_like_a_publication() {
        assert!(pubs_of("<html><body><p>Hello</p></body></html>").is_empty());
    }
}
