//! Whitespace and truncation helpers shared by the field extractors.

use scraper::{ElementRef, Node};

/// Tags whose text never counts as visible page content.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Collapses every whitespace run to a single space and trims the ends.
pub(crate) fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    if buf.ends_with(' ') {
        buf.pop();
    }
    buf
}

/// Normalized text of an element, text nodes joined by spaces.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    for piece in element.text() {
        raw.push_str(piece);
        raw.push(' ');
    }
    collapse_whitespace(&raw)
}

/// Normalized text of an element with text nodes concatenated as-is, so
/// inline markup like `<small>, PhD</small>` does not gain a leading space.
pub(crate) fn inline_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Text of an element with all whitespace removed from each text node before
/// joining, used for "is this sibling substantial" checks.
pub(crate) fn stripped_text_len(element: &ElementRef<'_>) -> usize {
    element.text().map(|piece| piece.trim().chars().count()).sum()
}

/// Normalized text of every visible text node under `root`.
pub(crate) fn visible_text(root: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| HIDDEN_TAGS.contains(&el.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        raw.push_str(text);
        raw.push(' ');
    }
    collapse_whitespace(&raw)
}

/// Descendant elements (excluding `root` itself) with one of the given tags.
pub(crate) fn descendants_named<'a>(root: &ElementRef<'a>, tags: &[&str]) -> Vec<ElementRef<'a>> {
    root.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| tags.contains(&el.value().name()))
        .collect()
}

/// Character count, matching how lengths are compared everywhere.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Joins the text of `nodes`, normalizes it, and caps it at `max_chars`.
///
/// Over-long text is cut after the last `.` that fits inside the budget, or
/// hard-cut at the budget when no period exists.
pub(crate) fn joined_text(nodes: &[ElementRef<'_>], max_chars: usize) -> String {
    let pieces: Vec<String> = nodes
        .iter()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();
    truncate_on_sentence(&pieces.join(" "), max_chars)
}

/// Caps `text` at `max_chars` characters, preferring a sentence boundary.
pub(crate) fn truncate_on_sentence(text: &str, max_chars: usize) -> String {
    let text = collapse_whitespace(text);
    if char_len(&text) <= max_chars {
        return text;
    }
    let limit = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let head = &text[..limit];
    let cut = match head.rfind('.') {
        Some(idx) => &head[..=idx],
        None => head,
    };
    cut.trim().to_string()
}
