//! Mixed-content sectioning (spec §4.E): fenced code and prose are
//! chunked independently within a document, then reassembled with a
//! running global offset.

use super::content_type::ContentType;
use regex::Regex;
use std::sync::LazyLock;

/// One section of a mixed-content document.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Start byte offset into the parent document.
    pub start: usize,
    /// End byte offset into the parent document.
    pub end: usize,
    /// The strategy this section should be chunked with.
    pub content_type: ContentType,
    /// Fence info-string language, for `Code` sections.
    pub language_hint: Option<String>,
}

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([A-Za-z0-9_+-]*)\n(.*?)```\n?").unwrap());

/// Split `text` into alternating fenced-code and prose sections,
/// covering the whole document contiguously.
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut cursor = 0usize;

    for m in FENCE.find_iter(text) {
        if m.start() > cursor {
            sections.push(Section {
                start: cursor,
                end: m.start(),
                content_type: ContentType::Text,
                language_hint: None,
            });
        }
        let caps = FENCE.captures(&text[m.start()..m.end()]).unwrap();
        let lang = caps.get(1).map(|g| g.as_str().to_string()).filter(|s| !s.is_empty());
        sections.push(Section {
            start: m.start(),
            end: m.end(),
            content_type: ContentType::Code,
            language_hint: lang,
        });
        cursor = m.end();
    }
    if cursor < text.len() {
        sections.push(Section {
            start: cursor,
            end: text.len(),
            content_type: ContentType::Text,
            language_hint: None,
        });
    }
    if sections.is_empty() {
        sections.push(Section {
            start: 0,
            end: text.len(),
            content_type: ContentType::Text,
            language_hint: None,
        });
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_prose_and_code_sections() {
        let text = "Intro text.\n\n```python\nprint('hi')\n```\n\nOutro text.";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].content_type, ContentType::Text);
        assert_eq!(sections[1].content_type, ContentType::Code);
        assert_eq!(sections[1].language_hint.as_deref(), Some("python"));
        assert_eq!(sections[2].content_type, ContentType::Text);
        // contiguous coverage
        assert_eq!(sections[0].start, 0);
        assert_eq!(sections.last().unwrap().end, text.len());
        for w in sections.windows(2) {
            assert_eq!(w[0].end, w[1].start);
        }
    }

    #[test]
    fn no_fences_yields_single_text_section() {
        let text = "just prose, nothing fenced here";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content_type, ContentType::Text);
    }
}
