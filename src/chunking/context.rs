//! Contextual enrichment pass (spec §4.E, `addContext`).
//!
//! Attaches the nearest preceding heading (markdown `#` or HTML `<hN>`)
//! and a short neighbor preview to each chunk's metadata.

use super::content_type::ContentType;
use super::EmbeddedChunk;
use regex::Regex;
use std::sync::LazyLock;

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap());
static HTML_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h[1-6][^>]*>(.*?)</h[1-6]>").unwrap());

/// Maximum length, in bytes, of the neighbor preview appended to a
/// chunk's surrounding context.
const PREVIEW_LEN: usize = 80;

/// Find the nearest heading at or before byte offset `pos` in `content`.
fn nearest_heading(content: &str, content_type: ContentType, pos: usize) -> Option<String> {
    let haystack = &content[..pos.min(content.len())];
    match content_type {
        ContentType::Html => HTML_HEADING
            .captures_iter(haystack)
            .last()
            .map(|c| c[1].trim().to_string()),
        _ => MARKDOWN_HEADING
            .captures_iter(haystack)
            .last()
            .map(|c| c[2].trim().to_string()),
    }
}

fn preview(text: &str) -> String {
    let mut end = text.len().min(PREVIEW_LEN);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].trim().replace('\n', " ")
}

/// Attach `surrounding_context` to every chunk in `chunks`: the nearest
/// preceding heading in `content` plus a short preview of the next
/// chunk's text, when one exists.
pub fn enrich(content: &str, content_type: ContentType, chunks: &mut [EmbeddedChunk]) {
    let next_previews: Vec<Option<String>> = (0..chunks.len())
        .map(|i| chunks.get(i + 1).map(|c| preview(&c.content)))
        .collect();

    for (i, chunk) in chunks.iter_mut().enumerate() {
        let heading = nearest_heading(content, content_type, chunk.start);
        let next = &next_previews[i];
        let context = match (heading, next) {
            (Some(h), Some(n)) if !n.is_empty() => Some(format!("{h} … {n}")),
            (Some(h), _) => Some(h),
            (None, Some(n)) if !n.is_empty() => Some(n.clone()),
            _ => None,
        };
        chunk.surrounding_context = context;
    }
}
