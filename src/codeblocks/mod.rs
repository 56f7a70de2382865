//! Code-block extraction and language normalization (spec §4.H).
//!
//! Markdown fences are walked with `pulldown-cmark`'s event stream; HTML
//! `<pre><code>` elements (including tabbed variants sharing one logical
//! block) are walked with `scraper`. Both extractors return
//! [`ExtractedBlock`]s grouped by `block_id`; deduplication and
//! unknown-language supersession happen once, in [`dedupe`], shared by
//! both source formats.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One extracted code block before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedBlock {
    /// Groups language variants of the same logical block.
    pub block_id: String,
    /// Normalized language tag, or `"unknown"`.
    pub language: String,
    /// Raw code text.
    pub content: String,
}

/// Canonicalize a fence info-string / HTML language attribute into the
/// tag this crate persists (spec §4.H: `js -> javascript`, etc.).
pub fn normalize_language(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    let trimmed = trimmed.split_whitespace().next().unwrap_or("");
    match trimmed {
        "" => "unknown",
        "js" | "jsx" | "javascript" => "javascript",
        "ts" | "tsx" | "typescript" => "typescript",
        "py" | "py3" | "python" => "python",
        "rs" | "rust" => "rust",
        "rb" | "ruby" => "ruby",
        "sh" | "bash" | "shell" | "zsh" => "bash",
        "yml" | "yaml" => "yaml",
        "md" | "markdown" => "markdown",
        "c++" | "cpp" | "cc" => "cpp",
        "cs" | "csharp" => "csharp",
        "golang" | "go" => "go",
        "html" | "htm" => "html",
        "json" | "jsonc" => "json",
        other => other,
    }
    .to_string()
}

/// Extract fenced code blocks from markdown, one `block_id` per fence in
/// document order.
pub fn extract_markdown(content: &str) -> Vec<ExtractedBlock> {
    let parser = Parser::new(content);
    let mut blocks = Vec::new();
    let mut in_fence = false;
    let mut lang = String::new();
    let mut buf = String::new();
    let mut index = 0usize;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                in_fence = true;
                lang = normalize_language(&info);
                buf.clear();
            }
            Event::Text(text) if in_fence => {
                buf.push_str(&text);
            }
            Event::End(TagEnd::CodeBlock) if in_fence => {
                in_fence = false;
                blocks.push(ExtractedBlock {
                    block_id: format!("md_block_{index}"),
                    language: std::mem::take(&mut lang),
                    content: std::mem::take(&mut buf),
                });
                index += 1;
            }
            _ => {}
        }
    }
    blocks
}

/// Extract `<pre><code>` blocks from HTML. Sibling blocks under a shared
/// tab container (`role="tablist"` or a class token prefixed `tab`) are
/// grouped under one `block_id`; ungrouped blocks each get their own.
pub fn extract_html(content: &str) -> Vec<ExtractedBlock> {
    let document = Html::parse_document(content);
    let tab_container = Selector::parse("[role=tablist], [class*=tab]").unwrap();
    let pre_code = Selector::parse("pre code").unwrap();

    let mut grouped_ids: HashMap<ego_tree::NodeId, String> = HashMap::new();
    for (i, container) in document.select(&tab_container).enumerate() {
        grouped_ids.insert(container.id(), format!("html_tab_block_{i}"));
    }

    let mut blocks = Vec::new();
    for (index, el) in document.select(&pre_code).enumerate() {
        let language = el
            .value()
            .classes()
            .find_map(|c| c.strip_prefix("language-").map(normalize_language))
            .or_else(|| el.value().attr("data-lang").map(normalize_language))
            .or_else(|| el.value().attr("data-language").map(normalize_language))
            .unwrap_or_else(|| "unknown".to_string());

        let block_id = el
            .ancestors()
            .find_map(|a| grouped_ids.get(&a.id()).cloned())
            .unwrap_or_else(|| format!("html_block_{index}"));

        blocks.push(ExtractedBlock {
            block_id,
            language,
            content: el.text().collect::<String>(),
        });
    }
    blocks
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deduplicate per (content, language), and let a known-language variant
/// supersede an `unknown`-language variant with an equal content hash
/// (spec §4.H).
pub fn dedupe(blocks: Vec<ExtractedBlock>) -> Vec<ExtractedBlock> {
    let mut by_hash_and_lang: HashMap<(String, String), ExtractedBlock> = HashMap::new();
    let mut order: Vec<(String, String)> = Vec::new();

    for block in blocks {
        let hash = content_hash(&block.content);
        let key = (hash.clone(), block.language.clone());
        if by_hash_and_lang.contains_key(&key) {
            continue;
        }
        // Supersede an existing unknown-language variant with the same hash.
        if block.language != "unknown" {
            let unknown_key = (hash.clone(), "unknown".to_string());
            if by_hash_and_lang.remove(&unknown_key).is_some() {
                order.retain(|k| k != &unknown_key);
            }
        } else {
            let has_known = order.iter().any(|(h, l)| h == &hash && l != "unknown");
            if has_known {
                continue;
            }
        }
        order.push(key.clone());
        by_hash_and_lang.insert(key, block);
    }

    order.into_iter().filter_map(|k| by_hash_and_lang.remove(&k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_language_aliases() {
        assert_eq!(normalize_language("js"), "javascript");
        assert_eq!(normalize_language("PY"), "python");
        assert_eq!(normalize_language(""), "unknown");
    }

    #[test]
    fn extracts_two_fenced_blocks_with_distinct_languages() {
        let md = "# Title\n\n```python\nprint('hi')\n```\n\nsome text\n\n```js\nconsole.log('hi')\n```\n";
        let blocks = extract_markdown(md);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language, "python");
        assert_eq!(blocks[1].language, "javascript");
        assert_ne!(blocks[0].block_id, blocks[1].block_id);
    }

    #[test]
    fn extracts_html_pre_code_with_language_class() {
        let html = r#"<html><body><pre><code class="language-rust">fn main() {}</code></pre></body></html>"#;
        let blocks = extract_html(html);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "rust");
    }

    #[test]
    fn groups_tabbed_variants_under_one_block_id() {
        let html = r#"<div role="tablist">
            <pre><code class="language-python">print(1)</code></pre>
            <pre><code class="language-javascript">console.log(1)</code></pre>
        </div>"#;
        let blocks = extract_html(html);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_id, blocks[1].block_id);
    }

    #[test]
    fn dedupe_suppresses_identical_content_and_language() {
        let blocks = vec![
            ExtractedBlock { block_id: "a".into(), language: "python".into(), content: "x=1".into() },
            ExtractedBlock { block_id: "b".into(), language: "python".into(), content: "x=1".into() },
        ];
        assert_eq!(dedupe(blocks).len(), 1);
    }

    #[test]
    fn known_language_variant_supersedes_unknown() {
        let blocks = vec![
            ExtractedBlock { block_id: "a".into(), language: "unknown".into(), content: "x=1".into() },
            ExtractedBlock { block_id: "b".into(), language: "python".into(), content: "x=1".into() },
        ];
        let result = dedupe(blocks);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].language, "python");
    }
}
