//! Vote-based content-type detection (spec §4.E).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// The content classes the chunker picks a splitting strategy for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Source code in some programming language.
    Code,
    /// Markdown prose.
    Markdown,
    /// HTML markup.
    Html,
    /// A blend of fenced/embedded code and prose that doesn't cleanly
    /// classify as one of the above.
    Mixed,
    /// Plain prose with no structural markup.
    Text,
    /// Text already extracted from a PDF by the (external) extractor.
    Pdf,
}

struct Voter {
    pattern: Regex,
    class: ContentType,
}

static VOTERS: LazyLock<Vec<Voter>> = LazyLock::new(|| {
    vec![
        Voter {
            pattern: Regex::new(r"(?m)^\s*(fn |def |function |class |impl |import |use |#include|public (class|static)|package )").unwrap(),
            class: ContentType::Code,
        },
        Voter {
            pattern: Regex::new(r"[{};]\s*$").unwrap(),
            class: ContentType::Code,
        },
        Voter {
            pattern: Regex::new(r"```").unwrap(),
            class: ContentType::Code,
        },
        Voter {
            pattern: Regex::new(r"(?m)^#{1,6} ").unwrap(),
            class: ContentType::Markdown,
        },
        Voter {
            pattern: Regex::new(r"(?m)^[-*+] |^\d+\. ").unwrap(),
            class: ContentType::Markdown,
        },
        Voter {
            pattern: Regex::new(r"\[[^\]]+\]\([^)]+\)").unwrap(),
            class: ContentType::Markdown,
        },
        Voter {
            pattern: Regex::new(r"(?i)<html|<body|<div|<span|<p>|</p>").unwrap(),
            class: ContentType::Html,
        },
        Voter {
            pattern: Regex::new(r"<[a-zA-Z][^>]*>").unwrap(),
            class: ContentType::Html,
        },
    ]
});

/// Detect the content type of `text` by counting regex votes per class,
/// per spec §4.E: `>= 2` votes for code plus any markdown/html vote wins
/// `Mixed`; otherwise the highest-voting class wins; `Text` is the
/// default when nothing votes.
pub fn detect_content_type(text: &str) -> ContentType {
    let mut code_votes = 0u32;
    let mut markdown_votes = 0u32;
    let mut html_votes = 0u32;

    for voter in VOTERS.iter() {
        let hits = voter.pattern.find_iter(text).count() as u32;
        if hits == 0 {
            continue;
        }
        match voter.class {
            ContentType::Code => code_votes += hits,
            ContentType::Markdown => markdown_votes += hits,
            ContentType::Html => html_votes += hits,
            _ => {}
        }
    }

    if code_votes >= 2 && (markdown_votes > 0 || html_votes > 0) {
        return ContentType::Mixed;
    }

    let max = code_votes.max(markdown_votes).max(html_votes);
    if max == 0 {
        return ContentType::Text;
    }
    if code_votes == max {
        ContentType::Code
    } else if markdown_votes == max {
        ContentType::Markdown
    } else {
        ContentType::Html
    }
}

/// Per-content-type default `(max_size, overlap)` byte budgets (spec §4.E).
pub fn default_budget(content_type: ContentType) -> (usize, usize) {
    match content_type {
        ContentType::Code => (500, 100),
        ContentType::Markdown => (800, 160),
        ContentType::Html => (600, 120),
        ContentType::Mixed => (600, 120),
        ContentType::Text => (1000, 200),
        ContentType::Pdf => (800, 160),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_markdown() {
        let text = "# Title\n\nSome *text* with a [link](http://x).\n\n- one\n- two\n";
        assert_eq!(detect_content_type(text), ContentType::Markdown);
    }

    #[test]
    fn detects_code() {
        let text = "fn main() {\n    let x = 1;\n    println!(\"{}\", x);\n}\n";
        assert_eq!(detect_content_type(text), ContentType::Code);
    }

    #[test]
    fn detects_html() {
        let text = "<html><body><div><p>Hello</p></div></body></html>";
        assert_eq!(detect_content_type(text), ContentType::Html);
    }

    #[test]
    fn detects_mixed_when_code_and_markdown_both_vote() {
        let text = "# Title\n\n```rust\nfn main() { let x = 1; }\nfn other() { let y = 2; }\n```\n";
        assert_eq!(detect_content_type(text), ContentType::Mixed);
    }

    #[test]
    fn defaults_to_text() {
        assert_eq!(detect_content_type("just some plain words here"), ContentType::Text);
    }
}
