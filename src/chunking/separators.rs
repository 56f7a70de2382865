//! Prioritized separator tables for the recursive splitter (spec §4.E).

use super::content_type::ContentType;

/// A small heuristic guess at the programming language of a code
/// snippet, used only to pick a separator list — not a full language
/// classifier (that job belongs to tree-sitter-grade tools, out of
/// scope here; see spec.md §1 framing of the chunker as content-type
/// aware, not AST aware).
pub fn guess_code_language(text: &str) -> &'static str {
    let probes: &[(&str, &[&str])] = &[
        ("rust", &["fn ", "impl ", "pub struct", "let mut", "use crate::"]),
        ("python", &["def ", "import ", "elif ", "self.", "    return"]),
        ("javascript", &["function ", "const ", "=>", "require(", "module.exports"]),
        ("java", &["public class", "private ", "System.out", "import java."]),
        ("go", &["func ", "package ", ":= ", "import (", "fmt."]),
    ];
    let mut best = ("generic", 0usize);
    for (lang, needles) in probes {
        let hits = needles.iter().filter(|n| text.contains(**n)).count();
        if hits > best.1 {
            best = (lang, hits);
        }
    }
    best.0
}

/// Prioritized separators for `content_type`, strongest first, ending in
/// `""` (arbitrary character cut, last resort).
pub fn separators_for(content_type: ContentType, code_language_hint: Option<&str>) -> Vec<&'static str> {
    match content_type {
        ContentType::Markdown => vec![
            "\n## ", "\n### ", "\n#### ", "\n# ", "\n\n", "\n", ". ", " ", "",
        ],
        ContentType::Html => vec![
            "</div>", "</section>", "</article>", "</p>", "\n\n", "\n", ". ", " ", "",
        ],
        ContentType::Code => match code_language_hint.unwrap_or("generic") {
            "rust" => vec!["\nfn ", "\nimpl ", "\npub fn ", "\n\n", "\n", " ", ""],
            "python" => vec!["\ndef ", "\nclass ", "\n\n", "\n", " ", ""],
            "javascript" => vec!["\nfunction ", "\nclass ", "\nconst ", "\n\n", "\n", " ", ""],
            "java" => vec!["\npublic ", "\nprivate ", "\nclass ", "\n\n", "\n", " ", ""],
            "go" => vec!["\nfunc ", "\ntype ", "\n\n", "\n", " ", ""],
            _ => vec!["\n\n", "\n", "; ", " ", ""],
        },
        ContentType::Mixed => vec!["\n\n", "\n", ". ", " ", ""],
        ContentType::Text | ContentType::Pdf => vec!["\n\n", "\n", ". ", " ", ""],
    }
}
