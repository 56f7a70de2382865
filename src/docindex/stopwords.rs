//! Tokenization and stop-word filtering for the in-process document index
//! (spec §4.D): a fixed English list, tokens kept verbatim (not stemmed or
//! hashed), length-gated to 3..=20 characters.

use std::collections::HashSet;
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "of", "to", "in", "on", "at", "for", "with", "by",
    "from", "up", "about", "into", "over", "after", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "do", "does", "did", "will", "would", "should", "could", "can",
    "may", "might", "must", "shall", "this", "that", "these", "those", "it", "its", "as", "if",
    "then", "than", "so", "not", "no", "nor", "too", "very", "just", "also", "we", "you", "they",
    "he", "she", "his", "her", "their", "our", "your", "i", "me", "my", "mine",
];

fn stopword_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Split `text` into lowercase alphanumeric tokens, dropping stop words and
/// tokens outside the 3..=20 character range.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| {
            let len = t.chars().count();
            (3..=20).contains(&len) && !stopword_set().contains(t.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_short_tokens() {
        let tokens = tokenize("The quick fox of a mighty jump");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"of".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
        assert!(tokens.contains(&"quick".to_string()));
        assert!(tokens.contains(&"mighty".to_string()));
        assert!(tokens.contains(&"jump".to_string()));
    }

    #[test]
    fn drops_overlong_tokens() {
        let long_token = "a".repeat(25);
        let tokens = tokenize(&format!("short {long_token} words"));
        assert!(!tokens.iter().any(|t| t.len() > 20));
    }

    #[test]
    fn stores_tokens_verbatim_not_hashed() {
        let tokens = tokenize("Rustacean");
        assert_eq!(tokens, vec!["rustacean".to_string()]);
    }
}
