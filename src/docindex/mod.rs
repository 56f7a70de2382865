//! In-process document index (spec §4.D): fast posting-list lookups that
//! sit in front of the store, persisted as a debounced snapshot alongside
//! it rather than recomputed on every query.

pub mod snapshot;
pub mod stopwords;

use crate::domain::types::Document;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-document fields the index keeps for title/combined search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFields {
    pub title: String,
    pub tags: Vec<String>,
    pub source: String,
    pub keywords: HashSet<String>,
}

/// In-memory posting-list index over document metadata. Does not itself
/// hold chunk or code-block content; [`crate::store`] remains the source
/// of truth, this index only accelerates lookups over it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DocumentIndex {
    id_to_path: HashMap<String, String>,
    chunk_to_document: HashMap<String, (String, usize)>,
    content_hash_to_id: HashMap<String, String>,
    keyword_postings: HashMap<String, HashSet<String>>,
    tag_postings: HashMap<String, HashSet<String>>,
    source_postings: HashMap<String, HashSet<String>>,
    crawl_id_postings: HashMap<String, HashSet<String>>,
    title_word_postings: HashMap<String, HashSet<String>>,
    search_fields: HashMap<String, SearchFields>,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) a document row. `path` is the mirrored file
    /// path in the data directory, if any. `tags` are the tags currently
    /// associated with the document (caller-supplied/generated union).
    pub fn add_document(&mut self, doc: &Document, path: Option<String>, tags: &[String]) {
        self.remove_document(&doc.id);

        if let Some(path) = path {
            self.id_to_path.insert(doc.id.clone(), path);
        }
        self.content_hash_to_id
            .insert(doc.content_hash.clone(), doc.id.clone());
        self.source_postings
            .entry(format!("{:?}", doc.source).to_lowercase())
            .or_default()
            .insert(doc.id.clone());
        if let Some(crawl_id) = &doc.crawl_id {
            self.crawl_id_postings
                .entry(crawl_id.clone())
                .or_default()
                .insert(doc.id.clone());
        }
        for tag in tags {
            self.tag_postings
                .entry(tag.clone())
                .or_default()
                .insert(doc.id.clone());
        }

        let title_words = stopwords::tokenize(&doc.title);
        for word in &title_words {
            self.title_word_postings
                .entry(word.clone())
                .or_default()
                .insert(doc.id.clone());
        }
        let mut keywords: HashSet<String> = title_words.into_iter().collect();
        for word in stopwords::tokenize(&doc.content) {
            keywords.insert(word);
        }
        for word in &keywords {
            self.keyword_postings
                .entry(word.clone())
                .or_default()
                .insert(doc.id.clone());
        }

        self.search_fields.insert(
            doc.id.clone(),
            SearchFields {
                title: doc.title.clone(),
                tags: tags.to_vec(),
                source: format!("{:?}", doc.source).to_lowercase(),
                keywords,
            },
        );
    }

    /// Remove a document and every posting-list entry it contributed.
    pub fn remove_document(&mut self, id: &str) {
        self.id_to_path.remove(id);
        self.content_hash_to_id.retain(|_, v| v != id);
        self.chunk_to_document.retain(|_, (doc_id, _)| doc_id != id);
        for postings in [
            &mut self.keyword_postings,
            &mut self.tag_postings,
            &mut self.source_postings,
            &mut self.crawl_id_postings,
            &mut self.title_word_postings,
        ] {
            for set in postings.values_mut() {
                set.remove(id);
            }
        }
        self.search_fields.remove(id);
    }

    /// Record that `chunk_id` is the `index`-th chunk of `document_id`.
    pub fn add_chunk(&mut self, chunk_id: String, document_id: String, index: usize) {
        self.chunk_to_document.insert(chunk_id, (document_id, index));
    }

    /// O(1) lookup of a document's mirrored file path.
    pub fn find_document(&self, id: &str) -> Option<&str> {
        self.id_to_path.get(id).map(|s| s.as_str())
    }

    /// O(1) lookup of an existing document id sharing `content_hash`.
    pub fn find_duplicate_content(&self, content_hash: &str) -> Option<&str> {
        self.content_hash_to_id.get(content_hash).map(|s| s.as_str())
    }

    /// Document ids whose keyword set contains every word in `words`
    /// (posting-list intersection).
    pub fn search_by_keywords(&self, words: &[String]) -> HashSet<String> {
        intersect(&self.keyword_postings, words)
    }

    /// Document ids tagged with every tag in `tags` (posting-list
    /// intersection).
    pub fn search_by_tags(&self, tags: &[String]) -> HashSet<String> {
        intersect(&self.tag_postings, tags)
    }

    /// Document ids sharing `crawl_id` (used by crawl-session deletion
    /// to clean up index entries once the store has removed the rows).
    pub fn ids_for_crawl(&self, crawl_id: &str) -> HashSet<String> {
        self.crawl_id_postings.get(crawl_id).cloned().unwrap_or_default()
    }

    /// Document ids whose title contains any of `query`'s tokens
    /// (posting-list union restricted to title words).
    pub fn search_by_title(&self, query: &str) -> HashSet<String> {
        let words = stopwords::tokenize(query);
        union(&self.title_word_postings, &words)
    }

    /// Union of keyword and title matches for `query`.
    pub fn search_by_combined_criteria(&self, query: &str) -> HashSet<String> {
        let words = stopwords::tokenize(query);
        let mut result = union(&self.keyword_postings, &words);
        result.extend(self.search_by_title(query));
        result
    }

    pub fn len(&self) -> usize {
        self.search_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.search_fields.is_empty()
    }
}

fn intersect(postings: &HashMap<String, HashSet<String>>, words: &[String]) -> HashSet<String> {
    let mut iter = words.iter();
    let Some(first) = iter.next() else {
        return HashSet::new();
    };
    let mut result = postings.get(first).cloned().unwrap_or_default();
    for word in iter {
        let set = postings.get(word).cloned().unwrap_or_default();
        result.retain(|id| set.contains(id));
        if result.is_empty() {
            break;
        }
    }
    result
}

fn union(postings: &HashMap<String, HashSet<String>>, words: &[String]) -> HashSet<String> {
    let mut result = HashSet::new();
    for word in words {
        if let Some(set) = postings.get(word) {
            result.extend(set.iter().cloned());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DocumentSource;
    use chrono::Utc;

    fn doc(id: &str, title: &str, content: &str) -> Document {
        let now = Utc::now();
        Document {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            content_hash: format!("hash-{id}"),
            content_length: content.len(),
            source: DocumentSource::Upload,
            original_filename: None,
            file_extension: None,
            crawl_id: None,
            crawl_url: None,
            author: None,
            description: None,
            content_type: None,
            created_at: now,
            updated_at: now,
            processed_at: now,
            chunks_count: 0,
            code_blocks_count: 0,
            status: crate::domain::types::DocumentStatus::Active,
        }
    }

    #[test]
    fn finds_document_by_id_in_constant_time() {
        let mut idx = DocumentIndex::new();
        idx.add_document(&doc("d1", "Title", "content"), Some("data/d1.txt".into()), &[]);
        assert_eq!(idx.find_document("d1"), Some("data/d1.txt"));
    }

    #[test]
    fn finds_duplicate_content_by_hash() {
        let mut idx = DocumentIndex::new();
        idx.add_document(&doc("d1", "Title", "content"), None, &[]);
        assert_eq!(idx.find_duplicate_content("hash-d1"), Some("d1"));
        assert_eq!(idx.find_duplicate_content("missing"), None);
    }

    #[test]
    fn keyword_search_intersects_postings() {
        let mut idx = DocumentIndex::new();
        idx.add_document(&doc("d1", "Rust Guide", "async programming patterns"), None, &[]);
        idx.add_document(&doc("d2", "Python Guide", "async networking basics"), None, &[]);
        let hits = idx.search_by_keywords(&["async".to_string(), "programming".to_string()]);
        assert_eq!(hits, HashSet::from(["d1".to_string()]));
    }

    #[test]
    fn tag_search_intersects_postings() {
        let mut idx = DocumentIndex::new();
        idx.add_document(&doc("d1", "A", "x"), None, &["rust".into(), "async".into()]);
        idx.add_document(&doc("d2", "B", "y"), None, &["rust".into()]);
        assert_eq!(
            idx.search_by_tags(&["rust".to_string(), "async".to_string()]),
            HashSet::from(["d1".to_string()])
        );
    }

    #[test]
    fn title_search_unions_title_word_postings() {
        let mut idx = DocumentIndex::new();
        idx.add_document(&doc("d1", "Rust Async Guide", "x"), None, &[]);
        idx.add_document(&doc("d2", "Python Guide", "y"), None, &[]);
        let hits = idx.search_by_title("rust python");
        assert_eq!(hits, HashSet::from(["d1".to_string(), "d2".to_string()]));
    }

    #[test]
    fn combined_search_unions_keyword_and_title_hits() {
        let mut idx = DocumentIndex::new();
        idx.add_document(&doc("d1", "Networking", "rust async runtime"), None, &[]);
        idx.add_document(&doc("d2", "Rust Basics", "unrelated content"), None, &[]);
        let hits = idx.search_by_combined_criteria("rust");
        assert_eq!(hits, HashSet::from(["d1".to_string(), "d2".to_string()]));
    }

    #[test]
    fn remove_document_clears_every_posting() {
        let mut idx = DocumentIndex::new();
        idx.add_document(&doc("d1", "Rust Guide", "async content"), Some("p".into()), &["rust".into()]);
        idx.remove_document("d1");
        assert!(idx.find_document("d1").is_none());
        assert!(idx.search_by_keywords(&["async".to_string()]).is_empty());
        assert!(idx.search_by_tags(&["rust".to_string()]).is_empty());
        assert!(idx.is_empty());
    }
}
