//! Scalar indexes over columnar rows (spec §4.C).
//!
//! `BitmapIndex` suits low-cardinality columns (`source`, `status`,
//! `language`): one posting list per distinct value. `BtreeIndex` suits
//! point lookups and ordered scans on higher-cardinality columns (`id`,
//! `content_hash`, `document_id`).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

/// Posting-list index over a low-cardinality column.
#[derive(Debug, Default, Clone)]
pub struct BitmapIndex<V: Eq + Hash + Clone> {
    postings: HashMap<V, HashSet<String>>,
}

impl<V: Eq + Hash + Clone> BitmapIndex<V> {
    pub fn new() -> Self {
        Self { postings: HashMap::new() }
    }

    pub fn insert(&mut self, value: V, row_id: String) {
        self.postings.entry(value).or_default().insert(row_id);
    }

    pub fn remove(&mut self, value: &V, row_id: &str) {
        if let Some(set) = self.postings.get_mut(value) {
            set.remove(row_id);
        }
    }

    pub fn get(&self, value: &V) -> HashSet<String> {
        self.postings.get(value).cloned().unwrap_or_default()
    }
}

/// Ordered point-lookup index over a (typically unique) column.
#[derive(Debug, Default, Clone)]
pub struct BtreeIndex<K: Ord + Clone> {
    entries: BTreeMap<K, HashSet<String>>,
}

impl<K: Ord + Clone> BtreeIndex<K> {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    pub fn insert(&mut self, key: K, row_id: String) {
        self.entries.entry(key).or_default().insert(row_id);
    }

    pub fn remove(&mut self, key: &K, row_id: &str) {
        if let Some(set) = self.entries.get_mut(key) {
            set.remove(row_id);
        }
    }

    pub fn get(&self, key: &K) -> HashSet<String> {
        self.entries.get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_groups_rows_by_value() {
        let mut idx: BitmapIndex<String> = BitmapIndex::new();
        idx.insert("upload".to_string(), "doc1".to_string());
        idx.insert("upload".to_string(), "doc2".to_string());
        idx.insert("crawl".to_string(), "doc3".to_string());
        assert_eq!(idx.get(&"upload".to_string()).len(), 2);
        assert_eq!(idx.get(&"crawl".to_string()).len(), 1);
    }

    #[test]
    fn btree_point_lookup_by_unique_key() {
        let mut idx: BtreeIndex<String> = BtreeIndex::new();
        idx.insert("abc123".to_string(), "doc1".to_string());
        assert_eq!(idx.get(&"abc123".to_string()).len(), 1);
        idx.remove(&"abc123".to_string(), "doc1");
        assert!(idx.get(&"abc123".to_string()).is_empty());
    }
}
