//! Hierarchical Navigable Small World graph index (spec §4.C).
//!
//! A from-scratch HNSW: each inserted vector is assigned a maximum layer
//! by the usual exponential-decay draw, linked to its `m` nearest
//! existing neighbors at every layer up to that maximum, and greedy
//! search descends from the top layer to layer 0 before a widened
//! beam search at layer 0 produces the final candidate list.

use crate::store::index::flat::cosine_distance;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Tunable parameters for one HNSW instance, chosen by corpus size per
/// spec §4.C's size tiers.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Max neighbors per node per layer.
    pub m: usize,
    /// Candidate list size used while inserting.
    pub ef_construction: usize,
    /// Candidate list size used while searching.
    pub ef_search: usize,
}

impl HnswParams {
    /// Parameters for `corpus_size` vectors, per spec §4.C's size tiers.
    pub fn for_corpus_size(corpus_size: usize) -> Self {
        if corpus_size < 1_000_000 {
            Self { m: 16, ef_construction: 200, ef_search: 50 }
        } else if corpus_size < 10_000_000 {
            Self { m: 32, ef_construction: 400, ef_search: 100 }
        } else {
            Self { m: 64, ef_construction: 800, ef_search: 200 }
        }
    }
}

struct Node {
    id: String,
    vector: Vec<f32>,
    neighbors: Vec<Vec<usize>>, // neighbors[layer] = node indices
}

/// A multi-layer navigable small-world graph over unit vectors.
pub struct HnswIndex {
    params: HnswParams,
    nodes: Vec<Node>,
    id_to_index: HashMap<String, usize>,
    entry_point: Option<usize>,
    max_layer: usize,
}

#[derive(PartialEq)]
struct ScoredIndex {
    distance: f32,
    index: usize,
}
impl Eq for ScoredIndex {}
impl Ord for ScoredIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.partial_cmp(&other.distance).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for ScoredIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl HnswIndex {
    pub fn new(params: HnswParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            id_to_index: HashMap::new(),
            entry_point: None,
            max_layer: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.id_to_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_index.is_empty()
    }

    fn random_layer(&self) -> usize {
        let level_mult = 1.0 / (self.params.m as f64).ln();
        let r: f64 = rand::rng().random_range(0.0..1.0);
        (-r.ln() * level_mult).floor() as usize
    }

    pub fn insert(&mut self, id: String, vector: Vec<f32>) {
        self.remove(&id);
        let layer = self.random_layer();
        let index = self.nodes.len();
        self.nodes.push(Node { id: id.clone(), vector: vector.clone(), neighbors: vec![Vec::new(); layer + 1] });
        self.id_to_index.insert(id, index);

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(index);
            self.max_layer = layer;
            return;
        };

        let mut current = entry;
        for l in ((layer + 1)..=self.max_layer).rev() {
            current = self.greedy_closest(current, &vector, l);
        }

        for l in (0..=layer.min(self.max_layer)).rev() {
            let candidates = self.search_layer(&vector, current, self.params.ef_construction, l);
            let selected: Vec<usize> = candidates
                .iter()
                .take(self.params.m)
                .map(|c| c.index)
                .collect();
            self.nodes[index].neighbors[l] = selected.clone();
            for &neighbor in &selected {
                self.connect(neighbor, index, l);
            }
            if let Some(first) = candidates.first() {
                current = first.index;
            }
        }

        if layer > self.max_layer {
            self.max_layer = layer;
            self.entry_point = Some(index);
        }
    }

    fn connect(&mut self, node: usize, new_neighbor: usize, layer: usize) {
        if layer >= self.nodes[node].neighbors.len() {
            return;
        }
        let list = &mut self.nodes[node].neighbors[layer];
        if list.contains(&new_neighbor) {
            return;
        }
        list.push(new_neighbor);
        if list.len() > self.params.m {
            let node_vec = self.nodes[node].vector.clone();
            let list_copy: Vec<usize> = self.nodes[node].neighbors[layer].clone();
            let mut scored: Vec<(usize, f32)> = list_copy
                .into_iter()
                .map(|n| (n, cosine_distance(&node_vec, &self.nodes[n].vector)))
                .collect();
            scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            scored.truncate(self.params.m);
            self.nodes[node].neighbors[layer] = scored.into_iter().map(|(n, _)| n).collect();
        }
    }

    fn greedy_closest(&self, from: usize, query: &[f32], layer: usize) -> usize {
        let mut current = from;
        let mut current_dist = cosine_distance(query, &self.nodes[current].vector);
        loop {
            let mut improved = false;
            if layer < self.nodes[current].neighbors.len() {
                for &n in &self.nodes[current].neighbors[layer].clone() {
                    let d = cosine_distance(query, &self.nodes[n].vector);
                    if d < current_dist {
                        current = n;
                        current_dist = d;
                        improved = true;
                    }
                }
            }
            if !improved {
                return current;
            }
        }
    }

    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<ScoredIndex> {
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(entry);
        let entry_dist = cosine_distance(query, &self.nodes[entry].vector);
        let mut candidates: BinaryHeap<std::cmp::Reverse<ScoredIndex>> = BinaryHeap::new();
        candidates.push(std::cmp::Reverse(ScoredIndex { distance: entry_dist, index: entry }));
        let mut best: Vec<ScoredIndex> = vec![ScoredIndex { distance: entry_dist, index: entry }];

        while let Some(std::cmp::Reverse(current)) = candidates.pop() {
            if best.len() >= ef {
                let worst = best.iter().map(|s| s.distance).fold(f32::MIN, f32::max);
                if current.distance > worst {
                    break;
                }
            }
            if layer >= self.nodes[current.index].neighbors.len() {
                continue;
            }
            for &n in &self.nodes[current.index].neighbors[layer] {
                if visited.insert(n) {
                    let d = cosine_distance(query, &self.nodes[n].vector);
                    candidates.push(std::cmp::Reverse(ScoredIndex { distance: d, index: n }));
                    best.push(ScoredIndex { distance: d, index: n });
                }
            }
        }
        best.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        best.truncate(ef);
        best
    }

    pub fn remove(&mut self, id: &str) {
        let Some(&index) = self.id_to_index.get(id) else { return };
        self.id_to_index.remove(id);
        for node in &mut self.nodes {
            for layer in &mut node.neighbors {
                layer.retain(|&n| n != index);
            }
        }
        if self.entry_point == Some(index) {
            self.entry_point = self.id_to_index.values().next().copied();
        }
    }

    /// Return up to `limit` `(id, distance)` pairs, restricted to ids for
    /// which `allow` returns true.
    pub fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        allow: impl Fn(&str) -> bool,
    ) -> Vec<(String, f32)> {
        let Some(entry) = self.entry_point else { return Vec::new() };
        let mut current = entry;
        for l in (1..=self.max_layer).rev() {
            current = self.greedy_closest(current, query_vector, l);
        }
        let ef = self.params.ef_search.max(limit);
        let candidates = self.search_layer(query_vector, current, ef, 0);
        candidates
            .into_iter()
            .filter(|c| allow(&self.nodes[c.index].id))
            .take(limit)
            .map(|c| (self.nodes[c.index].id.clone(), c.distance))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HnswParams {
        HnswParams { m: 8, ef_construction: 32, ef_search: 16 }
    }

    #[test]
    fn finds_exact_match_among_many_vectors() {
        let mut idx = HnswIndex::new(params());
        for i in 0..200 {
            let angle = i as f32 * 0.01;
            idx.insert(format!("v{i}"), vec![angle.cos(), angle.sin()]);
        }
        idx.insert("target".into(), vec![1.0, 0.0]);
        let hits = idx.search(&[1.0, 0.0], 5, |_| true);
        assert!(hits.iter().any(|(id, dist)| id == "target" && *dist < 1e-4));
    }

    #[test]
    fn respects_allow_predicate() {
        let mut idx = HnswIndex::new(params());
        idx.insert("a".into(), vec![1.0, 0.0]);
        idx.insert("b".into(), vec![0.9, 0.1]);
        let hits = idx.search(&[1.0, 0.0], 10, |id| id != "a");
        assert!(hits.iter().all(|(id, _)| id != "a"));
    }

    #[test]
    fn size_tiers_match_spec_parameters() {
        let small = HnswParams::for_corpus_size(1000);
        assert_eq!((small.m, small.ef_construction, small.ef_search), (16, 200, 50));
        let mid = HnswParams::for_corpus_size(2_000_000);
        assert_eq!((mid.m, mid.ef_construction, mid.ef_search), (32, 400, 100));
        let large = HnswParams::for_corpus_size(20_000_000);
        assert_eq!((large.m, large.ef_construction, large.ef_search), (64, 800, 200));
    }

    #[test]
    fn remove_excludes_node_from_future_searches() {
        let mut idx = HnswIndex::new(params());
        idx.insert("a".into(), vec![1.0, 0.0]);
        idx.insert("b".into(), vec![0.0, 1.0]);
        idx.remove("a");
        let hits = idx.search(&[1.0, 0.0], 10, |_| true);
        assert!(hits.iter().all(|(id, _)| id != "a"));
    }
}
