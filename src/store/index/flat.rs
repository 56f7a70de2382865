//! Brute-force vector scan, used below the ANN training floor (spec §4.C,
//! Open Question: the source computes IVF_PQ even below 256 vectors on
//! one path and brute-forces on another — this crate brute-forces).

use crate::domain::types::Embedding;

/// One row tracked by a vector index: an id plus its embedding.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub id: String,
    pub vector: Vec<f32>,
}

/// Exact top-k nearest neighbor search by cosine distance.
#[derive(Debug, Default, Clone)]
pub struct FlatIndex {
    rows: Vec<IndexedVector>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: String, vector: Vec<f32>) {
        self.rows.retain(|r| r.id != id);
        self.rows.push(IndexedVector { id, vector });
    }

    pub fn remove(&mut self, id: &str) {
        self.rows.retain(|r| r.id != id);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over every tracked `(id, vector)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<f32>)> {
        self.rows.iter().map(|r| (&r.id, &r.vector))
    }

    /// Return up to `limit` `(id, distance)` pairs sorted ascending by
    /// cosine distance, restricted to ids for which `allow` returns true.
    pub fn search(
        &self,
        query: &Embedding,
        limit: usize,
        allow: impl Fn(&str) -> bool,
    ) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .rows
            .iter()
            .filter(|r| allow(&r.id))
            .map(|r| (r.id.clone(), cosine_distance(&query.vector, &r.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - (dot / (norm_a * norm_b))).clamp(0.0, 2.0)
}
