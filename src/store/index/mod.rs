//! Vector index selection (spec §4.C).
//!
//! Below the 256-vector training floor, brute force is used regardless
//! of configuration (Open Question resolution, see DESIGN.md); at or
//! above it, HNSW is used when enabled, and IVF_PQ (spec's documented
//! HNSW-disabled fallback) otherwise.

pub mod flat;
pub mod hnsw;
pub mod ivf_pq;
pub mod scalar;

use crate::domain::types::Embedding;
use flat::FlatIndex;
use hnsw::{HnswIndex, HnswParams};
use ivf_pq::{IvfPqIndex, IvfPqParams};

/// Minimum corpus size before an ANN index is preferred over brute force.
/// Also the spec's IVF_PQ training floor (spec §4.C: "IVF_PQ requires
/// ≥256 vectors — below that, brute force is used").
pub const TRAINING_FLOOR: usize = 256;

/// A vector index that transparently upgrades from brute force to HNSW
/// (or, when HNSW is disabled, IVF_PQ) once the corpus crosses
/// [`TRAINING_FLOOR`].
pub struct VectorIndex {
    hnsw_enabled: bool,
    flat: FlatIndex,
    hnsw: Option<HnswIndex>,
    ivf_pq: Option<IvfPqIndex>,
}

impl VectorIndex {
    /// Build an index; `hnsw_enabled` mirrors the store's HNSW config
    /// toggle (spec §6 env vars).
    pub fn new(hnsw_enabled: bool) -> Self {
        Self { hnsw_enabled, flat: FlatIndex::new(), hnsw: None, ivf_pq: None }
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    pub fn insert(&mut self, id: String, vector: Vec<f32>) {
        self.flat.insert(id.clone(), vector.clone());
        self.maybe_promote();
        if let Some(hnsw) = &mut self.hnsw {
            hnsw.insert(id.clone(), vector.clone());
        }
        if let Some(ivf_pq) = &mut self.ivf_pq {
            ivf_pq.insert(id, vector);
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.flat.remove(id);
        if let Some(hnsw) = &mut self.hnsw {
            hnsw.remove(id);
        }
        if let Some(ivf_pq) = &mut self.ivf_pq {
            ivf_pq.remove(id);
        }
    }

    fn maybe_promote(&mut self) {
        if self.flat.len() < TRAINING_FLOOR {
            return;
        }
        if self.hnsw_enabled {
            if self.hnsw.is_none() {
                let params = HnswParams::for_corpus_size(self.flat.len());
                let mut hnsw = HnswIndex::new(params);
                // Backfill: the flat index already tracks every row, but
                // HnswIndex has none yet, so mirror the flat rows into it.
                hnsw = rebuild_hnsw(hnsw, &self.flat);
                self.hnsw = Some(hnsw);
            }
        } else if self.ivf_pq.is_none() {
            let dimensions = self.flat.iter().next().map(|(_, v)| v.len()).unwrap_or(0);
            let params = IvfPqParams::for_corpus(self.flat.len(), dimensions);
            self.ivf_pq = Some(IvfPqIndex::train(params, self.flat.iter()));
        }
    }

    /// Search the corpus, choosing HNSW or IVF_PQ once one has been
    /// built for the configured backend, brute force otherwise.
    pub fn search(
        &self,
        query: &Embedding,
        limit: usize,
        allow: impl Fn(&str) -> bool,
    ) -> Vec<(String, f32)> {
        if self.flat.len() < TRAINING_FLOOR {
            return self.flat.search(query, limit, allow);
        }
        if self.hnsw_enabled {
            match &self.hnsw {
                Some(hnsw) => hnsw.search(&query.vector, limit, allow),
                None => self.flat.search(query, limit, allow),
            }
        } else {
            match &self.ivf_pq {
                Some(ivf_pq) => ivf_pq.search(&query.vector, limit, allow),
                None => self.flat.search(query, limit, allow),
            }
        }
    }
}

fn rebuild_hnsw(mut hnsw: HnswIndex, flat: &FlatIndex) -> HnswIndex {
    for (id, vector) in flat.iter() {
        hnsw.insert(id.clone(), vector.clone());
    }
    hnsw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(v: Vec<f32>) -> Embedding {
        Embedding { vector: v, model: "t".into() }
    }

    #[test]
    fn brute_forces_below_training_floor_even_with_hnsw_enabled() {
        let mut idx = VectorIndex::new(true);
        for i in 0..10 {
            idx.insert(format!("v{i}"), vec![i as f32, 0.0]);
        }
        assert!(idx.len() < TRAINING_FLOOR);
        let hits = idx.search(&emb(vec![0.0, 0.0]), 3, |_| true);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, "v0");
    }

    #[test]
    fn promotes_to_hnsw_once_floor_is_crossed() {
        let mut idx = VectorIndex::new(true);
        for i in 0..TRAINING_FLOOR + 10 {
            let angle = i as f32 * 0.01;
            idx.insert(format!("v{i}"), vec![angle.cos(), angle.sin()]);
        }
        assert!(idx.hnsw.is_some());
        let hits = idx.search(&emb(vec![1.0, 0.0]), 5, |_| true);
        assert!(!hits.is_empty());
    }

    #[test]
    fn promotes_to_ivf_pq_once_floor_is_crossed_with_hnsw_disabled() {
        let mut idx = VectorIndex::new(false);
        for i in 0..TRAINING_FLOOR + 10 {
            let angle = i as f32 * 0.01;
            idx.insert(format!("v{i}"), vec![angle.cos(), angle.sin()]);
        }
        assert!(idx.hnsw.is_none());
        assert!(idx.ivf_pq.is_some());
        let hits = idx.search(&emb(vec![1.0, 0.0]), 5, |_| true);
        assert!(!hits.is_empty());
    }
}
