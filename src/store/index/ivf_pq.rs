//! IVF_PQ: an inverted-file coarse quantizer plus per-sub-vector product
//! quantization (spec §4.C), used in place of HNSW when HNSW is disabled
//! and the corpus has crossed the training floor.
//!
//! Partitions and codebooks are trained once, from scratch, with a small
//! Lloyd's-algorithm k-means seeded from evenly spaced training points so
//! construction stays deterministic. A search probes the nearest few
//! partitions, ranks their rows by the quantized (asymmetric) distance
//! against those partitions, then re-ranks the best of those by exact
//! cosine distance before truncating to `limit` — the usual IVF_PQ
//! "probe, approximate, refine" shape.

use crate::store::index::flat::cosine_distance;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Codewords trained per product-quantization sub-vector.
const CODEBOOK_SIZE: usize = 16;
/// Lloyd's-algorithm iterations for both the coarse quantizer and the
/// per-sub-vector codebooks.
const KMEANS_ITERATIONS: usize = 8;
/// Number of inverted-file partitions probed per search.
const NPROBE: usize = 4;
/// Minimum number of approximate candidates kept for the exact-distance
/// refinement pass, scaled up for larger `limit`s.
const MIN_REFINE_BUDGET: usize = 32;

/// Partition and sub-vector counts, chosen by corpus size and embedding
/// dimensionality per spec §4.C: `partitions = max(16, sqrt(N))` capped
/// at 2048, `subVectors = max(4, D/16)` capped at 256 (and never more
/// than the dimensionality itself — a sub-vector needs at least one
/// component).
#[derive(Debug, Clone, Copy)]
pub struct IvfPqParams {
    pub partitions: usize,
    pub sub_vectors: usize,
}

impl IvfPqParams {
    /// Derive partition and sub-vector counts for a corpus of
    /// `corpus_size` vectors of `dimensions` components each.
    pub fn for_corpus(corpus_size: usize, dimensions: usize) -> Self {
        let partitions = (corpus_size as f64).sqrt().ceil() as usize;
        let partitions = partitions.max(16).min(2048);
        let sub_vectors = (dimensions / 16).max(4).min(256).min(dimensions.max(1));
        Self { partitions, sub_vectors }
    }
}

struct Row {
    id: String,
    vector: Vec<f32>,
    codes: Vec<u8>,
    partition: usize,
}

/// A coarse quantizer plus product-quantization codebooks trained from
/// the vectors present at construction time. Vectors inserted afterward
/// are assigned against the existing quantizer rather than retraining.
pub struct IvfPqIndex {
    params: IvfPqParams,
    centroids: Vec<Vec<f32>>,
    codebooks: Vec<Vec<Vec<f32>>>,
    rows: Vec<Row>,
}

impl IvfPqIndex {
    /// Train a fresh index from every `(id, vector)` pair yielded by
    /// `source`.
    pub fn train<'a>(params: IvfPqParams, source: impl Iterator<Item = (&'a String, &'a Vec<f32>)>) -> Self {
        let pairs: Vec<(String, Vec<f32>)> = source.map(|(id, v)| (id.clone(), v.clone())).collect();
        let training: Vec<Vec<f32>> = pairs.iter().map(|(_, v)| v.clone()).collect();

        let centroids = kmeans(&training, params.partitions, KMEANS_ITERATIONS);
        let codebooks: Vec<Vec<Vec<f32>>> = (0..params.sub_vectors)
            .map(|sub| {
                let chunks: Vec<Vec<f32>> =
                    training.iter().map(|v| sub_chunk(v, params.sub_vectors, sub).to_vec()).collect();
                kmeans(&chunks, CODEBOOK_SIZE, KMEANS_ITERATIONS)
            })
            .collect();

        let mut index = Self { params, centroids, codebooks, rows: Vec::new() };
        for (id, vector) in pairs {
            index.insert(id, vector);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Assign `vector` to its nearest partition and encode it against the
    /// existing codebooks; does not retrain the quantizer.
    pub fn insert(&mut self, id: String, vector: Vec<f32>) {
        self.remove(&id);
        if self.centroids.is_empty() {
            return;
        }
        let partition = nearest(&self.centroids, &vector).0;
        let codes = self.encode(&vector);
        self.rows.push(Row { id, vector, codes, partition });
    }

    pub fn remove(&mut self, id: &str) {
        self.rows.retain(|r| r.id != id);
    }

    fn encode(&self, vector: &[f32]) -> Vec<u8> {
        (0..self.params.sub_vectors)
            .map(|sub| {
                let chunk = sub_chunk(vector, self.params.sub_vectors, sub);
                nearest(&self.codebooks[sub], chunk).0 as u8
            })
            .collect()
    }

    /// Probe the [`NPROBE`] nearest partitions, rank their rows by
    /// quantized (asymmetric) distance, then re-rank the best of those by
    /// exact cosine distance against the stored vectors before truncating
    /// to `limit`.
    pub fn search(&self, query: &[f32], limit: usize, allow: impl Fn(&str) -> bool) -> Vec<(String, f32)> {
        if self.centroids.is_empty() || self.codebooks.is_empty() {
            return Vec::new();
        }

        let mut partition_order: Vec<usize> = (0..self.centroids.len()).collect();
        partition_order.sort_by(|&a, &b| {
            squared_euclidean(query, &self.centroids[a])
                .partial_cmp(&squared_euclidean(query, &self.centroids[b]))
                .unwrap_or(Ordering::Equal)
        });
        let probed: HashSet<usize> = partition_order.into_iter().take(NPROBE.max(1)).collect();

        let dist_tables: Vec<Vec<f32>> = (0..self.params.sub_vectors)
            .map(|sub| {
                let chunk = sub_chunk(query, self.params.sub_vectors, sub);
                self.codebooks[sub].iter().map(|codeword| squared_euclidean(chunk, codeword)).collect()
            })
            .collect();

        let mut approximate: Vec<(usize, f32)> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| probed.contains(&row.partition) && allow(&row.id))
            .map(|(idx, row)| {
                let distance: f32 =
                    row.codes.iter().enumerate().map(|(sub, &code)| dist_tables[sub][code as usize]).sum();
                (idx, distance)
            })
            .collect();
        approximate.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        let refine_budget = (limit * 4).max(MIN_REFINE_BUDGET);
        approximate.truncate(refine_budget);

        let mut refined: Vec<(String, f32)> = approximate
            .into_iter()
            .map(|(idx, _)| {
                let row = &self.rows[idx];
                (row.id.clone(), cosine_distance(query, &row.vector))
            })
            .collect();
        refined.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        refined.truncate(limit);
        refined
    }
}

fn sub_chunk(vector: &[f32], sub_vectors: usize, index: usize) -> &[f32] {
    let len = vector.len();
    let base = len / sub_vectors;
    let remainder = len % sub_vectors;
    let start = index * base + index.min(remainder);
    let this_len = base + usize::from(index < remainder);
    &vector[start..start + this_len]
}

fn nearest(centroids: &[Vec<f32>], point: &[f32]) -> (usize, f32) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_euclidean(point, c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .unwrap_or((0, f32::INFINITY))
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// A small from-scratch Lloyd's-algorithm k-means, seeded from evenly
/// spaced training points so index construction stays deterministic
/// (no RNG, unlike [`super::hnsw`]'s layer assignment).
fn kmeans(data: &[Vec<f32>], k: usize, iterations: usize) -> Vec<Vec<f32>> {
    if data.is_empty() {
        return Vec::new();
    }
    let k = k.min(data.len()).max(1);
    let stride = (data.len() / k).max(1);
    let mut centroids: Vec<Vec<f32>> = (0..k).map(|i| data[(i * stride).min(data.len() - 1)].clone()).collect();

    for _ in 0..iterations {
        let dim = centroids[0].len();
        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for point in data {
            let (closest, _) = nearest(&centroids, point);
            for (sum, value) in sums[closest].iter_mut().zip(point.iter()) {
                *sum += value;
            }
            counts[closest] += 1;
        }
        for i in 0..k {
            if counts[i] > 0 {
                for value in sums[i].iter_mut() {
                    *value /= counts[i] as f32;
                }
                centroids[i] = sums[i].clone();
            }
        }
    }
    centroids
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn params_follow_the_spec_formulas() {
        let small = IvfPqParams::for_corpus(1000, 128);
        assert_eq!(small.partitions, 32); // ceil(sqrt(1000)) = 32
        assert_eq!(small.sub_vectors, 8); // max(4, 128/16)

        let below_partition_floor = IvfPqParams::for_corpus(10, 128);
        assert_eq!(below_partition_floor.partitions, 16); // max(16, ceil(sqrt(10)))

        let above_partition_cap = IvfPqParams::for_corpus(5_000_000, 128);
        assert_eq!(above_partition_cap.partitions, 2048); // capped

        let above_sub_vector_cap = IvfPqParams::for_corpus(1000, 8192);
        assert_eq!(above_sub_vector_cap.sub_vectors, 256); // capped

        let low_dimension = IvfPqParams::for_corpus(1000, 2);
        assert_eq!(low_dimension.sub_vectors, 2); // never more than the dimensionality
    }

    fn circle_corpus(n: usize) -> HashMap<String, Vec<f32>> {
        (0..n)
            .map(|i| {
                let angle = (i as f32) * std::f32::consts::TAU / n as f32;
                (format!("v{i}"), vec![angle.cos(), angle.sin()])
            })
            .collect()
    }

    #[test]
    fn exact_query_vector_is_the_top_hit_after_refinement() {
        let training = circle_corpus(300);
        let params = IvfPqParams::for_corpus(training.len(), 2);
        let mut index = IvfPqIndex::train(params, training.iter());
        index.insert("target".into(), vec![1.0, 0.0]);

        let hits = index.search(&[1.0, 0.0], 20, |_| true);
        assert_eq!(hits[0].0, "target");
        assert!(hits[0].1 < 1e-4);
    }

    #[test]
    fn allow_filter_excludes_the_target_row() {
        let training = circle_corpus(300);
        let params = IvfPqParams::for_corpus(training.len(), 2);
        let mut index = IvfPqIndex::train(params, training.iter());
        index.insert("target".into(), vec![1.0, 0.0]);

        let hits = index.search(&[1.0, 0.0], 20, |id| id != "target");
        assert!(hits.iter().all(|(id, _)| id != "target"));
    }

    #[test]
    fn remove_drops_the_row_from_future_searches() {
        let training = circle_corpus(300);
        let params = IvfPqParams::for_corpus(training.len(), 2);
        let mut index = IvfPqIndex::train(params, training.iter());
        index.insert("target".into(), vec![1.0, 0.0]);
        index.remove("target");

        let hits = index.search(&[1.0, 0.0], 20, |_| true);
        assert!(hits.iter().all(|(id, _)| id != "target"));
    }
}
