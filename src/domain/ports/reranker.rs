//! Reranker provider contract (spec §4.B).

use crate::domain::error::Result;
use async_trait::async_trait;

/// One reordering decision returned by a [`RerankerProvider`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankHit {
    /// Index into the original candidate array passed to `rerank`.
    pub index: usize,
    /// Reranker-assigned relevance score, higher is better.
    pub score: f32,
}

/// Options controlling a rerank call.
#[derive(Debug, Clone, Copy)]
pub struct RerankOptions {
    /// Maximum number of hits to return, sorted descending by score.
    pub top_k: usize,
    /// Maximum number of candidates the reranker is allowed to consider.
    pub max_candidates: usize,
}

/// `(query, [doc]) -> reordered scores`.
///
/// Reranker failures are never fatal to a query: callers fall back to
/// the pre-rerank ordering (spec §4.B, §7).
#[async_trait]
pub trait RerankerProvider: Send + Sync {
    /// Rerank `documents` against `query`, returning hits sorted
    /// descending by score. Indices reference `documents`.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        options: RerankOptions,
    ) -> Result<Vec<RerankHit>>;

    /// Whether the provider has completed whatever initialization it
    /// needs before it can serve `rerank` calls.
    fn is_ready(&self) -> bool;
}
