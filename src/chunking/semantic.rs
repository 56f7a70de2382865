//! Adaptive semantic merge pass (spec §4.E, `adaptiveSize`).
//!
//! Adjacent chunks whose cosine similarity is `>= 0.8` and whose
//! combined length is `<= 1.5 * max_size` are merged, the merged text is
//! re-embedded, and chunk indices are implicitly renumbered densely by
//! virtue of the merged vector having fewer, contiguous entries.

use crate::chunking::EmbeddedChunk;
use crate::domain::error::Result;
use crate::domain::ports::EmbeddingProvider;

/// Cosine-similarity threshold above which adjacent chunks are merged.
pub const MERGE_SIMILARITY_THRESHOLD: f32 = 0.8;
/// Combined-length ceiling, as a multiple of `max_size`, allowed for a merge.
pub const MERGE_SIZE_MULTIPLIER: f64 = 1.5;

/// Merge adjacent chunks that are semantically similar and not too large
/// combined, re-embedding each merge result.
pub async fn merge_similar(
    chunks: Vec<EmbeddedChunk>,
    max_size: usize,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<EmbeddedChunk>> {
    if chunks.len() < 2 {
        return Ok(chunks);
    }

    let limit = (max_size as f64 * MERGE_SIZE_MULTIPLIER) as usize;
    let mut merged: Vec<EmbeddedChunk> = Vec::with_capacity(chunks.len());
    let mut iter = chunks.into_iter();
    let Some(mut current) = iter.next() else {
        return Ok(merged);
    };

    for next in iter {
        let similarity = 1.0 - current.embedding.cosine_distance(&next.embedding);
        let combined_len = current.content.len() + next.content.len();
        if similarity >= MERGE_SIMILARITY_THRESHOLD && combined_len <= limit {
            let content = format!("{}{}", current.content, next.content);
            let embedding = embedder.embed(&content).await?;
            current = EmbeddedChunk {
                start: current.start,
                end: next.end,
                content,
                embedding,
                surrounding_context: current.surrounding_context,
                semantic_topic: current.semantic_topic.or(next.semantic_topic),
            };
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    Ok(merged)
}
