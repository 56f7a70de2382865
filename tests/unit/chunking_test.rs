//! Cross-feature chunking behavior: context enrichment, adaptive
//! merging, and the parallel-refinement path staying in document order
//! above the parallel-eligibility threshold (spec §4.E).

use saga::chunking::{ChunkingOptions, Chunker, ContentType};
use saga::embedding::LocalEmbeddingProvider;

#[tokio::test]
async fn add_context_attaches_surrounding_heading_to_every_chunk() {
    let embedder = LocalEmbeddingProvider::new(16);
    let chunker = Chunker::new();
    let mut doc = String::from("# Overview\n\n");
    for i in 0..10 {
        doc.push_str(&format!("Paragraph {i} with enough body text to be its own chunk candidate.\n\n"));
    }
    let options = ChunkingOptions { add_context: true, ..Default::default() };
    let chunks = chunker
        .chunk(&doc, Some(ContentType::Markdown), &options, &embedder)
        .await
        .unwrap();
    assert!(chunks.iter().any(|c| c.surrounding_context.is_some()));
}

#[tokio::test]
async fn adaptive_size_never_increases_chunk_count() {
    let embedder = LocalEmbeddingProvider::new(16);
    let chunker = Chunker::new();
    let mut doc = String::new();
    for i in 0..60 {
        doc.push_str(&format!("Short line {i}.\n"));
    }
    let baseline = chunker.chunk(&doc, Some(ContentType::Text), &ChunkingOptions::default(), &embedder).await.unwrap();
    let adaptive_options = ChunkingOptions { adaptive_size: true, ..Default::default() };
    let adaptive = chunker.chunk(&doc, Some(ContentType::Text), &adaptive_options, &embedder).await.unwrap();
    assert!(adaptive.len() <= baseline.len());
}

#[tokio::test]
async fn parallel_refinement_preserves_document_order_above_threshold() {
    let embedder = LocalEmbeddingProvider::new(16);
    let chunker = Chunker::new();
    let mut doc = String::new();
    for i in 0..2000 {
        doc.push_str(&format!("Sentence number {i} padding the document past the parallel threshold.\n"));
    }
    assert!(doc.len() > 10_000, "fixture must exceed the parallel-eligibility threshold");

    let options = ChunkingOptions { adaptive_size: true, add_context: true, max_workers: 4, ..Default::default() };
    let chunks = chunker.chunk(&doc, Some(ContentType::Text), &options, &embedder).await.unwrap();

    assert!(chunks.len() > 1);
    for window in chunks.windows(2) {
        assert!(window[0].start <= window[1].start, "chunks must stay in document order across batches");
    }
}
