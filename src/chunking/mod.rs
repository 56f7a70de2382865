//! Content-type-aware recursive chunker (spec §4.E).
//!
//! Breaks a document's raw text into embedded, positionally-addressable
//! [`EmbeddedChunk`]s. Grounded on the teacher's chunking module
//! (`domain/chunking/`) for its overall shape — a detector feeding a
//! recursive splitter feeding refinement passes — generalized from
//! per-language AST extraction to the content-type-aware text splitting
//! spec.md calls for.

pub mod content_type;
pub mod context;
pub mod mixed;
pub mod semantic;
pub mod separators;
pub mod splitter;

pub use content_type::{default_budget, detect_content_type, ContentType};
pub use splitter::RawChunk;

use crate::domain::error::Result;
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::Embedding;
use separators::{guess_code_language, separators_for};

/// Documents larger than this many bytes become eligible for batch
/// parallelism in the refinement/enrichment passes (spec §4.E).
const PARALLEL_THRESHOLD_BYTES: usize = 10_000;

/// A chunk that has been split, embedded, and (optionally) refined and
/// enriched, but not yet assigned a document id / dense chunk index —
/// that's [`crate::ingest`]'s job once it knows the owning document.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    /// Start byte offset into the parent document (excludes overlap).
    pub start: usize,
    /// End byte offset into the parent document.
    pub end: usize,
    /// Chunk text, possibly with an overlap prefix.
    pub content: String,
    /// Unit-norm embedding of `content`.
    pub embedding: Embedding,
    /// Nearest heading + neighbor preview, if `add_context` was set.
    pub surrounding_context: Option<String>,
    /// Topic label carried through a semantic merge, if any.
    pub semantic_topic: Option<String>,
}

/// Options controlling one chunking pass (spec §4.E).
#[derive(Debug, Clone)]
pub struct ChunkingOptions {
    /// Override the per-content-type default max chunk size, in bytes.
    pub max_size: Option<usize>,
    /// Override the per-content-type default overlap, in bytes.
    pub overlap: Option<usize>,
    /// Trailing chunks under this size are merged into their predecessor.
    pub min_size: usize,
    /// Run the semantic merge refinement pass.
    pub adaptive_size: bool,
    /// Attach heading/neighbor context metadata to each chunk.
    pub add_context: bool,
    /// Allow batch parallelism for documents over the size threshold.
    pub parallel: bool,
    /// Number of concurrent batches when parallelism is used.
    pub max_workers: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_size: None,
            overlap: None,
            min_size: 50,
            adaptive_size: false,
            add_context: false,
            parallel: true,
            max_workers: 4,
        }
    }
}

/// Content-type-aware recursive chunker.
#[derive(Debug, Default, Clone, Copy)]
pub struct Chunker;

impl Chunker {
    /// Construct a new chunker. Stateless; safe to share across tasks.
    pub fn new() -> Self {
        Self
    }

    /// Chunk `content`, embedding every chunk with `embedder`.
    ///
    /// `content_type` overrides detection (e.g. the ingest pipeline
    /// already knows a file came from the PDF extractor).
    pub async fn chunk(
        &self,
        content: &str,
        content_type: Option<ContentType>,
        options: &ChunkingOptions,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<EmbeddedChunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }
        let content_type = content_type.unwrap_or_else(|| detect_content_type(content));

        let raw = if content_type == ContentType::Mixed {
            self.split_mixed(content, options)
        } else {
            let (default_max, default_overlap) = default_budget(content_type);
            let max_size = options.max_size.unwrap_or(default_max);
            let overlap = options.overlap.unwrap_or(default_overlap);
            let lang_hint = (content_type == ContentType::Code).then(|| guess_code_language(content));
            let seps = separators_for(content_type, lang_hint);
            splitter::split(content, &seps, max_size, options.min_size, overlap)
        };

        // "Initial chunks are created sequentially" (spec §4.E) — embedding
        // always happens in document order, never across batches.
        let mut embedded = self.embed_sequential(raw, embedder).await?;

        let max_size = options.max_size.unwrap_or_else(|| default_budget(content_type).0);
        if content.len() > PARALLEL_THRESHOLD_BYTES && options.parallel && embedded.len() > 1 {
            embedded = self
                .refine_in_parallel(embedded, content, content_type, max_size, options, embedder)
                .await?;
        } else {
            if options.adaptive_size {
                embedded = semantic::merge_similar(embedded, max_size, embedder).await?;
            }
            if options.add_context {
                context::enrich(content, content_type, &mut embedded);
            }
        }
        Ok(embedded)
    }

    fn split_mixed(&self, content: &str, options: &ChunkingOptions) -> Vec<RawChunk> {
        let mut all = Vec::new();
        for section in mixed::split_sections(content) {
            let (default_max, default_overlap) = default_budget(section.content_type);
            let max_size = options.max_size.unwrap_or(default_max);
            let overlap = options.overlap.unwrap_or(default_overlap);
            let seps = separators_for(section.content_type, section.language_hint.as_deref());
            let sub = &content[section.start..section.end];
            for chunk in splitter::split(sub, &seps, max_size, options.min_size, overlap) {
                all.push(RawChunk {
                    start: chunk.start + section.start,
                    end: chunk.end + section.start,
                    content: chunk.content,
                });
            }
        }
        all
    }

    async fn embed_sequential(
        &self,
        raw: Vec<RawChunk>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<EmbeddedChunk>> {
        let mut out = Vec::with_capacity(raw.len());
        for chunk in raw {
            let embedding = embedder.embed(&chunk.content).await?;
            out.push(EmbeddedChunk {
                start: chunk.start,
                end: chunk.end,
                content: chunk.content,
                embedding,
                surrounding_context: None,
                semantic_topic: None,
            });
        }
        Ok(out)
    }

    /// Partition `chunks` into `options.max_workers` batches and run the
    /// refinement (`adaptive_size`) and enrichment (`add_context`)
    /// passes per-batch concurrently, preserving batch order on merge.
    async fn refine_in_parallel(
        &self,
        chunks: Vec<EmbeddedChunk>,
        content: &str,
        content_type: ContentType,
        max_size: usize,
        options: &ChunkingOptions,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<EmbeddedChunk>> {
        let batches = partition(chunks, options.max_workers.max(1));
        let futures_iter = batches.into_iter().map(|mut batch| async move {
            if options.adaptive_size {
                batch = semantic::merge_similar(batch, max_size, embedder).await?;
            }
            if options.add_context {
                context::enrich(content, content_type, &mut batch);
            }
            Result::Ok(batch)
        });
        let results = futures::future::try_join_all(futures_iter).await?;
        Ok(results.into_iter().flatten().collect())
    }
}

/// Split `items` into at most `workers` contiguous, order-preserving
/// batches of roughly equal size.
fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let workers = workers.max(1).min(items.len());
    let batch_size = items.len().div_ceil(workers);
    let mut batches = Vec::with_capacity(workers);
    let mut iter = items.into_iter();
    loop {
        let batch: Vec<T> = iter.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }
    batches
}
