//! Core domain entities: documents, chunks, code blocks, and the metadata
//! that rides alongside them.
//!
//! These mirror the columnar tables the store persists (see
//! [`crate::store`]) and the rows the in-process [`crate::docindex`] keeps
//! a derived view over.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a document's content originated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    /// Submitted directly through `add_document` or an uploaded file.
    Upload,
    /// Produced by the web crawler.
    Crawl,
    /// Submitted programmatically through an API integration.
    Api,
}

/// Lifecycle status of a document row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Visible to ingest, query, and the document index.
    Active,
    /// Soft-deleted; retained only until cascade cleanup runs.
    Deleted,
}

/// Known metadata fields a caller can attach to a document at ingest time.
///
/// Closed struct for the fields spec.md names explicitly; `extra` is the
/// forward-compatibility escape hatch for anything else (see DESIGN NOTES
/// "Dynamic metadata bags").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestMetadata {
    /// Logical source of the content.
    #[serde(default)]
    pub source: Option<DocumentSource>,
    /// Groups documents ingested by one crawl session.
    #[serde(default)]
    pub crawl_id: Option<String>,
    /// URL the content was crawled from, if any.
    #[serde(default)]
    pub crawl_url: Option<String>,
    /// Author attribution, if known.
    #[serde(default)]
    pub author: Option<String>,
    /// Short human-authored description.
    #[serde(default)]
    pub description: Option<String>,
    /// MIME-ish content type hint (`text/markdown`, `text/html`, ...).
    #[serde(default)]
    pub content_type: Option<String>,
    /// User-supplied tags, lowercased and deduplicated at ingest.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tags produced by background LLM tag generation.
    #[serde(default)]
    pub tags_generated: Vec<String>,
    /// Original filename, for uploaded files.
    #[serde(default)]
    pub original_filename: Option<String>,
    /// Original file extension, for uploaded files.
    #[serde(default)]
    pub file_extension: Option<String>,
    /// Forward-compatibility bag for fields this struct doesn't name yet.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl IngestMetadata {
    /// Shallow-merge `other` into `self`: any field `other` sets
    /// overwrites `self`'s value; `tags`/`tags_generated`/`extra` are
    /// unioned rather than replaced wholesale.
    pub fn merge(&mut self, other: IngestMetadata) {
        if other.source.is_some() {
            self.source = other.source;
        }
        if other.crawl_id.is_some() {
            self.crawl_id = other.crawl_id;
        }
        if other.crawl_url.is_some() {
            self.crawl_url = other.crawl_url;
        }
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.content_type.is_some() {
            self.content_type = other.content_type;
        }
        if other.original_filename.is_some() {
            self.original_filename = other.original_filename;
        }
        if other.file_extension.is_some() {
            self.file_extension = other.file_extension;
        }
        for tag in other.tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        for tag in other.tags_generated {
            if !self.tags_generated.contains(&tag) {
                self.tags_generated.push(tag);
            }
        }
        self.extra.extend(other.extra);
    }
}

/// A document row: the unit of ingestion and deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Content-derived id: first 16 hex chars of `sha256(content)`.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Raw ingested text.
    pub content: String,
    /// Deduplication key; equal to `id`'s full-length source hash.
    pub content_hash: String,
    /// Byte length of `content`.
    pub content_length: usize,
    /// Where the content came from.
    pub source: DocumentSource,
    /// Original filename, for uploaded files.
    pub original_filename: Option<String>,
    /// Original file extension, for uploaded files.
    pub file_extension: Option<String>,
    /// Crawl session id, if crawled.
    pub crawl_id: Option<String>,
    /// Source URL, if crawled.
    pub crawl_url: Option<String>,
    /// Author attribution.
    pub author: Option<String>,
    /// Short description.
    pub description: Option<String>,
    /// Content-type hint.
    pub content_type: Option<String>,
    /// ISO-8601 UTC creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// ISO-8601 UTC last-update timestamp.
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// ISO-8601 UTC timestamp of the ingest pipeline finishing processing.
    pub processed_at: chrono::DateTime<chrono::Utc>,
    /// Number of persisted chunks for this document.
    pub chunks_count: usize,
    /// Number of persisted code blocks for this document.
    pub code_blocks_count: usize,
    /// Lifecycle status.
    pub status: DocumentStatus,
}

/// (`document_id`, `tag`) association row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocumentTag {
    /// Owning document id.
    pub document_id: String,
    /// Lowercased tag text.
    pub tag: String,
    /// Whether the tag was produced by background generation rather than
    /// supplied by the caller.
    pub is_generated: bool,
}

/// (`document_id`, `language_code`) association row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocumentLanguage {
    /// Owning document id.
    pub document_id: String,
    /// ISO 639-1 code, or `"unknown"`.
    pub language_code: String,
}

/// A fixed-dimension, unit-normalized embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    /// The vector values.
    pub vector: Vec<f32>,
    /// Name of the model that produced this vector.
    pub model: String,
}

impl Embedding {
    /// Dimensionality of this embedding.
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// Euclidean (L2) norm of the vector.
    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Cosine distance `1 - cos(a, b)` between two embeddings of equal
    /// dimension. Assumes both vectors are already unit-normalized.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        let dot: f32 = self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| a * b)
            .sum();
        1.0 - dot.clamp(-1.0, 1.0)
    }
}

/// A contiguous, embedded slice of a document's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `{document_id}_chunk_{index}`.
    pub id: String,
    /// Owning document id.
    pub document_id: String,
    /// 0-based, dense index among this document's chunks.
    pub chunk_index: usize,
    /// Half-open start byte-offset into the parent content.
    pub start_position: usize,
    /// Half-open end byte-offset into the parent content (`end > start`).
    pub end_position: usize,
    /// Chunk text, possibly including an overlap prefix from the previous
    /// chunk.
    pub content: String,
    /// Byte length of `content`.
    pub content_length: usize,
    /// Unit-norm embedding of `content`.
    pub embedding: Embedding,
    /// Nearest preceding heading and neighbor preview, if context
    /// enrichment was requested.
    pub surrounding_context: Option<String>,
    /// Short topic label assigned during semantic merge, if adaptive
    /// sizing was requested.
    pub semantic_topic: Option<String>,
    /// ISO-8601 UTC creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A language-tagged code snippet, indexed separately from prose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeBlock {
    /// Unique id for this variant.
    pub id: String,
    /// Owning document id.
    pub document_id: String,
    /// Groups language variants of the same logical block.
    pub block_id: String,
    /// 0-based index among this document's code blocks.
    pub block_index: usize,
    /// Normalized language tag, or `"unknown"`.
    pub language: String,
    /// Raw code text.
    pub content: String,
    /// Byte length of `content`.
    pub content_length: usize,
    /// Unit-norm embedding of `content`.
    pub embedding: Embedding,
    /// Source URL the block was extracted from, if crawled HTML.
    pub source_url: Option<String>,
}

/// A keyword occurrence used by keyword-fallback ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Keyword {
    /// Lowercased, stem-free keyword text.
    pub keyword: String,
    /// Owning document id.
    pub document_id: String,
    /// Which field the keyword was extracted from.
    pub source: KeywordSource,
    /// Number of occurrences.
    pub frequency: u32,
}

/// Which document field a [`Keyword`] row was extracted from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KeywordSource {
    /// Extracted from the document title.
    Title,
    /// Extracted from the document content.
    Content,
}

/// The store's single schema-version row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaVersion {
    /// Current schema version.
    pub version: u32,
    /// When this version was applied (unix seconds).
    pub applied_at: i64,
}

/// The store's current on-disk schema version. Bump when the columnar
/// layout changes in a way old data cannot read forward.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Default and ceiling for [`QueryOptions::limit`] (spec §4.G).
pub const DEFAULT_QUERY_LIMIT: usize = 10;
/// Maximum results a single query may request.
pub const MAX_QUERY_LIMIT: usize = 200;

/// Whether a query searches the whole corpus or one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// Search every active document.
    Global,
    /// Restrict vector search to chunks of this document id.
    Document(String),
}

impl Default for QueryScope {
    fn default() -> Self {
        Self::Global
    }
}

/// Post-join metadata filters applied after vector search (spec §4.G
/// step 9; see spec §9 Open Questions for why this is post-join rather
/// than pushed down to the store).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    /// Document must have at least one of these tags.
    pub tags: Vec<String>,
    /// Document source must equal this value.
    pub source: Option<String>,
    /// Document crawl_id must equal this value.
    pub crawl_id: Option<String>,
    /// Document author must equal this value.
    pub author: Option<String>,
    /// Document content_type must equal this value.
    pub content_type: Option<String>,
    /// Document must have at least one language in this set, or (if the
    /// set contains `"unknown"`) no recorded language at all. Empty
    /// means "apply the engine's configured default query languages".
    pub languages: Vec<String>,
}

/// Options controlling one [`crate::query::QueryEngine::query`] call
/// (spec §4.G).
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum results to return. Clamped to `[1, `[`MAX_QUERY_LIMIT`]`]`.
    pub limit: usize,
    /// Number of leading results to skip.
    pub offset: usize,
    /// Whether to fetch and attach tags/languages to each result.
    pub include_metadata: bool,
    /// Post-join metadata filters.
    pub filters: QueryFilters,
    /// Whether to invoke the reranker on the candidate pool.
    pub use_reranking: bool,
    /// Global search or scoped to one document.
    pub scope: QueryScope,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
            include_metadata: true,
            filters: QueryFilters::default(),
            use_reranking: false,
            scope: QueryScope::Global,
        }
    }
}
