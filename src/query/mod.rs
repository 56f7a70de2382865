//! Query engine (spec §4.G): vector-first retrieval, per-document score
//! aggregation, keyword fallback, optional reranking, and post-join
//! metadata filtering.

use crate::domain::error::{Error, Result};
use crate::domain::ports::{EmbeddingProvider, KnowledgeStore, RerankOptions, RerankerProvider};
use crate::domain::types::{Document, DocumentTag, QueryFilters, QueryOptions, QueryScope, MAX_QUERY_LIMIT};
use crate::docindex::DocumentIndex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

/// Default score attached to keyword-fallback hits (spec §4.G step 7).
const KEYWORD_FALLBACK_SCORE: f32 = 0.5;
/// Default per-document-scope result ceiling (spec §4.G "Per-document
/// scope" paragraph).
const DEFAULT_DOCUMENT_SCOPE_LIMIT: usize = 10;

/// One ranked document in a [`QueryResponse`].
#[derive(Debug, Clone)]
pub struct QueryHit {
    /// The matched document.
    pub document: Document,
    /// Aggregated similarity score in `[0, 1]`.
    pub score: f32,
    /// Number of chunks that contributed to `score`.
    pub chunks_count: usize,
    /// Tags, if `include_metadata` was requested.
    pub tags: Vec<String>,
    /// Language codes, if `include_metadata` was requested.
    pub languages: Vec<String>,
}

/// Pagination envelope for a [`QueryResponse`] (spec §4.G step 10,
/// invariant 7).
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Count of documents surviving filtering and the similarity
    /// threshold (the post-filter count, per spec §9's fix to the
    /// source's inconsistent field).
    pub total_documents: usize,
    /// Whether another page exists beyond this one.
    pub has_more: bool,
    /// Offset of the next page, if `has_more`.
    pub next_offset: Option<usize>,
}

/// Result of [`QueryEngine::query`].
#[derive(Debug, Clone)]
pub struct QueryResponse {
    /// This page's hits, already sliced to `(offset, limit)`.
    pub results: Vec<QueryHit>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

/// One code-block search hit, grouped by language variant.
#[derive(Debug, Clone)]
pub struct CodeBlockHit {
    /// The matched code block.
    pub block: crate::domain::types::CodeBlock,
    /// Similarity score in `[0, 1]`.
    pub score: f32,
}

struct Candidate {
    document_id: String,
    scores: Vec<f32>,
    from_keyword_fallback: bool,
}

/// Vector-first query engine over a [`KnowledgeStore`], an in-process
/// [`DocumentIndex`] for keyword fallback, and optional reranking.
pub struct QueryEngine {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    document_index: Arc<RwLock<DocumentIndex>>,
    reranker: Option<Arc<dyn RerankerProvider>>,
    similarity_threshold: f32,
    default_query_languages: Vec<String>,
    document_scope_limit: usize,
}

impl QueryEngine {
    /// Build a query engine. `document_scope_limit` bounds `scope =
    /// Document(_)` queries (spec §4.G, config default 10).
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        document_index: Arc<RwLock<DocumentIndex>>,
        reranker: Option<Arc<dyn RerankerProvider>>,
        similarity_threshold: f32,
        default_query_languages: Vec<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            document_index,
            reranker,
            similarity_threshold,
            default_query_languages,
            document_scope_limit: DEFAULT_DOCUMENT_SCOPE_LIMIT,
        }
    }

    /// Run one query end to end (spec §4.G algorithm, steps 1-10).
    #[instrument(skip(self, options), fields(limit = options.limit, offset = options.offset))]
    pub async fn query(&self, text: &str, mut options: QueryOptions) -> Result<QueryResponse> {
        let document_id = match &options.scope {
            QueryScope::Global => None,
            QueryScope::Document(id) => {
                if id.is_empty() {
                    return Err(Error::validation("scope=document requires a non-empty document_id"));
                }
                options.limit = options.limit.min(self.document_scope_limit);
                Some(id.clone())
            }
        };
        options.limit = options.limit.clamp(1, MAX_QUERY_LIMIT);
        if options.filters.languages.is_empty() {
            options.filters.languages = self.default_query_languages.clone();
        }

        // Step 1: candidate pool size.
        let pool_size = if options.use_reranking {
            5 * (options.limit + options.offset)
        } else {
            options.limit + options.offset + 10
        };

        // Step 2: embed the query.
        let query_embedding = self.embedder.embed(text).await?;

        // Step 3: vector search over chunks.
        let hits = self
            .store
            .search_chunks(&query_embedding, pool_size, document_id.as_deref())
            .await?;

        // Step 4: aggregate per document (mean score, chunk count).
        let mut aggregated: HashMap<String, Candidate> = HashMap::new();
        for hit in hits {
            let similarity = to_similarity(hit.distance);
            let entry = aggregated.entry(hit.document_id.clone()).or_insert_with(|| Candidate {
                document_id: hit.document_id.clone(),
                scores: Vec::new(),
                from_keyword_fallback: false,
            });
            entry.scores.push(similarity);
        }
        let mut candidates: Vec<Candidate> = aggregated.into_values().collect();

        // Step 5: drop below threshold.
        candidates.retain(|c| mean(&c.scores) >= self.similarity_threshold);

        // Step 6: sort descending by aggregated score.
        candidates.sort_by(|a, b| mean(&b.scores).partial_cmp(&mean(&a.scores)).unwrap_or(std::cmp::Ordering::Equal));

        // Step 7: keyword fallback augmentation.
        let floor = (options.limit / 2).max(1);
        if candidates.len() < floor && document_id.is_none() {
            let index = self.document_index.read().await;
            let existing: HashSet<String> = candidates.iter().map(|c| c.document_id.clone()).collect();
            for id in index.search_by_combined_criteria(text) {
                if existing.contains(&id) {
                    continue;
                }
                candidates.push(Candidate {
                    document_id: id,
                    scores: vec![KEYWORD_FALLBACK_SCORE],
                    from_keyword_fallback: true,
                });
            }
        }

        // Step 8: optional reranking. Failure is never fatal to the
        // query (spec §4.B, §7) — the pre-rerank ordering survives.
        if options.use_reranking && self.reranker.is_some() {
            if let Err(err) = self.rerank_in_place(text, &mut candidates, options.limit + options.offset).await {
                warn!(%err, "rerank failed, keeping pre-rerank ordering");
            }
        }

        // Step 9: fetch metadata, apply post-join filters.
        let document_ids: Vec<String> = candidates.iter().map(|c| c.document_id.clone()).collect();
        let tags_by_doc = self.store.tags_for_documents(&document_ids).await?;
        let languages_by_doc = self.store.languages_for_documents(&document_ids).await?;

        let mut filtered = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(document) = self.store.get_document(&candidate.document_id).await? else {
                continue;
            };
            let tags: Vec<String> = tags_by_doc
                .get(&candidate.document_id)
                .map(|rows: &Vec<DocumentTag>| rows.iter().map(|t| t.tag.clone()).collect())
                .unwrap_or_default();
            let languages = languages_by_doc.get(&candidate.document_id).cloned().unwrap_or_default();
            if !passes_filters(&document, &tags, &languages, &options.filters) {
                continue;
            }
            filtered.push(QueryHit {
                document,
                score: mean(&candidate.scores).clamp(0.0, 1.0),
                chunks_count: if candidate.from_keyword_fallback { 0 } else { candidate.scores.len() },
                tags: if options.include_metadata { tags } else { Vec::new() },
                languages: if options.include_metadata { languages } else { Vec::new() },
            });
        }

        // Step 10: paginate.
        let total_documents = filtered.len();
        let has_more = options.offset + options.limit < total_documents;
        let results: Vec<QueryHit> = filtered.into_iter().skip(options.offset).take(options.limit).collect();

        Ok(QueryResponse {
            results,
            pagination: Pagination {
                total_documents,
                has_more,
                next_offset: has_more.then_some(options.offset + options.limit),
            },
        })
    }

    async fn rerank_in_place(&self, text: &str, candidates: &mut Vec<Candidate>, top_k: usize) -> Result<()> {
        let Some(reranker) = &self.reranker else {
            return Ok(());
        };
        let mut documents = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter() {
            let content = match self.store.get_document(&candidate.document_id).await? {
                Some(doc) => doc.content,
                None => String::new(),
            };
            documents.push(content);
        }
        let hits = reranker
            .rerank(text, &documents, RerankOptions { top_k, max_candidates: documents.len() })
            .await?;
        let mut reordered = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(candidate) = candidates.get(hit.index) {
                reordered.push(Candidate {
                    document_id: candidate.document_id.clone(),
                    scores: vec![hit.score.clamp(0.0, 1.0)],
                    from_keyword_fallback: candidate.from_keyword_fallback,
                });
            }
        }
        *candidates = reordered;
        Ok(())
    }

    /// Vector search scoped to the code_blocks table (spec §4.G
    /// "Code-block search"), optionally filtered by language.
    #[instrument(skip(self))]
    pub async fn search_code_blocks(
        &self,
        text: &str,
        limit: usize,
        language: Option<&str>,
    ) -> Result<Vec<CodeBlockHit>> {
        let limit = limit.clamp(1, MAX_QUERY_LIMIT);
        let query_embedding = self.embedder.embed(text).await?;
        let hits = self.store.search_code_blocks(&query_embedding, limit, language).await?;
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let blocks = self.store.code_blocks_for_document(&hit.document_id).await?;
            if let Some(block) = blocks.into_iter().find(|b| b.id == hit.row_id) {
                out.push(CodeBlockHit { block, score: to_similarity(hit.distance) });
            }
        }
        Ok(out)
    }

    /// All code blocks for one document, grouped by `block_id` (spec
    /// §4.H, `get_code_blocks` tool).
    pub async fn code_blocks_for_document(
        &self,
        document_id: &str,
    ) -> Result<HashMap<String, Vec<crate::domain::types::CodeBlock>>> {
        let blocks = self.store.code_blocks_for_document(document_id).await?;
        let mut grouped: HashMap<String, Vec<crate::domain::types::CodeBlock>> = HashMap::new();
        for block in blocks {
            grouped.entry(block.block_id.clone()).or_default().push(block);
        }
        Ok(grouped)
    }
}

/// `s = (2 - distance) / 2`, clamped to `[0, 1]` (spec §4.G "Scores").
fn to_similarity(distance: f32) -> f32 {
    ((2.0 - distance) / 2.0).clamp(0.0, 1.0)
}

fn mean(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f32>() / scores.len() as f32
}

fn passes_filters(document: &Document, tags: &[String], languages: &[String], filters: &QueryFilters) -> bool {
    if !filters.tags.is_empty() && !filters.tags.iter().any(|t| tags.contains(t)) {
        return false;
    }
    if let Some(source) = &filters.source {
        if format!("{:?}", document.source).to_lowercase() != source.to_lowercase() {
            return false;
        }
    }
    if let Some(crawl_id) = &filters.crawl_id {
        if document.crawl_id.as_deref() != Some(crawl_id.as_str()) {
            return false;
        }
    }
    if let Some(author) = &filters.author {
        if document.author.as_deref() != Some(author.as_str()) {
            return false;
        }
    }
    if let Some(content_type) = &filters.content_type {
        if document.content_type.as_deref() != Some(content_type.as_str()) {
            return false;
        }
    }
    if !filters.languages.is_empty() {
        let accepts_unknown = filters.languages.iter().any(|l| l == "unknown");
        let matches = filters.languages.iter().any(|l| languages.contains(l)) || (accepts_unknown && languages.is_empty());
        if !matches {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{DocumentSource, DocumentStatus};
    use crate::embedding::local::LocalEmbeddingProvider;
    use crate::store::LocalStore;
    use chrono::Utc;

    fn metadata_doc(id: &str, title: &str, content: &str) -> Document {
        let now = Utc::now();
        Document {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            content_hash: format!("hash-{id}"),
            content_length: content.len(),
            source: DocumentSource::Upload,
            original_filename: None,
            file_extension: None,
            crawl_id: None,
            crawl_url: None,
            author: None,
            description: None,
            content_type: None,
            created_at: now,
            updated_at: now,
            processed_at: now,
            chunks_count: 1,
            code_blocks_count: 0,
            status: DocumentStatus::Active,
        }
    }

    fn chunk_for(doc_id: &str, content: &str, vector: Vec<f32>) -> crate::domain::types::Chunk {
        crate::domain::types::Chunk {
            id: format!("{doc_id}_chunk_0"),
            document_id: doc_id.into(),
            chunk_index: 0,
            start_position: 0,
            end_position: content.len(),
            content: content.into(),
            content_length: content.len(),
            embedding: crate::domain::types::Embedding { vector, model: "t".into() },
            surrounding_context: None,
            semantic_topic: None,
            created_at: Utc::now(),
        }
    }

    async fn engine_with_docs() -> QueryEngine {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn KnowledgeStore> = Arc::new(LocalStore::open(dir.path().join("s.bin"), false).await.unwrap());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbeddingProvider::new(32));

        for i in 0..15 {
            let id = format!("d{i}");
            store.put_documents(vec![metadata_doc(&id, &format!("Document {i}"), "testing pagination content")]).await.unwrap();
            let emb = embedder.embed("testing pagination content").await.unwrap();
            store.put_chunks(vec![chunk_for(&id, "testing pagination content", emb.vector)]).await.unwrap();
        }

        QueryEngine::new(store, embedder, Arc::new(RwLock::new(DocumentIndex::new())), None, 0.0, Vec::new())
    }

    #[tokio::test]
    async fn pagination_reports_has_more_and_next_offset() {
        let engine = engine_with_docs().await;
        let opts = QueryOptions { limit: 5, offset: 0, ..Default::default() };
        let page1 = engine.query("testing pagination", opts).await.unwrap();
        assert_eq!(page1.results.len(), 5);
        assert!(page1.pagination.has_more);
        assert_eq!(page1.pagination.next_offset, Some(5));

        let page3 = engine
            .query("testing pagination", QueryOptions { limit: 5, offset: 10, ..Default::default() })
            .await
            .unwrap();
        assert!(page3.results.len() <= 5);

        let page_out_of_range = engine
            .query("testing pagination", QueryOptions { limit: 5, offset: 100, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page_out_of_range.results.len(), 0);
        assert!(!page_out_of_range.pagination.has_more);
        assert_eq!(page_out_of_range.pagination.next_offset, None);
    }

    #[tokio::test]
    async fn scores_are_always_within_unit_range() {
        let engine = engine_with_docs().await;
        let response = engine
            .query("testing pagination", QueryOptions { limit: 20, ..Default::default() })
            .await
            .unwrap();
        for hit in &response.results {
            assert!((0.0..=1.0).contains(&hit.score));
        }
    }

    #[tokio::test]
    async fn document_scope_without_id_is_rejected() {
        let engine = engine_with_docs().await;
        let opts = QueryOptions { scope: QueryScope::Document(String::new()), ..Default::default() };
        let result = engine.query("anything", opts).await;
        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn document_scope_restricts_search_to_one_document() {
        let engine = engine_with_docs().await;
        let opts = QueryOptions { scope: QueryScope::Document("d3".into()), limit: 10, ..Default::default() };
        let response = engine.query("testing pagination", opts).await.unwrap();
        assert!(response.results.iter().all(|r| r.document.id == "d3"));
    }
}
