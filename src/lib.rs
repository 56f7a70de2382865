//! A local knowledge-base engine: ingest, chunk, embed, and query
//! documents with vector and keyword retrieval.
//!
//! [`Engine`] wires every layer together from [`infrastructure::config::Config`]
//! for callers that want the batteries-included assembly; each module
//! remains independently usable behind its own port traits for callers
//! that want to swap a collaborator (a different embedding backend, a
//! remote store, ...).

pub mod chunking;
pub mod codeblocks;
pub mod docindex;
pub mod domain;
pub mod embedding;
pub mod infrastructure;
pub mod ingest;
pub mod language;
pub mod query;
pub mod reranker;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub use domain::error::{Error, Result};
pub use domain::types::*;
pub use ingest::{CrawlDeletion, IngestPipeline, IngestSettings, UploadsResult};
pub use query::{CodeBlockHit, Pagination, QueryEngine, QueryHit, QueryResponse};
pub use scheduler::{ReadyState, WriteScheduler};

use crate::docindex::snapshot::DebouncedWriter;
use crate::docindex::DocumentIndex;
use crate::domain::ports::store::DocumentFilter;
use crate::domain::ports::{EmbeddingProvider, KnowledgeStore, RerankerProvider, TagGenerator, TextExtractor};
use crate::embedding::{CachedEmbeddingProvider, HttpEmbeddingConfig, HttpEmbeddingProvider, LocalEmbeddingProvider};
use crate::infrastructure::config::Config;
use crate::store::LocalStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::warn;

/// Bundles the store, in-process index, write scheduler, ingest
/// pipeline, and query engine into one handle, and owns the background
/// tasks that keep the store and index snapshots debounced to disk.
pub struct Engine {
    /// Columnar store backing every other component.
    pub store: Arc<LocalStore>,
    /// In-process posting-list index shared by ingest and query.
    pub document_index: Arc<RwLock<DocumentIndex>>,
    /// Deferred-write coordinator for the ingest pipeline.
    pub scheduler: Arc<WriteScheduler>,
    /// Ingestion entry point.
    pub ingest: IngestPipeline,
    /// Query entry point.
    pub query: QueryEngine,
    background: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Build every component from `config`, with no external PDF/HTML
    /// extractor, tag generator, or reranker wired in.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        Self::with_collaborators(config, None, None, None).await
    }

    /// Build every component from `config`, wiring in whichever optional
    /// external collaborators the caller has available.
    pub async fn with_collaborators(
        config: &Config,
        extractor: Option<Arc<dyn TextExtractor>>,
        tag_generator: Option<Arc<dyn TagGenerator>>,
        reranker: Option<Arc<dyn RerankerProvider>>,
    ) -> Result<Self> {
        let base_dir = PathBuf::from(&config.paths.base_dir);
        let store_path = resolve_under(&base_dir, &config.paths.store_path);
        let index_path = base_dir.join("index.bin");

        let store = Arc::new(LocalStore::open(store_path, config.store.hnsw_enabled).await?);
        // The local store opens synchronously; there is no genuine
        // initialization gap for the scheduler to bridge here (spec §4.J
        // exists for stores whose open is itself async/remote).
        let scheduler = Arc::new(WriteScheduler::ready());

        let embedder = build_embedder(&config.embedding)?;
        let document_index = Arc::new(RwLock::new(
            load_or_rebuild_index(&index_path, store.as_ref()).await?,
        ));
        let index_writer = Arc::new(DebouncedWriter::new());

        let store_dyn: Arc<dyn KnowledgeStore> = store.clone();
        let ingest = IngestPipeline::new(
            store_dyn.clone(),
            embedder.clone(),
            document_index.clone(),
            index_writer.clone(),
            scheduler.clone(),
            extractor,
            tag_generator,
            IngestSettings {
                language_allowlist: config.language.accepted.clone(),
                language_confidence_threshold: config.language.confidence_threshold as f64,
                chunking: crate::chunking::ChunkingOptions {
                    max_size: config.chunking.max_size,
                    overlap: config.chunking.overlap,
                    parallel: config.chunking.parallel,
                    max_workers: config.chunking.max_workers,
                    ..Default::default()
                },
                streaming_enabled: config.streaming.enabled,
                streaming_chunk_size: config.streaming.chunk_size_bytes,
                streaming_threshold: config.streaming.threshold_bytes,
                tagging_enabled: config.tagging.enabled,
                data_dir: base_dir.join("data"),
                uploads_dir: base_dir.join("uploads"),
            },
        );

        let query = QueryEngine::new(
            store_dyn,
            embedder,
            document_index.clone(),
            reranker,
            config.query.similarity_threshold,
            config.language.default_query_languages.clone(),
        );

        let background = vec![tokio::spawn({
            let index_writer = index_writer.clone();
            let document_index = document_index.clone();
            async move { index_writer.run(&index_path, &document_index).await }
        })];

        Ok(Self { store, document_index, scheduler, ingest, query, background })
    }

    /// Force an immediate flush of the store and document-index
    /// snapshots, then stop the background debounce task. Intended for a
    /// clean shutdown; safe to skip if the process is exiting anyway.
    pub async fn shutdown(self) -> Result<()> {
        self.store.flush().await?;
        for handle in &self.background {
            handle.abort();
        }
        Ok(())
    }
}

fn resolve_under(base_dir: &Path, relative: &str) -> PathBuf {
    let candidate = PathBuf::from(relative);
    if candidate.is_absolute() {
        candidate
    } else {
        base_dir.join(candidate)
    }
}

fn build_embedder(config: &infrastructure::config::EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let inner: Box<dyn EmbeddingProvider> = match config.provider.as_str() {
        "http" => Box::new(HttpEmbeddingProvider::new(HttpEmbeddingConfig {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimensions: config.dimensions,
            timeout: Duration::from_secs(30),
        })?),
        other => {
            if other != "local" {
                warn!(provider = %other, "unknown embedding provider, falling back to local");
            }
            Box::new(LocalEmbeddingProvider::new(config.dimensions))
        }
    };
    Ok(Arc::new(CachedEmbeddingProvider::new(inner, config.cache_size)))
}

/// Load the persisted index snapshot, or rebuild it from the store's
/// documents if the snapshot is missing (startup path for a store that
/// already has data but whose index file was deleted or never written).
/// Mirrored file paths are not recoverable this way since the store
/// itself doesn't retain them; only the store's documents, content
/// hashes, and tags are reindexed.
async fn load_or_rebuild_index(index_path: &Path, store: &LocalStore) -> Result<DocumentIndex> {
    if let Some(index) = crate::docindex::snapshot::load(index_path).await? {
        return Ok(index);
    }

    let (first_page, total) = store
        .list_documents(&DocumentFilter::default(), 0, 1)
        .await?;
    if total == 0 {
        return Ok(DocumentIndex::new());
    }
    let (documents, _) = if total <= first_page.len() {
        (first_page, total)
    } else {
        store.list_documents(&DocumentFilter::default(), 0, total).await?
    };

    let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
    let tags_by_doc = store.tags_for_documents(&ids).await?;
    let mut index = DocumentIndex::new();
    for document in &documents {
        let tags: Vec<String> = tags_by_doc
            .get(&document.id)
            .map(|rows| rows.iter().map(|t| t.tag.clone()).collect())
            .unwrap_or_default();
        index.add_document(document, None, &tags);
    }
    Ok(index)
}
