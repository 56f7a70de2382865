//! Shared test harness: a fully wired [`saga::Engine`]-equivalent built
//! directly from the public API, without going through
//! [`saga::infrastructure::config::Config`], so each integration test
//! controls its own `tempfile` root and embedding dimensionality.

use saga::chunking::ChunkingOptions;
use saga::docindex::snapshot::DebouncedWriter;
use saga::docindex::DocumentIndex;
use saga::domain::ports::{EmbeddingProvider, KnowledgeStore};
use saga::embedding::LocalEmbeddingProvider;
use saga::query::QueryEngine;
use saga::store::LocalStore;
use saga::{IngestPipeline, IngestSettings, WriteScheduler};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A harness bundling an [`IngestPipeline`] and [`QueryEngine`] sharing
/// one store and index, plus the `tempfile::TempDir` keeping their
/// backing files alive for the test's duration.
pub struct Harness {
    pub ingest: IngestPipeline,
    pub query: QueryEngine,
    pub store: Arc<dyn KnowledgeStore>,
    pub document_index: Arc<RwLock<DocumentIndex>>,
    pub scheduler: Arc<WriteScheduler>,
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
}

/// Build a harness with a default-size local embedder and an empty
/// language allowlist (accepts every language).
pub async fn harness() -> Harness {
    harness_with_allowlist(Vec::new()).await
}

/// Build a harness whose ingest pipeline only accepts `allowlist`
/// languages.
pub async fn harness_with_allowlist(allowlist: Vec<String>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KnowledgeStore> =
        Arc::new(LocalStore::open(dir.path().join("store.bin"), false).await.unwrap());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbeddingProvider::new(32));
    let document_index = Arc::new(RwLock::new(DocumentIndex::new()));
    let index_writer = Arc::new(DebouncedWriter::new());
    let scheduler = Arc::new(WriteScheduler::ready());

    let ingest = IngestPipeline::new(
        store.clone(),
        embedder.clone(),
        document_index.clone(),
        index_writer,
        scheduler.clone(),
        None,
        None,
        IngestSettings {
            language_allowlist: allowlist,
            language_confidence_threshold: 0.2,
            chunking: ChunkingOptions::default(),
            streaming_enabled: true,
            streaming_chunk_size: 64 * 1024,
            streaming_threshold: 10 * 1024 * 1024,
            tagging_enabled: false,
            data_dir: dir.path().join("data"),
            uploads_dir: dir.path().join("uploads"),
        },
    );

    let query = QueryEngine::new(store.clone(), embedder, document_index.clone(), None, 0.0, Vec::new());

    Harness { ingest, query, store, document_index, scheduler, dir }
}
