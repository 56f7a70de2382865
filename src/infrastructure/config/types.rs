//! Configuration types (spec §6: the full env-var surface).

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Where the engine keeps its on-disk state.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PathsConfig {
    /// Base directory for all persisted state. Default `${HOME}/.saga`.
    #[validate(length(min = 1))]
    pub base_dir: String,
    /// Path to the columnar vector/metadata store, relative to `base_dir`
    /// unless absolute.
    #[validate(length(min = 1))]
    pub store_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: dirs::home_dir()
                .map(|h| h.join(".saga").display().to_string())
                .unwrap_or_else(|| ".saga".to_string()),
            store_path: "lancedb".to_string(),
        }
    }
}

/// Which embedding backend to use and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmbeddingConfig {
    /// `"local"` or `"http"`.
    #[validate(length(min = 1))]
    pub provider: String,
    /// Base URL for the HTTP provider.
    pub base_url: String,
    /// Model name passed to the HTTP provider / recorded on embeddings.
    #[validate(length(min = 1))]
    pub model: String,
    /// API key for the HTTP provider, if required.
    pub api_key: Option<String>,
    /// Vector dimensionality.
    #[validate(range(min = 1))]
    pub dimensions: usize,
    /// Number of embeddings kept in the process-wide LRU cache.
    #[validate(range(min = 1))]
    pub cache_size: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "local-trigram-hash".to_string(),
            api_key: None,
            dimensions: 256,
            cache_size: 1000,
        }
    }
}

/// Chunker defaults and overrides (spec §4.E).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChunkingConfig {
    /// Override for the content type's default max chunk size in bytes.
    pub max_size: Option<usize>,
    /// Override for the content type's default overlap in bytes.
    pub overlap: Option<usize>,
    /// Run parallel batch refinement for documents above the size
    /// threshold.
    pub parallel: bool,
    /// Worker count for parallel batch refinement.
    #[validate(range(min = 1))]
    pub max_workers: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            overlap: None,
            parallel: true,
            max_workers: 4,
        }
    }
}

/// Large-upload streaming behavior (spec §4.F).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamingConfig {
    /// Whether large uploads are read incrementally.
    pub enabled: bool,
    /// Read buffer size in bytes.
    #[validate(range(min = 1))]
    pub chunk_size_bytes: usize,
    /// File-size threshold above which streaming is used.
    #[validate(range(min = 1))]
    pub threshold_bytes: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size_bytes: 64 * 1024,
            threshold_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Background LLM tag generation (spec §4.F step 7).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct TaggingConfig {
    /// Whether background tag generation runs at all.
    pub enabled: bool,
    /// Whether generated tags are applied to query filters by default.
    pub include_in_query: bool,
}

/// HNSW toggle and size-tier parameters (spec §4.C).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    /// Whether HNSW is used above the training floor at all. When false,
    /// the flat brute-force index is used regardless of corpus size.
    pub hnsw_enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { hnsw_enabled: true }
    }
}

/// Query-time defaults (spec §4.G).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryConfig {
    /// Maximum results returned by a single query, regardless of
    /// caller-supplied `limit`.
    #[validate(range(min = 1, max = 200))]
    pub max_results: usize,
    /// Minimum similarity score `[0, 1]` a result must clear.
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity_threshold: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_results: 200,
            similarity_threshold: 0.0,
        }
    }
}

/// Language detection/allowlisting (spec §4.I).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct LanguageConfig {
    /// ISO 639-1 codes ingest accepts, or empty to accept everything.
    pub accepted: Vec<String>,
    /// Languages applied to a query when `filters.languages` is omitted.
    pub default_query_languages: Vec<String>,
    /// Minimum detector confidence before a language counts as detected.
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f32,
}

/// Per-class request timeouts, milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TimeoutsConfig {
    /// Timeout for embedding/reranker provider calls.
    #[validate(range(min = 1))]
    pub embedding_ms: u64,
    /// Timeout for a single crawl fetch.
    #[validate(range(min = 1))]
    pub crawl_ms: u64,
    /// Fallback timeout for any call not covered by a more specific
    /// class.
    #[validate(range(min = 1))]
    pub global_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            embedding_ms: 30_000,
            crawl_ms: 15_000,
            global_ms: 60_000,
        }
    }
}

/// Crawler politeness settings (crawler itself is an external
/// collaborator; this crate only carries its configuration surface).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CrawlConfig {
    /// `User-Agent` header sent to crawled origins.
    #[validate(length(min = 1))]
    pub user_agent: String,
    /// Delay between requests to the same origin, milliseconds.
    pub delay_ms: u64,
    /// Maximum response body size accepted from a crawled page.
    #[validate(range(min = 1))]
    pub max_response_bytes: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: "saga-crawler/0.1".to_string(),
            delay_ms: 250,
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Top-level configuration, assembled by [`super::loader::ConfigLoader`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct Config {
    #[validate(nested)]
    pub paths: PathsConfig,
    #[validate(nested)]
    pub embedding: EmbeddingConfig,
    #[validate(nested)]
    pub chunking: ChunkingConfig,
    #[validate(nested)]
    pub streaming: StreamingConfig,
    #[validate(nested)]
    pub tagging: TaggingConfig,
    #[validate(nested)]
    pub store: StoreConfig,
    #[validate(nested)]
    pub query: QueryConfig,
    #[validate(nested)]
    pub language: LanguageConfig,
    #[validate(nested)]
    pub timeouts: TimeoutsConfig,
    #[validate(nested)]
    pub crawl: CrawlConfig,
}
