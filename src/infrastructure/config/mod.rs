//! Layered configuration (spec §6).

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    ChunkingConfig, Config, CrawlConfig, EmbeddingConfig, LanguageConfig, PathsConfig,
    QueryConfig, StoreConfig, StreamingConfig, TaggingConfig, TimeoutsConfig,
};
