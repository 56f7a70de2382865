//! Error taxonomy shared across every layer of the engine.

use thiserror::Error;

/// Result type alias for fallible engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-entity failure recorded while a cascading delete runs to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeFailure {
    /// Name of the dependent table the delete was applied to.
    pub table: String,
    /// Human-readable description of what went wrong.
    pub message: String,
}

/// Stable error taxonomy for the knowledge-base engine (see spec §7).
#[derive(Error, Debug)]
pub enum Error {
    /// Store or index used before it finished initializing.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// An external provider (embedding, reranker) could not be reached.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An external call exceeded its configured deadline.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// A provider returned a response this crate could not parse.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// A request failed input validation (missing field, out-of-range
    /// limit, scope/document_id mismatch, ...).
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// An id lookup found nothing.
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the resource that was not found.
        resource: String,
    },

    /// A concurrent write conflicted with another writer; retryable.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Ingest was blocked by the language allowlist.
    #[error("language rejected: detected {detected:?}, allowed {allowed:?}")]
    LanguageRejected {
        /// Languages detected in the rejected document.
        detected: Vec<String>,
        /// The configured allowlist that rejected it.
        allowed: Vec<String>,
    },

    /// The store's on-disk schema version does not match this binary.
    #[error("schema mismatch at {path}: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Path to the store that failed the version check.
        path: String,
        /// Version this binary expects.
        expected: u32,
        /// Version actually recorded in the store.
        found: u32,
    },

    /// A cascading delete encountered per-entity failures; not fatal on
    /// its own, reported alongside whatever did succeed.
    #[error("cascade delete reported {} failures", .0.len())]
    Cascade(Vec<CascadeFailure>),

    /// Underlying filesystem error.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Generic string-based error, used at layer boundaries where no
    /// richer kind applies.
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Construct a [`Error::NotInitialized`].
    pub fn not_initialized<S: Into<String>>(what: S) -> Self {
        Self::NotInitialized(what.into())
    }

    /// Construct a [`Error::ProviderUnavailable`].
    pub fn provider_unavailable<S: Into<String>>(what: S) -> Self {
        Self::ProviderUnavailable(what.into())
    }

    /// Construct a [`Error::Malformed`].
    pub fn malformed<S: Into<String>>(what: S) -> Self {
        Self::Malformed(what.into())
    }

    /// Construct a [`Error::ValidationFailed`].
    pub fn validation<S: Into<String>>(what: S) -> Self {
        Self::ValidationFailed(what.into())
    }

    /// Construct a [`Error::NotFound`].
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Construct a [`Error::Conflict`].
    pub fn conflict<S: Into<String>>(what: S) -> Self {
        Self::Conflict(what.into())
    }

    /// Construct a generic error.
    pub fn generic<S: Into<String>>(what: S) -> Self {
        Self::Generic(what.into())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Generic(format!("configuration error: {err}"))
    }
}
