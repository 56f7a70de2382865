//! Document text extraction contract (spec §1, §4.F step "PDFs via the
//! external extractor").
//!
//! The PDF and HTML extractors are genuinely external to this engine —
//! spec.md treats them as pure functions returning text, title, links,
//! and code blocks. This trait is the seam [`crate::ingest::IngestPipeline`]
//! calls through; a caller supplies a concrete implementation (a PDF
//! text-layer reader, a headless-browser HTML fetch, ...).

use crate::domain::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Plain text plus whatever structural metadata the extractor could
/// recover from the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedDocument {
    /// Extracted body text.
    pub text: String,
    /// Title, if the source format carries one (e.g. a PDF's document
    /// info dictionary, an HTML `<title>`).
    pub title: Option<String>,
    /// Links discovered in the source, if any.
    pub links: Vec<String>,
    /// Raw code blocks discovered in the source, if any (HTML
    /// `<pre><code>`; PDFs never produce these).
    pub code_blocks: Vec<String>,
}

/// `path -> (text, title, links, code blocks)`.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text and structural metadata from the file at `path`.
    async fn extract(&self, path: &Path) -> Result<ExtractedDocument>;
}
