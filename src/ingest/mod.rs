//! Ingest pipeline (spec §4.F): `add_document`, `process_upload_file`,
//! `process_uploads_folder`, `delete_document`, `delete_crawl_session`,
//! `add_code_blocks`.
//!
//! Grounded on the teacher's ingestion orchestration shape — a thin
//! coordinator that calls through the chunker, the store, and the
//! in-process index in a fixed order, deferring to the write scheduler
//! when the store isn't ready yet — generalized from AST-chunk ingestion
//! to spec.md's content-hash-addressed document/chunk/code-block model.

use crate::chunking::{ChunkingOptions, Chunker, ContentType};
use crate::codeblocks::{self, ExtractedBlock};
use crate::docindex::snapshot::DebouncedWriter;
use crate::docindex::stopwords;
use crate::docindex::DocumentIndex;
use crate::domain::error::{Error, Result};
use crate::domain::ports::{EmbeddingProvider, KnowledgeStore, TagGenerator, TextExtractor};
use crate::domain::types::{
    Chunk, CodeBlock, Document, DocumentLanguage, DocumentSource, DocumentStatus, DocumentTag,
    IngestMetadata, Keyword, KeywordSource,
};
use crate::language;
use crate::scheduler::{ReadyState, WriteScheduler};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

/// File extensions `process_uploads_folder` scans for (spec §4.F).
const UPLOAD_EXTENSIONS: [&str; 3] = ["txt", "md", "pdf"];
/// Content excerpt length handed to the tag-generation prompt (spec §4.F
/// step 7).
const TAG_PROMPT_BYTES: usize = 2000;

/// The subset of [`crate::infrastructure::config::Config`] the ingest
/// pipeline needs, flattened out of its section structs by the caller
/// that assembles the engine.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// ISO 639-1 codes ingest accepts; empty accepts everything.
    pub language_allowlist: Vec<String>,
    /// Minimum detector confidence before a language counts as detected.
    pub language_confidence_threshold: f64,
    /// Chunking defaults/overrides applied to every ingested document.
    pub chunking: ChunkingOptions,
    /// Whether large uploads are read incrementally.
    pub streaming_enabled: bool,
    /// Streaming read buffer size, in bytes.
    pub streaming_chunk_size: usize,
    /// File-size threshold above which streaming is used, in bytes.
    pub streaming_threshold: usize,
    /// Whether background tag generation runs at all.
    pub tagging_enabled: bool,
    /// Directory mirrored files and document snapshots are written to.
    pub data_dir: PathBuf,
    /// Directory `process_uploads_folder` scans.
    pub uploads_dir: PathBuf,
}

/// Outcome of [`IngestPipeline::process_uploads_folder`].
#[derive(Debug, Clone, Default)]
pub struct UploadsResult {
    /// Number of files successfully turned into documents.
    pub processed: usize,
    /// One message per file that failed, `"{path}: {error}"`.
    pub errors: Vec<String>,
}

/// Outcome of [`IngestPipeline::delete_crawl_session`].
#[derive(Debug, Clone, Default)]
pub struct CrawlDeletion {
    /// Number of documents removed.
    pub deleted: usize,
    /// Per-entity failure messages collected while cascading (spec §7:
    /// deletion aggregates rather than aborting on the first failure).
    pub errors: Vec<String>,
}

/// Coordinates chunking, code-block extraction, language gating, and
/// background tag generation into the store and the in-process index.
pub struct IngestPipeline {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    document_index: Arc<RwLock<DocumentIndex>>,
    index_writer: Arc<DebouncedWriter>,
    scheduler: Arc<WriteScheduler>,
    extractor: Option<Arc<dyn TextExtractor>>,
    tag_generator: Option<Arc<dyn TagGenerator>>,
    settings: IngestSettings,
}

impl IngestPipeline {
    /// Build a pipeline. `extractor` and `tag_generator` are optional:
    /// without an extractor, PDF uploads fail with `ProviderUnavailable`;
    /// without a tag generator, tagging is silently skipped regardless
    /// of `settings.tagging_enabled`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        document_index: Arc<RwLock<DocumentIndex>>,
        index_writer: Arc<DebouncedWriter>,
        scheduler: Arc<WriteScheduler>,
        extractor: Option<Arc<dyn TextExtractor>>,
        tag_generator: Option<Arc<dyn TagGenerator>>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker: Chunker::new(),
            document_index,
            index_writer,
            scheduler,
            extractor,
            tag_generator,
            settings,
        }
    }

    /// Ingest raw content (spec §4.F steps 1-8).
    #[instrument(skip(self, content, metadata), fields(title = %title))]
    pub async fn add_document(
        &self,
        title: String,
        content: String,
        metadata: IngestMetadata,
    ) -> Result<Document> {
        let (id, content_hash) = content_id(&content);

        // Step 2: language gate. Rejection leaves the store untouched
        // (invariant 10).
        let languages = language::gate(
            &content,
            self.settings.language_confidence_threshold,
            &self.settings.language_allowlist,
        )?;

        // Step 3: existing-id shallow merge.
        if let Some(mut existing) = self.store.get_document(&id).await? {
            apply_metadata(&mut existing, &metadata);
            existing.updated_at = chrono::Utc::now();
            self.store.put_documents(vec![existing.clone()]).await?;
            if !metadata.tags.is_empty() {
                self.persist_tags(&id, &metadata.tags, false).await?;
            }
            self.reindex(&existing, None).await?;
            return Ok(existing);
        }

        // Step 4: duplicate-content safety net; the id check above
        // normally subsumes this.
        {
            let index = self.document_index.read().await;
            if let Some(duplicate_id) = index.find_duplicate_content(&content_hash) {
                if duplicate_id != id {
                    warn!(%id, %duplicate_id, "content-hash duplicate under a different id");
                }
            }
        }

        let content_type = metadata.content_type.as_deref().and_then(content_type_hint);

        // Step 5: chunk.
        let embedded_chunks = self
            .chunker
            .chunk(&content, content_type, &self.settings.chunking, self.embedder.as_ref())
            .await?;

        // Step 6: extract and embed code blocks (persisted alongside the
        // document below, preserving the document/chunks/code-blocks
        // write order spec §5 requires).
        let mut extracted = codeblocks::extract_markdown(&content);
        if content_type == Some(ContentType::Html) || looks_like_html(&content) {
            extracted.extend(codeblocks::extract_html(&content));
        }
        let extracted = codeblocks::dedupe(extracted);
        let code_blocks = self.embed_code_blocks(&id, extracted, metadata.crawl_url.clone()).await?;

        let now = chrono::Utc::now();
        let document = Document {
            id: id.clone(),
            title,
            content: content.clone(),
            content_hash,
            content_length: content.len(),
            source: metadata.source.unwrap_or(DocumentSource::Upload),
            original_filename: metadata.original_filename.clone(),
            file_extension: metadata.file_extension.clone(),
            crawl_id: metadata.crawl_id.clone(),
            crawl_url: metadata.crawl_url.clone(),
            author: metadata.author.clone(),
            description: metadata.description.clone(),
            content_type: metadata.content_type.clone(),
            created_at: now,
            updated_at: now,
            processed_at: now,
            chunks_count: embedded_chunks.len(),
            code_blocks_count: code_blocks.len(),
            status: DocumentStatus::Active,
        };

        self.store.put_documents(vec![document.clone()]).await?;

        let chunks: Vec<Chunk> = embedded_chunks
            .into_iter()
            .enumerate()
            .map(|(index, c)| Chunk {
                id: format!("{id}_chunk_{index}"),
                document_id: id.clone(),
                chunk_index: index,
                start_position: c.start,
                end_position: c.end,
                content_length: c.content.len(),
                content: c.content,
                embedding: c.embedding,
                surrounding_context: c.surrounding_context,
                semantic_topic: c.semantic_topic,
                created_at: now,
            })
            .collect();
        if !chunks.is_empty() {
            self.persist_chunks(&id, chunks).await?;
        }

        if !code_blocks.is_empty() {
            self.store.put_code_blocks(code_blocks).await?;
        }

        self.persist_languages(&id, &languages).await?;
        self.persist_keywords(&id, &document.title, &content).await?;
        if !metadata.tags.is_empty() {
            self.persist_tags(&id, &metadata.tags, false).await?;
        }

        self.reindex(&document, None).await?;

        // Step 7: background tag generation, never fatal to ingest.
        if self.settings.tagging_enabled && self.tag_generator.is_some() {
            self.spawn_tag_generation(id.clone(), content);
        }

        Ok(document)
    }

    /// Ingest an uploaded file: PDFs go through the configured
    /// [`TextExtractor`]; `.txt`/`.md` are read directly (streamed above
    /// the configured threshold). The original file is mirrored into the
    /// data directory under the resulting document id.
    #[instrument(skip(self, metadata), fields(path = %path.display()))]
    pub async fn process_upload_file(&self, path: &Path, mut metadata: IngestMetadata) -> Result<Document> {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("upload")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        metadata.original_filename = Some(filename.clone());
        metadata.file_extension = Some(extension.clone());
        metadata.source.get_or_insert(DocumentSource::Upload);

        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&filename)
            .to_string();

        let content = if extension == "pdf" {
            let extractor = self
                .extractor
                .as_ref()
                .ok_or_else(|| Error::provider_unavailable("no text extractor configured for pdf uploads"))?;
            extractor.extract(path).await?.text
        } else {
            self.read_text_file(path).await?
        };

        let document = self.add_document(title, content, metadata).await?;

        let dest = self.mirror_upload(path, &document.id, &extension).await?;
        let tags = self.store.tags_for_documents(&[document.id.clone()]).await?;
        let tag_strings = tags
            .get(&document.id)
            .map(|rows| rows.iter().map(|t| t.tag.clone()).collect())
            .unwrap_or_default();
        let mut index = self.document_index.write().await;
        index.add_document(&document, Some(dest.display().to_string()), &tag_strings);
        drop(index);
        self.index_writer.mark_dirty();

        Ok(document)
    }

    /// Scan the uploads directory for `.txt`/`.md`/`.pdf` files and
    /// ingest each one, collecting per-file errors rather than aborting.
    #[instrument(skip(self))]
    pub async fn process_uploads_folder(&self) -> Result<UploadsResult> {
        let mut result = UploadsResult::default();
        let mut entries = match tokio::fs::read_dir(&self.settings.uploads_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(result),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
                continue;
            }
            match self.process_upload_file(&path, IngestMetadata::default()).await {
                Ok(_) => result.processed += 1,
                Err(err) => result.errors.push(format!("{}: {err}", path.display())),
            }
        }
        Ok(result)
    }

    /// Delete a document and every dependent row (spec §4.F "Deletion").
    /// Returns `false` if the document did not exist.
    #[instrument(skip(self))]
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let deleted = match self.store.delete_document(id).await {
            Ok(deleted) => deleted,
            Err(Error::Cascade(failures)) => {
                warn!(%id, failures = failures.len(), "delete cascade reported per-entity failures");
                true
            }
            Err(err) => return Err(err),
        };
        if deleted {
            self.document_index.write().await.remove_document(id);
            self.index_writer.mark_dirty();
            self.scheduler.discard(id).await;
        }
        Ok(deleted)
    }

    /// Delete every document sharing `crawl_id` (spec scenario S3).
    #[instrument(skip(self))]
    pub async fn delete_crawl_session(&self, crawl_id: &str) -> Result<CrawlDeletion> {
        let ids: HashSet<String> = self.document_index.read().await.ids_for_crawl(crawl_id);

        let result = match self.store.delete_crawl_session(crawl_id).await {
            Ok(deleted) => CrawlDeletion { deleted, errors: Vec::new() },
            Err(Error::Cascade(failures)) => CrawlDeletion {
                // `delete_document` always removes the document row itself
                // before a dependent-table failure can occur, so every id
                // we saw in the index before calling in is gone from the
                // store now even though the store lost its own count.
                deleted: ids.len(),
                errors: failures.into_iter().map(|f| format!("{}: {}", f.table, f.message)).collect(),
            },
            Err(err) => return Err(err),
        };

        if !ids.is_empty() {
            let mut index = self.document_index.write().await;
            for id in &ids {
                index.remove_document(id);
            }
            drop(index);
            self.index_writer.mark_dirty();
            for id in &ids {
                self.scheduler.discard(id).await;
            }
        }
        Ok(result)
    }

    /// Extract, embed, and persist code blocks for an already-ingested
    /// document (spec §4.F `addCodeBlocks`; also used by callers outside
    /// the `add_document` flow, e.g. the crawler re-processing a page).
    pub async fn add_code_blocks(
        &self,
        document_id: &str,
        blocks: Vec<ExtractedBlock>,
        source_url: Option<String>,
    ) -> Result<usize> {
        let deduped = codeblocks::dedupe(blocks);
        let rows = self.embed_code_blocks(document_id, deduped, source_url).await?;
        let count = rows.len();
        if count == 0 {
            return Ok(0);
        }
        self.store.put_code_blocks(rows).await?;
        if let Some(mut document) = self.store.get_document(document_id).await? {
            document.code_blocks_count += count;
            document.updated_at = chrono::Utc::now();
            self.store.put_documents(vec![document]).await?;
        }
        Ok(count)
    }

    async fn embed_code_blocks(
        &self,
        document_id: &str,
        blocks: Vec<ExtractedBlock>,
        source_url: Option<String>,
    ) -> Result<Vec<CodeBlock>> {
        let mut out = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.into_iter().enumerate() {
            let embedding = self.embedder.embed(&block.content).await?;
            out.push(CodeBlock {
                id: format!("{document_id}_code_{index}"),
                document_id: document_id.to_string(),
                block_id: block.block_id,
                block_index: index,
                language: block.language,
                content_length: block.content.len(),
                content: block.content,
                embedding,
                source_url: source_url.clone(),
            });
        }
        Ok(out)
    }

    /// Write `chunks` to the store directly if it's ready, otherwise
    /// defer them in the write scheduler (spec §4.J).
    async fn persist_chunks(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<()> {
        let ready = match self.scheduler.state().await {
            ReadyState::Ready => true,
            ReadyState::Disabled => false,
            ReadyState::Initializing => self.scheduler.ensure_ready().await,
        };
        if ready {
            self.store.put_chunks(chunks).await
        } else {
            self.scheduler.enqueue(document_id.to_string(), chunks).await;
            Ok(())
        }
    }

    async fn persist_languages(&self, document_id: &str, languages: &[String]) -> Result<()> {
        let rows = languages
            .iter()
            .map(|code| DocumentLanguage { document_id: document_id.to_string(), language_code: code.clone() })
            .collect();
        self.store.put_languages(rows).await
    }

    async fn persist_keywords(&self, document_id: &str, title: &str, content: &str) -> Result<()> {
        let mut rows = keyword_rows(document_id, title, KeywordSource::Title);
        rows.extend(keyword_rows(document_id, content, KeywordSource::Content));
        if rows.is_empty() {
            return Ok(());
        }
        self.store.put_keywords(rows).await
    }

    async fn persist_tags(&self, document_id: &str, tags: &[String], is_generated: bool) -> Result<()> {
        let rows = tags
            .iter()
            .map(|tag| DocumentTag { document_id: document_id.to_string(), tag: tag.to_lowercase(), is_generated })
            .collect();
        self.store.put_tags(rows).await
    }

    async fn reindex(&self, document: &Document, path: Option<String>) -> Result<()> {
        let tags = self.store.tags_for_documents(&[document.id.clone()]).await?;
        let tag_strings: Vec<String> = tags
            .get(&document.id)
            .map(|rows| rows.iter().map(|t| t.tag.clone()).collect())
            .unwrap_or_default();
        let path = path.or_else(|| self.document_index.try_read().ok().and_then(|i| i.find_document(&document.id).map(str::to_string)));
        let mut index = self.document_index.write().await;
        index.add_document(document, path, &tag_strings);
        drop(index);
        self.index_writer.mark_dirty();
        Ok(())
    }

    async fn read_text_file(&self, path: &Path) -> Result<String> {
        let meta = tokio::fs::metadata(path).await?;
        if self.settings.streaming_enabled && meta.len() as usize > self.settings.streaming_threshold {
            let mut file = tokio::fs::File::open(path).await?;
            let mut buf = Vec::with_capacity(meta.len() as usize);
            let mut chunk = vec![0u8; self.settings.streaming_chunk_size.max(1)];
            loop {
                let n = file.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            Ok(String::from_utf8_lossy(&buf).into_owned())
        } else {
            Ok(tokio::fs::read_to_string(path).await?)
        }
    }

    async fn mirror_upload(&self, path: &Path, document_id: &str, extension: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.settings.data_dir).await?;
        let suffix = if extension.is_empty() { String::new() } else { format!(".{extension}") };
        let dest = self.settings.data_dir.join(format!("{document_id}{suffix}"));
        tokio::fs::copy(path, &dest).await?;
        Ok(dest)
    }

    /// Spawn detached background tag generation (spec §4.F step 7,
    /// §7 "tag generation runs detached and never fails the ingest").
    fn spawn_tag_generation(&self, document_id: String, content: String) {
        let Some(generator) = self.tag_generator.clone() else {
            return;
        };
        let store = self.store.clone();
        let document_index = self.document_index.clone();
        let index_writer = self.index_writer.clone();
        tokio::spawn(async move {
            let prompt = build_tag_prompt(&truncate_bytes(&content, TAG_PROMPT_BYTES));
            let response = match generator.generate(&prompt).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(%document_id, %err, "background tag generation failed");
                    return;
                }
            };
            let tags = parse_tags_response(&response);
            if tags.is_empty() {
                return;
            }
            let rows: Vec<DocumentTag> = tags
                .iter()
                .map(|tag| DocumentTag { document_id: document_id.clone(), tag: tag.clone(), is_generated: true })
                .collect();
            if let Err(err) = store.put_tags(rows).await {
                warn!(%document_id, %err, "persisting generated tags failed");
                return;
            }
            let Ok(Some(document)) = store.get_document(&document_id).await else {
                return;
            };
            let Ok(tags_by_doc) = store.tags_for_documents(std::slice::from_ref(&document_id)).await else {
                return;
            };
            let tag_strings: Vec<String> = tags_by_doc
                .get(&document_id)
                .map(|rows| rows.iter().map(|t| t.tag.clone()).collect())
                .unwrap_or_default();
            let mut index = document_index.write().await;
            let path = index.find_document(&document_id).map(str::to_string);
            index.add_document(&document, path, &tag_strings);
            drop(index);
            index_writer.mark_dirty();
        });
    }
}

fn content_id(content: &str) -> (String, String) {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let full = format!("{:x}", hasher.finalize());
    let id = full[..16].to_string();
    (id, full)
}

fn apply_metadata(document: &mut Document, metadata: &IngestMetadata) {
    if let Some(source) = metadata.source {
        document.source = source;
    }
    if metadata.crawl_id.is_some() {
        document.crawl_id = metadata.crawl_id.clone();
    }
    if metadata.crawl_url.is_some() {
        document.crawl_url = metadata.crawl_url.clone();
    }
    if metadata.author.is_some() {
        document.author = metadata.author.clone();
    }
    if metadata.description.is_some() {
        document.description = metadata.description.clone();
    }
    if metadata.content_type.is_some() {
        document.content_type = metadata.content_type.clone();
    }
    if metadata.original_filename.is_some() {
        document.original_filename = metadata.original_filename.clone();
    }
    if metadata.file_extension.is_some() {
        document.file_extension = metadata.file_extension.clone();
    }
}

fn content_type_hint(content_type: &str) -> Option<ContentType> {
    match content_type.to_lowercase().as_str() {
        "text/markdown" | "markdown" => Some(ContentType::Markdown),
        "text/html" | "html" => Some(ContentType::Html),
        "text/plain" | "text" => Some(ContentType::Text),
        "application/pdf" | "pdf" => Some(ContentType::Pdf),
        _ => None,
    }
}

fn looks_like_html(content: &str) -> bool {
    let lowered = content.to_lowercase();
    ["<html", "<body", "<div", "<pre", "<p>", "<span"].iter().any(|needle| lowered.contains(needle))
}

fn keyword_rows(document_id: &str, text: &str, source: KeywordSource) -> Vec<Keyword> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for word in stopwords::tokenize(text) {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(keyword, frequency)| Keyword { keyword, document_id: document_id.to_string(), source, frequency })
        .collect()
}

/// Truncate `s` to at most `max_bytes` bytes without splitting a UTF-8
/// code point.
fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn build_tag_prompt(excerpt: &str) -> String {
    format!(
        "Suggest 5 to 10 short topical tags for the following document excerpt. \
         Respond with a JSON array of lowercase strings and nothing else.\n\n{excerpt}"
    )
}

/// Tolerant tag-response parsing (spec §4.F step 7): a clean JSON array,
/// a bracketed substring embedded in surrounding prose, or a line-split
/// fallback.
fn parse_tags_response(raw: &str) -> Vec<String> {
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(raw.trim()) {
        return normalize_tags(tags);
    }
    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if start < end {
            if let Ok(tags) = serde_json::from_str::<Vec<String>>(&raw[start..=end]) {
                return normalize_tags(tags);
            }
        }
    }
    let tags = raw
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    normalize_tags(tags)
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_matches('"').to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    out
}
