//! HTTP cross-encoder reranker provider.
//!
//! No corpus repo implements reranking directly; this follows the same
//! `reqwest::Client` + typed request/response shape as
//! [`crate::embedding::http::HttpEmbeddingProvider`], pointed at a
//! `POST {base_url}/v1/rerank` endpoint (the shape Cohere- and
//! TEI-compatible rerank servers expose).

use crate::domain::error::{Error, Result};
use crate::domain::ports::reranker::{RerankHit, RerankOptions, RerankerProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Configuration for [`HttpRerankerProvider`].
#[derive(Debug, Clone)]
pub struct HttpRerankerConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Model identifier sent in each request.
    pub model: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// An [`RerankerProvider`] backed by an HTTP rerank endpoint.
pub struct HttpRerankerProvider {
    client: reqwest::Client,
    config: HttpRerankerConfig,
    ready: AtomicBool,
}

impl HttpRerankerProvider {
    /// Build a provider from `config`. Marked ready immediately; a failed
    /// rerank call degrades gracefully rather than flipping readiness off,
    /// since every call site treats rerank failure as non-fatal (spec §4.B).
    pub fn new(config: HttpRerankerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::provider_unavailable(format!("building HTTP client: {e}")))?;
        Ok(Self { client, config, ready: AtomicBool::new(true) })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/rerank", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RerankerProvider for HttpRerankerProvider {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        options: RerankOptions,
    ) -> Result<Vec<RerankHit>> {
        let candidates: &[String] = if documents.len() > options.max_candidates {
            &documents[..options.max_candidates]
        } else {
            documents
        };

        let body = RerankRequest {
            model: &self.config.model,
            query,
            documents: candidates,
            top_n: options.top_k.min(candidates.len()),
        };

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            self.ready.store(false, Ordering::Relaxed);
            if e.is_timeout() {
                Error::Timeout(self.config.timeout)
            } else {
                Error::provider_unavailable(format!("rerank request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            self.ready.store(false, Ordering::Relaxed);
            let status = response.status();
            return Err(Error::provider_unavailable(format!("rerank endpoint returned {status}")));
        }
        self.ready.store(true, Ordering::Relaxed);

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed(format!("decoding rerank response: {e}")))?;

        let mut hits: Vec<RerankHit> = parsed
            .results
            .into_iter()
            .map(|r| RerankHit { index: r.index, score: r.relevance_score })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(options.top_k);
        Ok(hits)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}
