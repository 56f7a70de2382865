//! OpenAI-compatible HTTP embedding provider.
//!
//! Targets `POST {base_url}/v1/embeddings`, the de facto wire format
//! shared by OpenAI, most self-hosted inference gateways, and local
//! runtimes like llama.cpp's server mode. Grounded on the teacher's
//! `OllamaClient` (`src/llm.rs`) for the `reqwest::Client` + timeout +
//! typed request/response shape, generalized from chat completions to
//! the embeddings endpoint.

use crate::domain::error::{Error, Result};
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::Embedding;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for [`HttpEmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct HttpEmbeddingConfig {
    /// Base URL, without a trailing slash (e.g. `https://api.openai.com`).
    pub base_url: String,
    /// Model identifier sent in each request.
    pub model: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Expected output dimensionality, used for validation.
    pub dimensions: usize,
    /// Request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: HttpEmbeddingConfig,
}

impl HttpEmbeddingProvider {
    /// Build a provider from `config`.
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::provider_unavailable(format!("building HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Embedding>> {
        let body = EmbeddingsRequest { model: &self.config.model, input };
        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.config.timeout)
            } else {
                Error::provider_unavailable(format!("embeddings request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::provider_unavailable(format!(
                "embeddings endpoint returned {status}: {text}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed(format!("decoding embeddings response: {e}")))?;

        if parsed.data.len() != input.len() {
            return Err(Error::malformed(format!(
                "expected {} embeddings, got {}",
                input.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed
            .data
            .into_iter()
            .map(|d| Embedding { vector: d.embedding, model: self.config.model.clone() })
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut out = self.request(std::slice::from_ref(&text.to_string())).await?;
        out.pop().ok_or_else(|| Error::malformed("empty embeddings response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        debug!(count = texts.len(), model = %self.config.model, "requesting batch embeddings");
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> Result<()> {
        match self.embed("health check").await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "embedding provider health check failed");
                Err(e)
            }
        }
    }
}
