//! Embedding providers.
//!
//! [`EmbeddingProvider`] is the seam between the vector index and whatever
//! turns text into vectors. Two implementations ship here: [`HttpEmbedder`]
//! for OpenAI-compatible `/embeddings` endpoints and [`HashingEmbedder`], a
//! deterministic offline embedder built on feature hashing.

use std::future::Future;

use lore_core::{EmbeddingConfig, LoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::keyword::tokenize;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const API_KEY_ENV: &str = "LORE_EMBEDDING_API_KEY";
const BATCH_SIZE: usize = 64;
const BATCH_DELAY_MS: u64 = 200;

/// Something that maps text to fixed-length vectors.
///
/// Implementations must return one vector per input, in input order, all of
/// the same length. The vector index checks this and rejects violations.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model.
    fn model(&self) -> &str;

    /// Embed a batch of document texts.
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LoreError>> + Send;

    /// Embed a single query.
    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LoreError>> + Send;
}

/// Client for OpenAI-compatible embedding APIs.
///
/// # Examples
///
/// ```
/// use lore_search::embedding::{EmbeddingProvider, HttpEmbedder};
///
/// let client = HttpEmbedder::new("test-key", "text-embedding-3-small");
/// assert_eq!(client.model(), "text-embedding-3-small");
/// ```
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Create a client for the default endpoint.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            dimensions: None,
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to the `LORE_EMBEDDING_API_KEY` env var if no key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Config`] if no API key is available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lore_core::EmbeddingConfig;
    /// use lore_search::embedding::HttpEmbedder;
    ///
    /// let config = EmbeddingConfig::default();
    /// let client = HttpEmbedder::with_config(&config).unwrap();
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, LoreError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or_else(|| {
                LoreError::Config(format!(
                    "embedding API key not found: set embedding.api_key in .lore.toml or {API_KEY_ENV} env var"
                ))
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model_name().to_string(),
            dimensions: Some(config.dimensions),
        })
    }

    fn request<'a>(&'a self, input: &'a [String]) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            input,
            dimensions: self.dimensions,
        }
    }

    async fn post(&self, input: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request(input))
            .send()
            .await
            .map_err(|e| LoreError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(LoreError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LoreError::Embedding(format!("failed to parse response: {e}")))?;
        Ok(into_ordered(parsed))
    }
}

/// Order response items by their `index` field when the server supplies one.
fn into_ordered(response: EmbedResponse) -> Vec<Vec<f32>> {
    let mut items = response.data;
    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
    }
    items.into_iter().map(|item| item.embedding).collect()
}

impl EmbeddingProvider for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            debug!(batch = i, size = batch.len(), "embedding batch");
            all_embeddings.extend(self.post(batch).await?);
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LoreError> {
        self.post(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LoreError::Embedding("empty response from embedding API".into()))
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Each term is hashed with SHA-256; the digest picks a bucket and a sign.
/// Texts sharing vocabulary land close together, which is enough for offline
/// use and tests.
///
/// # Examples
///
/// ```
/// use lore_search::embedding::HashingEmbedder;
///
/// let embedder = HashingEmbedder::new(64).unwrap();
/// let a = embedder.embed("install the package");
/// let b = embedder.embed("install the package");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model: String,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of length `dimensions`.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Config`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self, LoreError> {
        if dimensions == 0 {
            return Err(LoreError::Config(
                "hashing embedder needs at least one dimension".into(),
            ));
        }
        Ok(Self {
            dimensions,
            model: format!("hashing-sha256-{dimensions}"),
        })
    }

    /// Embed one text synchronously.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for term in tokenize(text) {
            let digest = Sha256::digest(term.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LoreError> {
        Ok(self.embed(text))
    }
}

/// The provider selected by configuration.
#[derive(Debug)]
pub enum Embedder {
    /// Remote OpenAI-compatible API.
    Http(HttpEmbedder),
    /// Local feature hashing.
    Hashing(HashingEmbedder),
}

impl EmbeddingProvider for Embedder {
    fn model(&self) -> &str {
        match self {
            Embedder::Http(e) => e.model(),
            Embedder::Hashing(e) => e.model(),
        }
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
        match self {
            Embedder::Http(e) => e.embed_documents(texts).await,
            Embedder::Hashing(e) => e.embed_documents(texts).await,
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LoreError> {
        match self {
            Embedder::Http(e) => e.embed_query(text).await,
            Embedder::Hashing(e) => e.embed_query(text).await,
        }
    }
}

/// Build the provider named by `config.provider`.
///
/// # Errors
///
/// Returns [`LoreError::Config`] for an unknown provider name or missing credentials.
///
/// # Examples
///
/// ```
/// use lore_core::EmbeddingConfig;
/// use lore_search::embedding::{provider_from_config, EmbeddingProvider};
///
/// let provider = provider_from_config(&EmbeddingConfig::default()).unwrap();
/// assert!(provider.model().starts_with("hashing"));
/// ```
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Embedder, LoreError> {
    match config.provider.to_lowercase().as_str() {
        "hashing" | "local" => Ok(Embedder::Hashing(HashingEmbedder::new(config.dimensions)?)),
        "http" | "openai" => Ok(Embedder::Http(HttpEmbedder::with_config(config)?)),
        other => Err(LoreError::Config(format!(
            "unknown embedding provider '{other}' (expected hashing or http)"
        ))),
    }
}
