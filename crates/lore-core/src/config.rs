use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoreError;
use crate::types::{ChunkStrategy, SearchMode};

/// Top-level configuration loaded from `.lore.toml`.
///
/// Every table and key is optional; missing values take the defaults below.
/// The `lore` binary applies its command-line overrides on top.
///
/// # Examples
///
/// ```
/// use lore_core::LoreConfig;
///
/// let config = LoreConfig::default();
/// assert_eq!(config.search.rrf_k, 60);
/// assert_eq!(config.search.candidate_multiplier, 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreConfig {
    /// Which files the document source picks up.
    #[serde(default)]
    pub source: SourceConfig,
    /// Chunk-boundary policy.
    #[serde(default)]
    pub chunking: ChunkStrategy,
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Query defaults and fusion constants.
    #[serde(default)]
    pub search: SearchConfig,
    /// Keyword index field weights.
    #[serde(default)]
    pub keyword: KeywordConfig,
    /// Vector index behavior.
    #[serde(default)]
    pub vector: VectorConfig,
}

impl LoreConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Io`] if the file cannot be read,
    /// [`LoreError::Toml`] if the content is not valid TOML, or
    /// [`LoreError::Config`] if a value fails validation.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lore_core::LoreConfig;
    /// use std::path::Path;
    ///
    /// let config = LoreConfig::from_file(Path::new(".lore.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LoreError> {
        if !path.exists() {
            return Err(LoreError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Toml`] if parsing fails (including unknown
    /// chunking strategy names) and [`LoreError::Config`] on invalid values.
    ///
    /// # Examples
    ///
    /// ```
    /// use lore_core::{ChunkStrategy, LoreConfig};
    ///
    /// let toml = r#"
    /// [chunking]
    /// strategy = "sliding_window"
    /// size = 200
    /// step = 100
    /// "#;
    /// let config = LoreConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.chunking, ChunkStrategy::SlidingWindow { size: 200, step: 100 });
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LoreError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value that would otherwise fail later, mid-build.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), LoreError> {
        self.chunking.validate()?;
        if self.source.extensions.is_empty() {
            return Err(LoreError::Config(
                "source.extensions must list at least one extension".into(),
            ));
        }
        if self.search.top_k == 0 {
            return Err(LoreError::Config("search.top_k must be positive".into()));
        }
        if self.search.rrf_k == 0 {
            return Err(LoreError::Config("search.rrf_k must be positive".into()));
        }
        if self.search.candidate_multiplier == 0 {
            return Err(LoreError::Config(
                "search.candidate_multiplier must be at least 1".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(LoreError::Config(
                "embedding.dimensions must be positive".into(),
            ));
        }
        if self.embedding.timeout_ms == 0 {
            return Err(LoreError::Config(
                "embedding.timeout_ms must be positive".into(),
            ));
        }
        if self.keyword.text_boost < 0.0 || self.keyword.source_boost < 0.0 {
            return Err(LoreError::Config(
                "keyword boosts must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Document source filters.
///
/// # Examples
///
/// ```
/// use lore_core::SourceConfig;
///
/// let config = SourceConfig::default();
/// assert_eq!(config.extensions, vec!["md", "mdx"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File extensions (without the dot, case-insensitive) treated as documents.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["md".into(), "mdx".into()]
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

/// Configuration for the embedding provider used by vector search.
///
/// # Examples
///
/// ```
/// use lore_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "hashing");
/// assert_eq!(config.dimensions, 384);
/// assert_eq!(config.timeout().as_millis(), 10_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider: `"hashing"` (offline, deterministic) or `"openai"` (any
    /// OpenAI-compatible `/embeddings` endpoint).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model identifier sent to the provider; unset picks the provider's
    /// default (see [`EmbeddingConfig::model_name`]).
    #[serde(default)]
    pub model: Option<String>,
    /// API key for HTTP providers.
    pub api_key: Option<String>,
    /// Custom base URL for HTTP providers.
    pub base_url: Option<String>,
    /// Expected vector length.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Upper bound for a single query embedding call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_embedding_provider() -> String {
    "hashing".into()
}

/// Model used by HTTP providers when `embedding.model` is unset.
pub const DEFAULT_HTTP_MODEL: &str = "text-embedding-3-small";

fn default_embedding_dimensions() -> usize {
    384
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl EmbeddingConfig {
    /// The configured model, or the default for the configured provider.
    ///
    /// # Examples
    ///
    /// ```
    /// use lore_core::EmbeddingConfig;
    ///
    /// let mut config = EmbeddingConfig::default();
    /// assert_eq!(config.model_name(), "hashing-sha256");
    ///
    /// config.provider = "openai".into();
    /// assert_eq!(config.model_name(), "text-embedding-3-small");
    ///
    /// config.model = Some("nomic-embed-text".into());
    /// assert_eq!(config.model_name(), "nomic-embed-text");
    /// ```
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider.to_lowercase().as_str()) {
            (Some(model), _) => model.as_str(),
            (None, "http" | "openai") => DEFAULT_HTTP_MODEL,
            (None, _) => "hashing-sha256",
        }
    }

    /// Query embedding timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            api_key: None,
            base_url: None,
            dimensions: default_embedding_dimensions(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Query defaults and Reciprocal Rank Fusion constants.
///
/// # Examples
///
/// ```
/// use lore_core::{SearchConfig, SearchMode};
///
/// let config = SearchConfig::default();
/// assert_eq!(config.mode, SearchMode::Hybrid);
/// assert_eq!(config.top_k, 5);
/// assert!(config.vector_enabled);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Mode used when the caller does not pick one.
    #[serde(default)]
    pub mode: SearchMode,
    /// Results returned when the caller does not pick a count (default: 5).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// RRF smoothing constant `k` (default: 60).
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,
    /// Each sub-index contributes `top_k * candidate_multiplier` candidates
    /// to fusion (default: 2).
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Build the vector index at all; when `false`, hybrid queries fall back
    /// to keyword ranking.
    #[serde(default = "default_true")]
    pub vector_enabled: bool,
}

fn default_top_k() -> usize {
    5
}

fn default_rrf_k() -> usize {
    60
}

fn default_candidate_multiplier() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            top_k: default_top_k(),
            rrf_k: default_rrf_k(),
            candidate_multiplier: default_candidate_multiplier(),
            vector_enabled: true,
        }
    }
}

/// Per-field weights of the keyword index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Weight of the chunk text field (default: 1.0).
    #[serde(default = "default_text_boost")]
    pub text_boost: f64,
    /// Weight of the source identifier field (default: 0.0, off).
    ///
    /// A positive boost lets queries naming a file find it, at the cost that a
    /// chunk whose path repeats the query can outrank the chunk whose text is
    /// the query.
    #[serde(default = "default_source_boost")]
    pub source_boost: f64,
}

fn default_text_boost() -> f64 {
    1.0
}

fn default_source_boost() -> f64 {
    0.0
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            text_boost: default_text_boost(),
            source_boost: default_source_boost(),
        }
    }
}

/// Vector index behavior.
///
/// # Examples
///
/// ```
/// use lore_core::VectorConfig;
///
/// let config = VectorConfig::default();
/// assert!(!config.enrich_with_source);
/// assert!(config.min_similarity.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Prefix embedded chunk text with the source path words and document title
    /// (default: off). Helps short chunks carry their context, but a query equal
    /// to a chunk's text no longer embeds to exactly that chunk's vector.
    #[serde(default)]
    pub enrich_with_source: bool,
    /// Drop vector hits below this cosine similarity.
    pub min_similarity: Option<f32>,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            enrich_with_source: false,
            min_similarity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = LoreConfig::default();
        assert_eq!(config.chunking, ChunkStrategy::HeaderSection { level: 2 });
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.search.rrf_k, 60);
        assert_eq!(config.search.candidate_multiplier, 2);
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.keyword.text_boost, 1.0);
        assert_eq!(config.keyword.source_boost, 0.0);
        assert!(!config.vector.enrich_with_source);
        assert!(config.embedding.model.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = LoreConfig::from_toml("").unwrap();
        assert_eq!(config.search.mode, SearchMode::Hybrid);
        assert_eq!(config.embedding.timeout_ms, 10_000);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[source]
extensions = ["md"]

[chunking]
strategy = "header_section"
level = 3

[embedding]
provider = "openai"
model = "text-embedding-3-small"
base_url = "http://localhost:8080/v1"
dimensions = 1536
timeout_ms = 2500

[search]
mode = "keyword"
top_k = 8
rrf_k = 30
candidate_multiplier = 4
vector_enabled = false

[keyword]
source_boost = 0.5

[vector]
enrich_with_source = true
min_similarity = 0.2
"#;
        let config = LoreConfig::from_toml(toml).unwrap();
        assert_eq!(config.source.extensions, vec!["md"]);
        assert_eq!(config.chunking, ChunkStrategy::HeaderSection { level: 3 });
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.dimensions, 1536);
        assert_eq!(config.embedding.timeout(), Duration::from_millis(2500));
        assert_eq!(config.search.mode, SearchMode::Keyword);
        assert_eq!(config.search.top_k, 8);
        assert_eq!(config.search.rrf_k, 30);
        assert_eq!(config.search.candidate_multiplier, 4);
        assert!(!config.search.vector_enabled);
        assert_eq!(config.embedding.model_name(), "text-embedding-3-small");
        assert_eq!(config.keyword.source_boost, 0.5);
        assert!(config.vector.enrich_with_source);
        assert_eq!(config.vector.min_similarity, Some(0.2));
    }

    #[test]
    fn http_provider_without_model_uses_http_default() {
        let config = LoreConfig::from_toml("[embedding]\nprovider = \"openai\"").unwrap();
        assert_eq!(config.embedding.model_name(), DEFAULT_HTTP_MODEL);

        let config = LoreConfig::from_toml("[embedding]\nprovider = \"hashing\"").unwrap();
        assert_eq!(config.embedding.model_name(), "hashing-sha256");
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let toml = r#"
[chunking]
strategy = "paragraphs"
"#;
        assert!(LoreConfig::from_toml(toml).is_err());
    }

    #[test]
    fn window_step_larger_than_size_is_rejected() {
        let toml = r#"
[chunking]
strategy = "sliding_window"
size = 100
step = 200
"#;
        let err = LoreConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, LoreError::Config(_)));
        assert!(err.to_string().contains("gaps"));
    }

    #[test]
    fn zero_search_constants_are_rejected() {
        assert!(LoreConfig::from_toml("[search]\ntop_k = 0").is_err());
        assert!(LoreConfig::from_toml("[search]\nrrf_k = 0").is_err());
        assert!(LoreConfig::from_toml("[search]\ncandidate_multiplier = 0").is_err());
    }

    #[test]
    fn unsupported_mode_is_rejected() {
        assert!(LoreConfig::from_toml("[search]\nmode = \"fuzzy\"").is_err());
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = LoreConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = LoreConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, LoreError::FileNotFound(_)));
    }
}
