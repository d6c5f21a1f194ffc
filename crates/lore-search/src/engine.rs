//! Hybrid search engine: keyword + vector retrieval fused with RRF.
//!
//! [`HybridIndex`] is built once and never mutated. [`SearchService`] holds the
//! current index behind an atomic pointer so a rebuilt index can be swapped in
//! while queries against the old one finish undisturbed.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use lore_core::{
    Chunk, ChunkId, Document, LoreConfig, LoreError, SearchConfig, SearchHit, SearchMode,
    SearchResponse,
};
use lore_ingest::chunk_corpus;
use tracing::{debug, info, instrument, warn};

use crate::embedding::EmbeddingProvider;
use crate::fusion::reciprocal_rank_fusion;
use crate::keyword::KeywordIndex;
use crate::vector::VectorIndex;
use crate::Scored;

/// One query against a [`HybridIndex`].
///
/// Unset fields fall back to the index's `[search]` configuration.
///
/// # Examples
///
/// ```
/// use lore_core::SearchMode;
/// use lore_search::SearchRequest;
///
/// let request = SearchRequest::new("install").mode(SearchMode::Keyword).top_k(3);
/// assert_eq!(request.top_k, Some(3));
/// assert!(request.rrf_k.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Ranking signal(s) to use.
    pub mode: Option<SearchMode>,
    /// Maximum number of hits; must be positive.
    pub top_k: Option<usize>,
    /// RRF constant for hybrid mode; must be positive.
    pub rrf_k: Option<usize>,
}

impl SearchRequest {
    /// A request using configured defaults for everything but the query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: None,
            top_k: None,
            rrf_k: None,
        }
    }

    /// Set the search mode.
    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the number of hits.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set the RRF constant.
    pub fn rrf_k(mut self, rrf_k: usize) -> Self {
        self.rrf_k = Some(rrf_k);
        self
    }
}

/// A frozen keyword + vector index over one chunk set.
///
/// # Examples
///
/// ```
/// use lore_core::{Document, LoreConfig, SearchMode};
/// use lore_search::{HashingEmbedder, HybridIndex, SearchRequest};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let docs = vec![
///     Document::new("install.md", "# Install\nRun pip install lore."),
///     Document::new("usage.md", "# Usage\nCall lore search with a query."),
/// ];
/// let provider = HashingEmbedder::new(128).unwrap();
/// let index = HybridIndex::build_from_documents(&docs, provider, &LoreConfig::default())
///     .await
///     .unwrap();
///
/// let response = index
///     .search(&SearchRequest::new("pip install").mode(SearchMode::Keyword).top_k(1))
///     .await
///     .unwrap();
/// assert_eq!(response.hits[0].source, "install.md");
/// # }
/// ```
pub struct HybridIndex<E> {
    chunks: Vec<Chunk>,
    keyword: KeywordIndex,
    vector: Option<VectorIndex>,
    provider: E,
    settings: SearchConfig,
    timeout: Duration,
}

impl<E> std::fmt::Debug for HybridIndex<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridIndex")
            .field("chunks", &self.chunks.len())
            .field("vector_enabled", &self.vector.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingProvider> HybridIndex<E> {
    /// Chunk `documents` with the configured strategy and build over the result.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Config`] for invalid settings, or the embedding
    /// error that aborted the vector build.
    pub async fn build_from_documents(
        documents: &[Document],
        provider: E,
        config: &LoreConfig,
    ) -> Result<Self, LoreError> {
        config.validate()?;
        let chunks = chunk_corpus(documents, &config.chunking)?;
        Self::build(chunks, provider, config).await
    }

    /// Build both sub-indices over `chunks`.
    ///
    /// Chunks are ranked by their position in `chunks`, which is also the
    /// final tie-breaker. No partial index is returned on failure.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Config`] for invalid settings, or the embedding
    /// error that aborted the vector build.
    #[instrument(skip_all, fields(chunks = chunks.len(), model = provider.model()))]
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: E,
        config: &LoreConfig,
    ) -> Result<Self, LoreError> {
        config.validate()?;

        let keyword = KeywordIndex::build(&chunks, &config.keyword);
        let vector = if config.search.vector_enabled {
            Some(VectorIndex::build(&chunks, &provider, &config.vector).await?)
        } else {
            info!("vector search disabled; building keyword index only");
            None
        };

        info!(
            chunks = chunks.len(),
            dimensions = vector.as_ref().map_or(0, VectorIndex::dimensions),
            "index built"
        );

        Ok(Self {
            chunks,
            keyword,
            vector,
            provider,
            settings: config.search.clone(),
            timeout: config.embedding.timeout(),
        })
    }

    /// All indexed chunks in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Look up a chunk by id.
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// Returns `true` if the vector sub-index was built.
    pub fn vector_enabled(&self) -> bool {
        self.vector.is_some()
    }

    /// The embedding provider queries are embedded with.
    pub fn provider(&self) -> &E {
        &self.provider
    }

    /// Answer one query.
    ///
    /// In hybrid mode an embedding failure or timeout on the vector side
    /// falls back to keyword-only ranking and is reported in
    /// [`SearchResponse::degraded`].
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Usage`] if `top_k` or `rrf_k` is zero or vector
    /// mode is requested with vector search disabled. In vector mode,
    /// embedding errors and timeouts are returned as-is.
    #[instrument(skip_all, fields(query = %request.query))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, LoreError> {
        let mode = request.mode.unwrap_or(self.settings.mode);
        let top_k = request.top_k.unwrap_or(self.settings.top_k);
        let rrf_k = request.rrf_k.unwrap_or(self.settings.rrf_k);

        if top_k == 0 {
            return Err(LoreError::Usage("top_k must be positive".into()));
        }
        if rrf_k == 0 {
            return Err(LoreError::Usage("rrf_k must be positive".into()));
        }
        if mode == SearchMode::Vector && self.vector.is_none() {
            return Err(LoreError::Usage(
                "vector search is disabled in configuration".into(),
            ));
        }

        let mut response = SearchResponse {
            query: request.query.clone(),
            mode,
            hits: Vec::new(),
            degraded: None,
        };
        if request.query.trim().is_empty() {
            return Ok(response);
        }

        match mode {
            SearchMode::Keyword => {
                let ranked = self.keyword.search(&request.query, top_k);
                response.hits = self.to_hits(ranked.into_iter().map(|s| (s.index, s.score)));
            }
            SearchMode::Vector => {
                let ranked = self.vector_search(&request.query, top_k).await?;
                response.hits = self.to_hits(ranked.into_iter().map(|s| (s.index, s.score)));
            }
            SearchMode::Hybrid => {
                let candidates = top_k.saturating_mul(self.settings.candidate_multiplier);
                let keyword = self.keyword.search(&request.query, candidates);

                let vector = if self.vector.is_none() {
                    response.degraded = Some("vector search disabled".into());
                    warn!("vector search disabled; hybrid query uses keyword ranking only");
                    Vec::new()
                } else {
                    match self.vector_search(&request.query, candidates).await {
                        Ok(hits) => hits,
                        Err(e) if e.is_recoverable() => {
                            warn!(
                                error = %e,
                                "vector search failed; falling back to keyword ranking"
                            );
                            response.degraded = Some(e.to_string());
                            Vec::new()
                        }
                        Err(e) => return Err(e),
                    }
                };

                let keyword_ids: Vec<usize> = keyword.iter().map(|s| s.index).collect();
                let vector_ids: Vec<usize> = vector.iter().map(|s| s.index).collect();
                let fused = reciprocal_rank_fusion(&keyword_ids, &vector_ids, rrf_k);
                debug!(
                    keyword = keyword_ids.len(),
                    vector = vector_ids.len(),
                    fused = fused.len(),
                    "fused candidate lists"
                );

                response.hits =
                    self.to_hits(fused.into_iter().take(top_k).map(|f| (f.chunk_id, f.score)));
            }
        }

        debug!(mode = %mode, hits = response.hits.len(), "query answered");
        Ok(response)
    }

    async fn vector_search(&self, query: &str, top_k: usize) -> Result<Vec<Scored>, LoreError> {
        let Some(vector) = &self.vector else {
            return Ok(Vec::new());
        };
        tokio::time::timeout(self.timeout, vector.search(query, top_k, &self.provider))
            .await
            .map_err(|_| LoreError::Timeout(self.timeout))?
    }

    /// Turn `(position, score)` pairs into ranked hits.
    fn to_hits(&self, ranked: impl Iterator<Item = (usize, f64)>) -> Vec<SearchHit> {
        ranked
            .filter_map(|(pos, score)| self.chunks.get(pos).map(|chunk| (chunk, score)))
            .enumerate()
            .map(|(i, (chunk, score))| SearchHit {
                chunk_id: chunk.id,
                rank: i + 1,
                source: chunk.source.clone(),
                text: chunk.text.clone(),
                score,
                position: chunk.position.clone(),
            })
            .collect()
    }
}

/// Holds the current [`HybridIndex`] and swaps in rebuilt ones atomically.
///
/// # Examples
///
/// ```
/// use lore_core::LoreError;
/// use lore_search::{HashingEmbedder, SearchRequest, SearchService};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service: SearchService<HashingEmbedder> = SearchService::new();
/// let err = service.search(&SearchRequest::new("anything")).await.unwrap_err();
/// assert!(matches!(err, LoreError::Usage(_)));
/// # }
/// ```
pub struct SearchService<E> {
    current: ArcSwapOption<HybridIndex<E>>,
}

impl<E> Default for SearchService<E> {
    fn default() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }
}

impl<E: EmbeddingProvider> SearchService<E> {
    /// A service with no index installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A service serving `index`.
    pub fn with_index(index: HybridIndex<E>) -> Self {
        Self {
            current: ArcSwapOption::from_pointee(index),
        }
    }

    /// Install `index`, returning the one it replaced.
    ///
    /// Searches already running keep their reference to the old index.
    pub fn replace(&self, index: HybridIndex<E>) -> Option<Arc<HybridIndex<E>>> {
        let previous = self.current.swap(Some(Arc::new(index)));
        info!(replaced = previous.is_some(), "search index installed");
        previous
    }

    /// Build a fresh index from `documents` and install it.
    ///
    /// The current index keeps serving until the new one is complete; on
    /// error it stays installed.
    ///
    /// # Errors
    ///
    /// Returns whatever [`HybridIndex::build_from_documents`] returns.
    pub async fn rebuild(
        &self,
        documents: &[Document],
        provider: E,
        config: &LoreConfig,
    ) -> Result<(), LoreError> {
        let index = HybridIndex::build_from_documents(documents, provider, config).await?;
        self.replace(index);
        Ok(())
    }

    /// The installed index, if any.
    pub fn current(&self) -> Option<Arc<HybridIndex<E>>> {
        self.current.load_full()
    }

    /// Query the installed index.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Usage`] if no index has been installed yet, or
    /// any error from [`HybridIndex::search`].
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, LoreError> {
        let index = self
            .current()
            .ok_or_else(|| LoreError::Usage("no index has been built yet".into()))?;
        index.search(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use lore_core::ChunkStrategy;

    /// Embeds documents fine, then fails or stalls on queries.
    struct FlakyProvider {
        inner: HashingEmbedder,
        stall: Option<Duration>,
    }

    impl EmbeddingProvider for FlakyProvider {
        fn model(&self) -> &str {
            self.inner.model()
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LoreError> {
            self.inner.embed_documents(texts).await
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LoreError> {
            match self.stall {
                Some(d) => {
                    tokio::time::sleep(d).await;
                    self.inner.embed_query(text).await
                }
                None => Err(LoreError::Embedding("provider unavailable".into())),
            }
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new("install.md", "# A\nfoo bar"),
            Document::new("usage.md", "# B\nbaz qux"),
        ]
    }

    fn window_config() -> LoreConfig {
        let mut config = LoreConfig::default();
        config.chunking = ChunkStrategy::SlidingWindow { size: 2, step: 2 };
        config.embedding.dimensions = 64;
        config.vector.enrich_with_source = false;
        config
    }

    async fn hashing_index(config: &LoreConfig) -> HybridIndex<HashingEmbedder> {
        let provider = HashingEmbedder::new(config.embedding.dimensions).unwrap();
        HybridIndex::build_from_documents(&docs(), provider, config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn two_document_window_scenario() {
        let index = hashing_index(&window_config()).await;
        assert_eq!(index.chunks().len(), 4);

        let response = index
            .search(&SearchRequest::new("foo").mode(SearchMode::Keyword).top_k(1))
            .await
            .unwrap();
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].text, "foo bar");
        assert_eq!(response.hits[0].rank, 1);
        assert!(response.hits[0].score > 0.0);
        assert!(!response.is_degraded());
    }

    #[tokio::test]
    async fn hybrid_fuses_both_lists() {
        let index = hashing_index(&window_config()).await;
        let response = index
            .search(&SearchRequest::new("baz qux").top_k(2))
            .await
            .unwrap();
        assert_eq!(response.mode, SearchMode::Hybrid);
        assert_eq!(response.hits[0].text, "baz qux");
        // First in both lists at k=60
        assert!((response.hits[0].score - 2.0 / 61.0).abs() < 1e-12);
        assert!(response.hits.len() <= 2);
    }

    #[tokio::test]
    async fn zero_top_k_is_usage_error() {
        let index = hashing_index(&window_config()).await;
        let err = index
            .search(&SearchRequest::new("foo").top_k(0))
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Usage(_)));
    }

    #[tokio::test]
    async fn blank_query_returns_no_hits() {
        let index = hashing_index(&window_config()).await;
        let response = index.search(&SearchRequest::new("  ")).await.unwrap();
        assert!(response.hits.is_empty());
    }

    #[tokio::test]
    async fn provider_error_degrades_hybrid_to_keyword() {
        let config = window_config();
        let provider = FlakyProvider {
            inner: HashingEmbedder::new(64).unwrap(),
            stall: None,
        };
        let index = HybridIndex::build_from_documents(&docs(), provider, &config)
            .await
            .unwrap();

        let response = index
            .search(&SearchRequest::new("foo").top_k(3))
            .await
            .unwrap();
        assert!(response.is_degraded());
        assert!(response.degraded.as_deref().unwrap().contains("provider unavailable"));
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].text, "foo bar");

        let err = index
            .search(&SearchRequest::new("foo").mode(SearchMode::Vector))
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Embedding(_)));
    }

    #[tokio::test]
    async fn degraded_hybrid_matches_keyword_ranking() {
        let docs = vec![
            Document::new("a.md", "retry retry backoff"),
            Document::new("b.md", "retry once then give up"),
            Document::new("c.md", "retry with jitter and backoff policy"),
            Document::new("d.md", "unrelated text about logging"),
            Document::new("e.md", "backoff caps at thirty seconds"),
        ];
        let provider = FlakyProvider {
            inner: HashingEmbedder::new(64).unwrap(),
            stall: None,
        };
        let index = HybridIndex::build_from_documents(&docs, provider, &LoreConfig::default())
            .await
            .unwrap();

        for top_k in [2, 3, 10] {
            let request = SearchRequest::new("retry backoff").top_k(top_k);
            let keyword = index
                .search(&request.clone().mode(SearchMode::Keyword))
                .await
                .unwrap();
            let hybrid = index.search(&request).await.unwrap();

            assert!(hybrid.is_degraded());
            assert!(keyword.hits.len() > 1);
            let keyword_ids: Vec<usize> = keyword.hits.iter().map(|h| h.chunk_id).collect();
            let hybrid_ids: Vec<usize> = hybrid.hits.iter().map(|h| h.chunk_id).collect();
            assert_eq!(hybrid_ids, keyword_ids, "top_k={top_k}");
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let mut config = window_config();
        config.embedding.timeout_ms = 20;
        let provider = FlakyProvider {
            inner: HashingEmbedder::new(64).unwrap(),
            stall: Some(Duration::from_secs(5)),
        };
        let index = HybridIndex::build_from_documents(&docs(), provider, &config)
            .await
            .unwrap();

        let err = index
            .search(&SearchRequest::new("foo").mode(SearchMode::Vector))
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Timeout(_)));

        let response = index.search(&SearchRequest::new("foo")).await.unwrap();
        assert!(response.degraded.as_deref().unwrap().contains("timed out"));
        assert_eq!(response.hits[0].text, "foo bar");
    }

    #[tokio::test]
    async fn disabled_vector_search() {
        let mut config = window_config();
        config.search.vector_enabled = false;
        let index = hashing_index(&config).await;
        assert!(!index.vector_enabled());

        let response = index.search(&SearchRequest::new("foo")).await.unwrap();
        assert!(response.is_degraded());
        assert_eq!(response.hits[0].text, "foo bar");

        let err = index
            .search(&SearchRequest::new("foo").mode(SearchMode::Vector))
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Usage(_)));
    }

    #[tokio::test]
    async fn invalid_chunking_aborts_build() {
        let mut config = window_config();
        config.chunking = ChunkStrategy::SlidingWindow { size: 2, step: 3 };
        let provider = HashingEmbedder::new(64).unwrap();
        let err = HybridIndex::build_from_documents(&docs(), provider, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Config(_)));
    }

    #[tokio::test]
    async fn service_swaps_indices() {
        let service: SearchService<HashingEmbedder> = SearchService::new();
        let err = service
            .search(&SearchRequest::new("foo"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::Usage(_)));

        let config = window_config();
        assert!(service.replace(hashing_index(&config).await).is_none());
        let held = service.current().unwrap();

        let provider = HashingEmbedder::new(64).unwrap();
        let updated = vec![Document::new("new.md", "fresh content only")];
        service.rebuild(&updated, provider, &config).await.unwrap();

        // The old Arc is still usable after the swap
        assert_eq!(held.chunks().len(), 4);
        let response = service
            .search(&SearchRequest::new("fresh").mode(SearchMode::Keyword))
            .await
            .unwrap();
        assert_eq!(response.hits[0].source, "new.md");
        assert_eq!(service.current().unwrap().chunks().len(), 2);
    }

    #[tokio::test]
    async fn chunk_lookup_by_id() {
        let index = hashing_index(&window_config()).await;
        assert_eq!(index.chunk(2).unwrap().text, "# B");
        assert!(index.chunk(99).is_none());
    }
}
