//! In-memory vector index with cosine similarity.

use lore_core::{Chunk, LoreError, VectorConfig};
use tracing::{debug, instrument};

use crate::embedding::EmbeddingProvider;
use crate::keyword::source_words;
use crate::Scored;

/// Text sent to the embedding provider for `chunk`.
///
/// With `enrich` set, the source identifier (as words) and the document title
/// are prepended so that path and title context influence the vector.
///
/// # Examples
///
/// ```
/// use lore_core::{Chunk, ChunkPosition};
/// use lore_search::vector::embedding_text;
///
/// let chunk = Chunk {
///     id: 0,
///     source: "guides/tool_use.md".into(),
///     title: Some("Tools".into()),
///     text: "Tools are functions.".into(),
///     position: ChunkPosition::Preamble,
/// };
/// assert_eq!(embedding_text(&chunk, true), "guides tool use. Tools. Tools are functions.");
/// assert_eq!(embedding_text(&chunk, false), "Tools are functions.");
/// ```
pub fn embedding_text(chunk: &Chunk, enrich: bool) -> String {
    if !enrich {
        return chunk.text.clone();
    }
    let source = source_words(&chunk.source)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    match &chunk.title {
        Some(title) => format!("{source}. {title}. {}", chunk.text),
        None => format!("{source}. {}", chunk.text),
    }
}

/// Cosine similarity of two equal-length vectors; `0.0` on mismatch or zero norm.
///
/// # Examples
///
/// ```
/// use lore_search::vector::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

/// Frozen set of chunk embeddings, one per chunk, all the same length.
///
/// Results refer to chunks by their position in the slice the index was
/// built from.
#[derive(Debug)]
pub struct VectorIndex {
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
    model: String,
    min_similarity: Option<f32>,
}

impl VectorIndex {
    /// Embed every chunk in one provider call and freeze the result.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged, or [`LoreError::Embedding`] if
    /// the provider returned the wrong number of vectors or vectors of
    /// inconsistent or zero length.
    #[instrument(skip_all, fields(chunks = chunks.len(), model = provider.model()))]
    pub async fn build<E: EmbeddingProvider>(
        chunks: &[Chunk],
        provider: &E,
        config: &VectorConfig,
    ) -> Result<Self, LoreError> {
        let texts: Vec<String> = chunks
            .iter()
            .map(|c| embedding_text(c, config.enrich_with_source))
            .collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            provider.embed_documents(&texts).await?
        };

        let index = Self::from_embeddings(
            embeddings,
            chunks.len(),
            provider.model(),
            config.min_similarity,
        )?;
        debug!(dimensions = index.dimensions, "vector index built");
        Ok(index)
    }

    /// Validate precomputed embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Embedding`] if `embeddings.len() != expected` or
    /// the vectors do not share one non-zero length.
    ///
    /// # Examples
    ///
    /// ```
    /// use lore_search::vector::VectorIndex;
    ///
    /// let index = VectorIndex::from_embeddings(vec![vec![3.0, 4.0]], 1, "test", None).unwrap();
    /// assert_eq!(index.dimensions(), 2);
    ///
    /// let ragged = VectorIndex::from_embeddings(vec![vec![1.0], vec![1.0, 2.0]], 2, "test", None);
    /// assert!(ragged.is_err());
    /// ```
    pub fn from_embeddings(
        embeddings: Vec<Vec<f32>>,
        expected: usize,
        model: &str,
        min_similarity: Option<f32>,
    ) -> Result<Self, LoreError> {
        if embeddings.len() != expected {
            return Err(LoreError::Embedding(format!(
                "provider returned {} vectors for {expected} chunks",
                embeddings.len()
            )));
        }

        let dimensions = embeddings.first().map_or(0, Vec::len);
        if expected > 0 && dimensions == 0 {
            return Err(LoreError::Embedding("provider returned empty vectors".into()));
        }
        if let Some(pos) = embeddings.iter().position(|v| v.len() != dimensions) {
            return Err(LoreError::Embedding(format!(
                "vector {pos} has {} dimensions, expected {dimensions}",
                embeddings[pos].len()
            )));
        }

        Ok(Self {
            vectors: embeddings,
            dimensions,
            model: model.to_string(),
            min_similarity,
        })
    }

    /// Length of every stored vector (0 for an empty index).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Model the vectors were produced with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Returns `true` if no vectors are stored.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Embed `query` with `provider` and return the `top_k` nearest chunks.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or [`LoreError::Embedding`] if the
    /// provider's model or vector length differs from the index.
    pub async fn search<E: EmbeddingProvider>(
        &self,
        query: &str,
        top_k: usize,
        provider: &E,
    ) -> Result<Vec<Scored>, LoreError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if provider.model() != self.model {
            return Err(LoreError::Embedding(format!(
                "query model '{}' differs from index model '{}'",
                provider.model(),
                self.model
            )));
        }
        let embedding = provider.embed_query(query).await?;
        self.search_embedding(&embedding, top_k)
    }

    /// Rank stored vectors against a precomputed query embedding.
    ///
    /// Ties keep insertion order; hits under `min_similarity` are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Embedding`] if `query` has the wrong length.
    pub fn search_embedding(&self, query: &[f32], top_k: usize) -> Result<Vec<Scored>, LoreError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(LoreError::Embedding(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let threshold = self.min_similarity.map(f64::from);
        let mut hits: Vec<Scored> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, v)| Scored {
                index,
                score: cosine_similarity(v, query),
            })
            .filter(|hit| threshold.map_or(true, |t| hit.score >= t))
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}
