//! Keyword, vector, and hybrid retrieval over documentation chunks.
//!
//! - [`keyword`]: TF-IDF index over chunk text and source identifiers
//! - [`vector`]: cosine-similarity index over provider embeddings
//! - [`fusion`]: Reciprocal Rank Fusion of the two rankings
//! - [`embedding`]: the [`EmbeddingProvider`] seam and its implementations
//! - [`engine`]: [`HybridIndex`] and the swap-on-rebuild [`SearchService`]

pub mod embedding;
pub mod engine;
pub mod fusion;
pub mod keyword;
pub mod vector;

pub use embedding::{
    provider_from_config, Embedder, EmbeddingProvider, HashingEmbedder, HttpEmbedder,
};
pub use engine::{HybridIndex, SearchRequest, SearchService};

/// A position in the indexed chunk slice with its sub-index score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    /// Position of the chunk in the slice the index was built from.
    pub index: usize,
    /// Similarity score; higher is better.
    pub score: f64,
}
