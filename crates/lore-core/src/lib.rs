//! Core types, configuration, and error handling for lore.
//!
//! This crate provides the shared foundation used by the other lore crates:
//! - [`LoreError`]: unified error type using `thiserror`
//! - [`LoreConfig`]: configuration loaded from `.lore.toml`
//! - Shared types: [`Document`], [`Chunk`], [`ChunkPosition`], [`ChunkStrategy`],
//!   [`SearchMode`], [`SearchHit`], [`SearchResponse`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    EmbeddingConfig, KeywordConfig, LoreConfig, SearchConfig, SourceConfig, VectorConfig,
    DEFAULT_HTTP_MODEL,
};
pub use error::LoreError;
pub use types::{
    Chunk, ChunkId, ChunkPosition, ChunkStrategy, Document, OutputFormat, SearchHit, SearchMode,
    SearchResponse,
};

/// A convenience `Result` type for lore operations.
pub type Result<T> = std::result::Result<T, LoreError>;
