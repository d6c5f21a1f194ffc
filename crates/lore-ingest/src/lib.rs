//! Document loading and chunking for lore.
//!
//! - [`walker`]: walk a documentation tree into [`lore_core::Document`]s
//! - [`frontmatter`]: strip and read YAML frontmatter
//! - [`chunker`]: sliding-window and header-section chunk strategies

pub mod chunker;
pub mod frontmatter;
pub mod walker;

pub use chunker::{chunk_corpus, chunk_document, ChunkDraft, Chunks};
pub use walker::walk_docs;
