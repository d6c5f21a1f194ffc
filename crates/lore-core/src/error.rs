use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while building or querying a documentation index.
///
/// Library crates use this type directly. It also implements
/// [`miette::Diagnostic`], so the binary can propagate it with `?`.
///
/// # Examples
///
/// ```
/// use lore_core::LoreError;
///
/// let err = LoreError::Config("step 4 exceeds window size 2".into());
/// assert!(err.to_string().contains("step 4"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LoreError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration: bad chunking strategy, bad parameters, unsupported mode.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(lore::config),
        help("check the [chunking] and [search] tables in .lore.toml")
    )]
    Config(String),

    /// The embedding provider failed or returned malformed vectors.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The embedding provider did not answer within the configured bound.
    #[error("embedding provider timed out after {}ms", .0.as_millis())]
    #[diagnostic(code(lore::timeout), help("raise embedding.timeout_ms or use --mode keyword"))]
    Timeout(Duration),

    /// A precondition of the search API was violated by the caller.
    #[error("usage error: {0}")]
    #[diagnostic(code(lore::usage))]
    Usage(String),

    /// Frontmatter or document parse failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl LoreError {
    /// Returns `true` for provider-side failures that hybrid search may
    /// absorb by falling back to keyword results.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use lore_core::LoreError;
    ///
    /// assert!(LoreError::Timeout(Duration::from_secs(1)).is_recoverable());
    /// assert!(!LoreError::Usage("index not built".into()).is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LoreError::Embedding(_) | LoreError::Timeout(_))
    }
}
