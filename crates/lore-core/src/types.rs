use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LoreError;

/// Insertion-ordered chunk identifier, assigned by the index-build step.
pub type ChunkId = usize;

/// A decoded source document handed to the chunker.
///
/// # Examples
///
/// ```
/// use lore_core::Document;
///
/// let doc = Document::new("docs/install.md", "# Install\n\npip install lore");
/// assert_eq!(doc.identifier, "docs/install.md");
/// assert!(doc.title.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Path-like identifier, relative to the source root and `/`-separated.
    pub identifier: String,
    /// Full text with any frontmatter already removed.
    pub text: String,
    /// Title from frontmatter, if the document declared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Document {
    /// Create a document without a title.
    pub fn new(identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            text: text.into(),
            title: None,
        }
    }

    /// Attach a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Where a chunk came from inside its document.
///
/// # Examples
///
/// ```
/// use lore_core::ChunkPosition;
///
/// let pos = ChunkPosition::Section {
///     heading_path: vec!["Guide".into(), "Install".into()],
///     level: 2,
/// };
/// assert_eq!(pos.to_string(), "Guide > Install");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChunkPosition {
    /// A sliding-window chunk covering words `[start_word, end_word)`.
    #[serde(rename_all = "camelCase")]
    Window {
        /// Zero-based window number within the document.
        index: usize,
        /// First word offset (inclusive).
        start_word: usize,
        /// Last word offset (exclusive).
        end_word: usize,
    },
    /// A header-section chunk.
    #[serde(rename_all = "camelCase")]
    Section {
        /// Titles of the enclosing sections, outermost first, ending with the
        /// header that opened this chunk.
        heading_path: Vec<String>,
        /// Depth of the opening header (1 for `#`).
        level: u8,
    },
    /// Content before the first qualifying header.
    Preamble,
}

impl fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkPosition::Window {
                index,
                start_word,
                end_word,
            } => write!(f, "window {index} (words {start_word}-{end_word})"),
            ChunkPosition::Section { heading_path, .. } => {
                write!(f, "{}", heading_path.join(" > "))
            }
            ChunkPosition::Preamble => write!(f, "preamble"),
        }
    }
}

/// A bounded passage derived from one document; the unit indexed and returned by search.
///
/// # Examples
///
/// ```
/// use lore_core::{Chunk, ChunkPosition};
///
/// let chunk = Chunk {
///     id: 0,
///     source: "docs/install.md".into(),
///     title: None,
///     text: "pip install lore".into(),
///     position: ChunkPosition::Preamble,
/// };
/// assert_eq!(chunk.citation(), "docs/install.md (preamble)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique, insertion-ordered identifier.
    pub id: ChunkId,
    /// Identifier of the document this chunk was cut from.
    pub source: String,
    /// Title of the source document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Non-empty chunk text.
    pub text: String,
    /// Provenance inside the source document.
    pub position: ChunkPosition,
}

impl Chunk {
    /// Human-readable citation: source identifier plus position.
    pub fn citation(&self) -> String {
        format!("{} ({})", self.source, self.position)
    }
}

/// Chunk-boundary policy.
///
/// Deserializes from a table tagged by `strategy`:
///
/// ```toml
/// strategy = "sliding_window"
/// size = 200
/// step = 100
/// ```
///
/// # Examples
///
/// ```
/// use lore_core::ChunkStrategy;
///
/// let s = ChunkStrategy::SlidingWindow { size: 4, step: 2 };
/// assert!(s.validate().is_ok());
///
/// let gaps = ChunkStrategy::SlidingWindow { size: 2, step: 4 };
/// assert!(gaps.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case", deny_unknown_fields)]
pub enum ChunkStrategy {
    /// Fixed-size word windows advancing by `step`.
    SlidingWindow {
        /// Words per chunk.
        #[serde(default = "default_window_size")]
        size: usize,
        /// Words to advance per chunk; must not exceed `size`.
        #[serde(default = "default_window_step")]
        step: usize,
    },
    /// One chunk per markdown section at header depth `<= level`.
    #[serde(alias = "markdown_sections")]
    HeaderSection {
        /// Deepest header level that starts a new chunk (1-6).
        #[serde(default = "default_split_level")]
        level: u8,
    },
}

fn default_window_size() -> usize {
    2000
}

fn default_window_step() -> usize {
    1000
}

fn default_split_level() -> u8 {
    2
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        ChunkStrategy::HeaderSection {
            level: default_split_level(),
        }
    }
}

impl ChunkStrategy {
    /// Look up a strategy by name, with default parameters.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Config`] for unknown names.
    ///
    /// # Examples
    ///
    /// ```
    /// use lore_core::ChunkStrategy;
    ///
    /// let s = ChunkStrategy::from_name("markdown_sections").unwrap();
    /// assert_eq!(s, ChunkStrategy::HeaderSection { level: 2 });
    /// assert!(ChunkStrategy::from_name("paragraphs").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Self, LoreError> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "sliding_window" => Ok(ChunkStrategy::SlidingWindow {
                size: default_window_size(),
                step: default_window_step(),
            }),
            "header_section" | "markdown_sections" => Ok(ChunkStrategy::HeaderSection {
                level: default_split_level(),
            }),
            other => Err(LoreError::Config(format!(
                "unknown chunking strategy '{other}' (expected sliding_window or header_section)"
            ))),
        }
    }

    /// Strategy name as written in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            ChunkStrategy::SlidingWindow { .. } => "sliding_window",
            ChunkStrategy::HeaderSection { .. } => "header_section",
        }
    }

    /// Check parameters before any chunk is produced.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Config`] when `size` or `step` is zero, when
    /// `step > size` (windows would leave gaps), or when `level` is outside 1-6.
    pub fn validate(&self) -> Result<(), LoreError> {
        match *self {
            ChunkStrategy::SlidingWindow { size, step } => {
                if size == 0 || step == 0 {
                    return Err(LoreError::Config(format!(
                        "sliding window size and step must be positive (size={size}, step={step})"
                    )));
                }
                if step > size {
                    return Err(LoreError::Config(format!(
                        "sliding window step {step} exceeds size {size}; chunks would leave gaps"
                    )));
                }
                Ok(())
            }
            ChunkStrategy::HeaderSection { level } => {
                if !(1..=6).contains(&level) {
                    return Err(LoreError::Config(format!(
                        "header split level must be between 1 and 6, got {level}"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStrategy::SlidingWindow { size, step } => {
                write!(f, "sliding_window(size={size}, step={step})")
            }
            ChunkStrategy::HeaderSection { level } => write!(f, "header_section(level={level})"),
        }
    }
}

/// Which ranking signal(s) a query uses.
///
/// # Examples
///
/// ```
/// use lore_core::SearchMode;
///
/// let mode: SearchMode = "hybrid".parse().unwrap();
/// assert_eq!(mode, SearchMode::Hybrid);
/// assert!("fuzzy".parse::<SearchMode>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// TF-IDF keyword ranking only.
    Keyword,
    /// Embedding similarity only.
    Vector,
    /// Reciprocal Rank Fusion of both.
    #[default]
    Hybrid,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Keyword => write!(f, "keyword"),
            SearchMode::Vector => write!(f, "vector"),
            SearchMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = LoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" | "text" => Ok(SearchMode::Keyword),
            "vector" | "semantic" => Ok(SearchMode::Vector),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(LoreError::Config(format!("unsupported search mode: {other}"))),
        }
    }
}

/// One ranked search result, ready for citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Identifier of the matched chunk.
    pub chunk_id: ChunkId,
    /// 1-based rank in the returned list.
    pub rank: usize,
    /// Source document identifier.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// Mode-specific score; higher is better.
    pub score: f64,
    /// Provenance inside the source document.
    pub position: ChunkPosition,
}

/// The result of one query.
///
/// # Examples
///
/// ```
/// use lore_core::{SearchMode, SearchResponse};
///
/// let response = SearchResponse {
///     query: "install".into(),
///     mode: SearchMode::Hybrid,
///     hits: Vec::new(),
///     degraded: Some("embedding provider timed out".into()),
/// };
/// assert!(response.is_degraded());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// The query text as received.
    pub query: String,
    /// The mode that was requested.
    pub mode: SearchMode,
    /// Results, best first.
    pub hits: Vec<SearchHit>,
    /// Set when hybrid search fell back to keyword-only ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl SearchResponse {
    /// Returns `true` if a sub-index was skipped while answering.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use lore_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listing.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
