use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use lore_core::{Chunk, ChunkStrategy, LoreConfig, OutputFormat, SearchMode, SearchResponse};
use lore_search::{HybridIndex, SearchRequest};

#[derive(Parser)]
#[command(
    name = "lore",
    version,
    about = "Hybrid keyword + vector search over markdown docs",
    long_about = "Lore chunks a markdown documentation tree, indexes the chunks with TF-IDF\n\
                   and embeddings, and answers queries with Reciprocal Rank Fusion.\n\n\
                   Examples:\n  \
                     lore search 'install on windows'           Hybrid search in ./\n  \
                     lore search retries --path docs --mode keyword\n  \
                     lore chunks --path docs --strategy sliding_window\n  \
                     lore init                                  Write a default .lore.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .lore.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listing (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Log build and query progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Search a documentation tree
    #[command(
        long_about = "Search a documentation tree.\n\n\
        Walks the directory for markdown files, chunks them with the configured strategy,\n\
        builds keyword and vector indices in memory, and runs one query. Hybrid mode fuses\n\
        both rankings; if the embedding provider fails it falls back to keyword ranking.\n\n\
        Examples:\n  lore search 'tool calling'\n  lore search retries --mode keyword --limit 3\n  lore search 'agents' --rrf-k 30 --format json"
    )]
    Search {
        /// Query text
        query: String,

        /// Documentation root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Ranking mode: keyword, vector, or hybrid (default from config)
        #[arg(long)]
        mode: Option<SearchMode>,

        /// Maximum results to return (default from config)
        #[arg(long)]
        limit: Option<usize>,

        /// RRF constant for hybrid mode (default from config)
        #[arg(long)]
        rrf_k: Option<usize>,

        /// Chunking strategy name, overriding the config
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Show the chunks a documentation tree splits into
    #[command(long_about = "Show the chunks a documentation tree splits into.\n\n\
        Useful for tuning [chunking] settings before searching.\n\n\
        Examples:\n  lore chunks --path docs\n  lore chunks --strategy sliding_window --format json")]
    Chunks {
        /// Documentation root (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Chunking strategy name, overriding the config
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Create a default .lore.toml configuration file
    #[command(long_about = "Create a default .lore.toml configuration file.\n\n\
        Generates a template listing every option with its default.\n\
        Fails if .lore.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mlore\x1b[0m v{version}: hybrid search for markdown docs\n");

        println!("Quick start:");
        println!("  \x1b[36mlore init\x1b[0m                  Create a .lore.toml config file");
        println!("  \x1b[36mlore search 'query'\x1b[0m        Search the docs in the current directory");
        println!("  \x1b[36mlore chunks --path docs\x1b[0m    Preview how documents are split\n");
    } else {
        println!("lore v{version}: hybrid search for markdown docs\n");

        println!("Quick start:");
        println!("  lore init                  Create a .lore.toml config file");
        println!("  lore search 'query'        Search the docs in the current directory");
        println!("  lore chunks --path docs    Preview how documents are split\n");
    }

    println!("Run 'lore <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, strategy: Option<&str>) -> Result<LoreConfig> {
    let mut config = match path {
        Some(path) => LoreConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".lore.toml");
            if default_path.exists() {
                LoreConfig::from_file(default_path)?
            } else {
                LoreConfig::default()
            }
        }
    };
    if let Some(name) = strategy {
        config.chunking = ChunkStrategy::from_name(name)?;
    }
    Ok(config)
}

fn spinner(message: &'static str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn preview(text: &str, lines: usize) -> String {
    text.lines()
        .take(lines)
        .map(|l| format!("   {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_response(response: &SearchResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(response).into_diagnostic()?
            );
        }
        OutputFormat::Markdown => {
            println!("# Search Results\n");
            if let Some(reason) = &response.degraded {
                println!("> Keyword results only: {reason}\n");
            }
            if response.hits.is_empty() {
                println!("No results found.");
            }
            for hit in &response.hits {
                println!(
                    "## {}. `{}` ({}, score: {:.4})\n\n{}\n",
                    hit.rank, hit.source, hit.position, hit.score, hit.text,
                );
            }
        }
        OutputFormat::Text => {
            if let Some(reason) = &response.degraded {
                eprintln!("note: showing keyword results only ({reason})");
            }
            if response.hits.is_empty() {
                println!("No results found.");
            }
            for hit in &response.hits {
                println!(
                    "{}. {} ({}) (score: {:.4})",
                    hit.rank, hit.source, hit.position, hit.score,
                );
                println!("{}\n", preview(&hit.text, 3));
            }
        }
    }
    Ok(())
}

fn print_chunks(chunks: &[Chunk], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(chunks).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Chunks\n");
            for chunk in chunks {
                println!(
                    "- **{}** `{}` ({} words)",
                    chunk.id,
                    chunk.citation(),
                    chunk.text.split_whitespace().count(),
                );
            }
        }
        OutputFormat::Text => {
            for chunk in chunks {
                println!(
                    "{:>4}  {}  ({} words)",
                    chunk.id,
                    chunk.citation(),
                    chunk.text.split_whitespace().count(),
                );
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Lore Configuration

[source]
# extensions = ["md", "mdx"]

[chunking]
# One chunk per markdown section at header depth <= level
strategy = "header_section"
level = 2
# Or fixed windows of `size` words advancing by `step` (step <= size)
# strategy = "sliding_window"
# size = 2000
# step = 1000

[embedding]
# provider = "hashing"                 # "hashing" (offline) or "openai"
# model = "text-embedding-3-small"     # default depends on provider
# base_url = "https://api.openai.com/v1"
# api_key = "..."                      # or LORE_EMBEDDING_API_KEY
# dimensions = 384
# timeout_ms = 10000

[search]
# mode = "hybrid"                      # "keyword", "vector" or "hybrid"
# top_k = 5
# rrf_k = 60
# candidate_multiplier = 2
# vector_enabled = true

[keyword]
# text_boost = 1.0
# source_boost = 0.0                   # > 0 also matches file paths

[vector]
# enrich_with_source = false           # prefix path and title before embedding
# min_similarity = 0.2
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Search {
            ref query,
            ref path,
            mode,
            limit,
            rrf_k,
            ref strategy,
        }) => {
            let config = load_config(cli.config.as_deref(), strategy.as_deref())?;
            let docs = lore_ingest::walk_docs(path, &config.source)?;
            tracing::info!(documents = docs.len(), path = %path.display(), "loaded documents");
            if docs.is_empty() {
                eprintln!("No documents found under {}", path.display());
            }

            let provider = lore_search::provider_from_config(&config.embedding)?;
            let pb = spinner("Building index...");
            let index = HybridIndex::build_from_documents(&docs, provider, &config)
                .await
                .inspect_err(|_e| {
                    if let Some(pb) = &pb {
                        pb.finish_with_message("Failed");
                    }
                })?;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            let request = SearchRequest {
                query: query.clone(),
                mode,
                top_k: limit,
                rrf_k,
            };
            let response = index.search(&request).await?;
            print_response(&response, cli.format)?;
        }
        Some(Command::Chunks {
            ref path,
            ref strategy,
        }) => {
            let config = load_config(cli.config.as_deref(), strategy.as_deref())?;
            let docs = lore_ingest::walk_docs(path, &config.source)?;
            let chunks = lore_ingest::chunk_corpus(&docs, &config.chunking)?;
            print_chunks(&chunks, cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(".lore.toml");
            if path.exists() {
                miette::bail!(".lore.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .lore.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lore", &mut std::io::stdout());
        }
    }

    Ok(())
}
