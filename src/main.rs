//! # Textbook RAG CLI (`rag`)
//!
//! The `rag` binary builds the retrieval index from a textbook PDF and
//! answers questions against it, from the terminal or over HTTP.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag extract <pdf>` | Extract the PDF's text to a file |
//! | `rag chunk <txt>` | Split text into overlapping chunk files |
//! | `rag build` | Build the TF-IDF index from the chunk files |
//! | `rag ingest <pdf>` | Extract, chunk, and build in one step |
//! | `rag search "<query>"` | Show the top-ranked chunks |
//! | `rag ask "<question>"` | Answer a question with sources |
//! | `rag serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! rag ingest ./textbook/book.pdf
//! rag search "humanoid balance control" --k 5
//! rag ask "What is ROS 2?"
//! rag serve --config ./config/rag.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use textbook_rag::config::{self, Config};
use textbook_rag::service::ServiceContext;
use textbook_rag::{ingest, search, server};

const DEFAULT_CONFIG: &str = "./config/rag.toml";

/// Textbook RAG: question answering over a textbook with a TF-IDF retriever.
///
/// Settings come from a TOML file (`--config`, default `./config/rag.toml`).
/// Without one, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Textbook RAG: question answering over a textbook with a TF-IDF retriever",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Serve the built-in demo corpus if the index cannot be loaded.
    #[arg(long, global = true)]
    demo_fallback: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the text of a PDF.
    Extract {
        /// PDF file to read.
        pdf: PathBuf,

        /// Output text file.
        #[arg(long, default_value = "./data/textbook.txt")]
        out: PathBuf,
    },

    /// Split a text file into overlapping chunk files.
    ///
    /// Blank-line runs are collapsed first. Existing chunk files in the
    /// output directory are replaced.
    Chunk {
        /// Text file to chunk.
        text: PathBuf,

        /// Output directory (defaults to `[corpus].chunks_dir`).
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        chunking: ChunkingArgs,
    },

    /// Build the index from the chunk files.
    Build {
        /// Chunk directory (defaults to `[corpus].chunks_dir`).
        #[arg(long)]
        chunks_dir: Option<PathBuf>,

        /// Index artifact path (defaults to `[index].path`).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Extract, chunk, and build in one step.
    Ingest {
        /// PDF file to ingest.
        pdf: PathBuf,

        /// Chunk directory (defaults to `[corpus].chunks_dir`).
        #[arg(long)]
        chunks_dir: Option<PathBuf>,

        /// Index artifact path (defaults to `[index].path`).
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        chunking: ChunkingArgs,
    },

    /// Show the top-ranked chunks for a query.
    Search {
        query: String,

        /// Number of results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question using the configured answer provider.
    Ask { question: String },

    /// Start the HTTP API.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Chunking overrides shared by `chunk` and `ingest`.
#[derive(clap::Args)]
struct ChunkingArgs {
    /// Window size in characters.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by neighbouring windows.
    #[arg(long)]
    overlap: Option<usize>,
}

impl ChunkingArgs {
    fn apply(&self, cfg: &mut Config) -> anyhow::Result<()> {
        if let Some(size) = self.chunk_size {
            cfg.chunking.chunk_size = size;
        }
        if let Some(overlap) = self.overlap {
            cfg.chunking.overlap = overlap;
        }
        cfg.validate()
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let default_config = std::path::Path::new(DEFAULT_CONFIG);
    let mut cfg = config::resolve_config(cli.config.as_deref(), default_config)?;

    match cli.command {
        Commands::Extract { pdf, out } => {
            ingest::run_extract(&pdf, &out)?;
        }
        Commands::Chunk {
            text,
            out,
            chunking,
        } => {
            chunking.apply(&mut cfg)?;
            let out = out.unwrap_or_else(|| cfg.corpus.chunks_dir.clone());
            ingest::run_chunk(&cfg, &text, &out)?;
        }
        Commands::Build { chunks_dir, out } => {
            let chunks_dir = chunks_dir.unwrap_or_else(|| cfg.corpus.chunks_dir.clone());
            let out = out.unwrap_or_else(|| cfg.index.path.clone());
            ingest::run_build(&cfg, &chunks_dir, &out)?;
        }
        Commands::Ingest {
            pdf,
            chunks_dir,
            out,
            chunking,
        } => {
            chunking.apply(&mut cfg)?;
            let chunks_dir = chunks_dir.unwrap_or_else(|| cfg.corpus.chunks_dir.clone());
            let out = out.unwrap_or_else(|| cfg.index.path.clone());
            ingest::run_ingest(&cfg, &pdf, &chunks_dir, &out)?;
        }
        Commands::Search { query, k } => {
            if k == Some(0) {
                anyhow::bail!("--k must be >= 1");
            }
            let ctx = ServiceContext::for_search(cfg, cli.demo_fallback)?;
            search::run_search(&ctx, &query, k)?;
        }
        Commands::Ask { question } => {
            let ctx = ServiceContext::from_config(cfg, cli.demo_fallback)?;
            search::run_ask(&ctx, &question).await?;
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            let ctx = ServiceContext::from_config(cfg, cli.demo_fallback)?;
            server::run_server(Arc::new(ctx)).await?;
        }
    }

    Ok(())
}
