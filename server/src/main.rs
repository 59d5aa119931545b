//! Vecscope entry point
//!
//! Modes:
//! - `serve`: embedding worker over JSON lines on stdin/stdout
//! - `search`: index a corpus and answer queries in the terminal
//! - `embed`: print the embedding of a single text

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vecscope_core::{EmbeddingConfig, ModelChoice, ReducerConfig};
use vecscope_server::commands;
use vecscope_server::{AppConfig, ServerError};

#[derive(Parser)]
#[command(name = "vecscope")]
#[command(about = "Client-side semantic search with 3-D projection")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Embedding model: all-MiniLM-L6-v2, bge-small-en-v1.5 or hashing
    #[arg(long, global = true, default_value = "all-MiniLM-L6-v2")]
    model: String,

    /// Directory holding cached model weights
    #[arg(long, global = true)]
    models_path: Option<PathBuf>,

    /// Show model download progress
    #[arg(long, global = true)]
    progress: bool,

    /// Number of projected dimensions
    #[arg(long, global = true, default_value_t = 3)]
    components: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Run the embedding worker over stdio
    Serve,
    /// Index a corpus and search it
    Search {
        /// Corpus file, one sentence per line (default: built-in sentences)
        #[arg(long, short)]
        corpus: Option<PathBuf>,

        /// Answer a single query instead of reading queries from stdin
        #[arg(long, short)]
        query: Option<String>,

        /// Number of results to print
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Do not list the projected corpus after indexing
        #[arg(long)]
        hide_corpus: bool,

        /// Print full query embeddings instead of a preview
        #[arg(long)]
        full_vectors: bool,
    },
    /// Print the embedding of a text
    Embed {
        text: String,

        /// Print every component instead of a preview
        #[arg(long)]
        full: bool,
    },
}

impl Args {
    fn app_config(&self) -> Result<AppConfig, ServerError> {
        let model: ModelChoice = self
            .model
            .parse()
            .map_err(|e| ServerError::Config(format!("{}", e)))?;

        let embedding = EmbeddingConfig {
            model,
            show_download_progress: self.progress,
            cache_dir: self.models_path.clone(),
            ..EmbeddingConfig::default()
        };
        let reducer = ReducerConfig {
            n_components: self.components,
            ..ReducerConfig::default()
        };
        Ok(AppConfig::new(embedding, reducer))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr; stdout carries protocol and results.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vecscope=info,vecscope_core=info,vecscope_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let config = args.app_config()?;
    tracing::info!(
        "Using model {} with {} components",
        config.embedding.model,
        config.reducer.n_components
    );

    match args.command {
        Command::Serve => commands::run_serve(&config).await,
        Command::Search {
            corpus,
            query,
            top,
            hide_corpus,
            full_vectors,
        } => {
            let corpus = commands::load_corpus(corpus.as_deref())?;
            let display = commands::DisplayOptions {
                limit: top,
                show_corpus: !hide_corpus,
                full_vectors,
            };
            commands::run_search(&config, corpus, query, display).await
        }
        Command::Embed { text, full } => commands::run_embed(&config, &text, full).await,
    }
}
