//! CLI command implementations

use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult};
use crate::serve::serve;
use crate::terminal::{format_vector_preview, TerminalView, PREVIEW_COMPONENTS};
use crate::transport::{RequestReader, ResponseWriter};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use vecscope_core::{
    Corpus, EmbeddingWorker, RequestBroker, SearchOrchestrator, SearchState, SearchView,
};

/// Run the JSON-lines worker on stdin/stdout.
pub async fn run_serve(config: &AppConfig) -> ServerResult<()> {
    serve(
        RequestReader::stdin(),
        ResponseWriter::stdout(),
        config.engine_handle(),
        config.reducer.clone(),
    )
    .await
}

/// Load the corpus from `path`, or the built-in sentences.
pub fn load_corpus(path: Option<&Path>) -> ServerResult<Corpus> {
    match path {
        Some(path) => Ok(Corpus::from_file(path)?),
        None => Ok(Corpus::default()),
    }
}

/// How search results are printed
#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    /// Number of results to print
    pub limit: usize,
    pub show_corpus: bool,
    pub full_vectors: bool,
}

impl DisplayOptions {
    pub fn terminal_view(&self) -> TerminalView<std::io::Stdout> {
        TerminalView::stdout(self.limit)
            .with_corpus_listing(self.show_corpus)
            .with_full_vectors(self.full_vectors)
    }
}

/// Index the corpus, then answer one query or every line of stdin.
pub async fn run_search(
    config: &AppConfig,
    corpus: Corpus,
    query: Option<String>,
    display: DisplayOptions,
) -> ServerResult<()> {
    let view: Arc<dyn SearchView> = Arc::new(display.terminal_view());
    let (channels, _worker) = EmbeddingWorker::spawn(config.engine_handle(), config.reducer.clone());
    let search = SearchOrchestrator::new(RequestBroker::connect(channels), corpus, view);

    search.start().await?;

    match query {
        Some(query) => {
            search.search(&query).await?;
            Ok(())
        }
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            answer_lines(&search, stdin).await
        }
    }
}

/// Treat each input line as a query until EOF. Per-query failures are
/// reported and skipped; failures that take the session down end the loop.
pub async fn answer_lines<R: AsyncBufRead + Unpin>(
    search: &SearchOrchestrator,
    input: R,
) -> ServerResult<()> {
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match search.search(&line).await {
            Ok(_) => {}
            Err(e) if e.is_fatal() || search.state() == SearchState::Error => {
                return Err(e.into())
            }
            Err(e) => tracing::warn!("Search failed: {}", e),
        }
    }
    Ok(())
}

/// Print the embedding of a single text, in full or as a preview.
pub async fn run_embed(config: &AppConfig, text: &str, full: bool) -> ServerResult<()> {
    let engine = config.engine_handle().get().await?;
    let owned = text.to_string();
    let vector = {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || engine.embed_text(&owned))
            .await
            .map_err(|e| ServerError::Worker(e.to_string()))??
    };

    println!("Model: {} ({}d)", engine.model_name(), engine.dimension());
    println!(
        "Vector: {}",
        format_vector_preview(&vector, if full { vector.len() } else { PREVIEW_COMPONENTS })
    );
    Ok(())
}
