//! Plain-text rendering of search state for the terminal

use parking_lot::Mutex;
use std::io::Write;
use vecscope_core::{Coordinate3D, SearchResult, SearchState, SearchView};

/// Number of leading vector components shown in previews
pub const PREVIEW_COMPONENTS: usize = 4;

/// Format the first `count` components with 4 decimals, marking truncation.
///
/// ```
/// use vecscope_server::terminal::format_vector_preview;
/// assert_eq!(format_vector_preview(&[0.5, -0.25, 1.0], 2), "[0.5000, -0.2500, ...]");
/// ```
pub fn format_vector_preview(vector: &[f32], count: usize) -> String {
    let mut parts: Vec<String> = vector
        .iter()
        .take(count)
        .map(|v| format!("{:.4}", v))
        .collect();
    if vector.len() > count {
        parts.push("...".to_string());
    }
    format!("[{}]", parts.join(", "))
}

/// [`SearchView`] that prints to a writer
pub struct TerminalView<W: Write + Send> {
    out: Mutex<W>,
    limit: usize,
    show_corpus: bool,
    full_vectors: bool,
    highlighted: Mutex<Option<usize>>,
}

impl TerminalView<std::io::Stdout> {
    pub fn stdout(limit: usize) -> Self {
        Self::new(std::io::stdout(), limit)
    }
}

impl<W: Write + Send> TerminalView<W> {
    /// `limit` caps the number of printed results.
    pub fn new(out: W, limit: usize) -> Self {
        Self {
            out: Mutex::new(out),
            limit,
            show_corpus: true,
            full_vectors: false,
            highlighted: Mutex::new(None),
        }
    }

    pub fn with_corpus_listing(mut self, show: bool) -> Self {
        self.show_corpus = show;
        self
    }

    /// Print every component of query embeddings instead of a preview.
    pub fn with_full_vectors(mut self, full: bool) -> Self {
        self.full_vectors = full;
        self
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{}", text).and_then(|_| out.flush()) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write + Send> SearchView for TerminalView<W> {
    fn set_state(&self, state: SearchState) {
        match state {
            SearchState::Loading => tracing::info!("Loading embedding model..."),
            SearchState::Indexing => tracing::info!("Indexing corpus..."),
            SearchState::Error => self.emit("Search is unavailable, see the log for details."),
            SearchState::Ready | SearchState::Searching => {
                tracing::debug!("Search state: {}", state)
            }
        }
    }

    fn plot_corpus(&self, points: &[Coordinate3D], texts: &[String]) {
        if !self.show_corpus {
            return;
        }
        self.emit(&format!("Corpus ({} sentences):", texts.len()));
        for (i, (point, text)) in points.iter().zip(texts).enumerate() {
            self.emit(&format!("  #{:<3} {}  {}", i, point, text));
        }
    }

    fn plot_query(&self, point: Coordinate3D, text: &str, embedding: &[f32]) {
        let shown = if self.full_vectors {
            embedding.len()
        } else {
            PREVIEW_COMPONENTS
        };
        self.emit(&format!("Query: \"{}\" at {}", text, point));
        self.emit(&format!(
            "  embedding {}d {}",
            embedding.len(),
            format_vector_preview(embedding, shown)
        ));
    }

    fn highlight(&self, index: Option<usize>) {
        *self.highlighted.lock() = index;
    }

    fn show_results(&self, results: &[SearchResult]) {
        let highlighted = *self.highlighted.lock();
        for (rank, result) in results.iter().take(self.limit).enumerate() {
            let marker = if Some(result.index) == highlighted {
                '*'
            } else {
                ' '
            };
            self.emit(&format!(
                "{} {}. Similarity: {:.4}  {}",
                marker,
                rank + 1,
                result.score,
                result.text
            ));
        }
    }

    fn clear_query(&self) {
        *self.highlighted.lock() = None;
    }
}
