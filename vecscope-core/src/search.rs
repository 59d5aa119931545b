//! Search orchestrator
//!
//! Indexes the corpus once (embed as one batch, fit the reducer, keep both
//! results) and then answers queries against that fixed index.
//!
//! States: `Loading -> Indexing -> Ready <-> Searching`, with `Error`
//! reachable from indexing or searching. `Error` is terminal for the session.

use crate::broker::RequestBroker;
use crate::corpus::Corpus;
use crate::embedding::{cosine_similarity, EmbeddingBatch};
use crate::error::{Result, VecscopeError};
use crate::view::{Coordinate3D, SearchResult, SearchState, SearchView};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

/// Corpus embeddings and their fitted 3-D coordinates, built once per session
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    pub embeddings: EmbeddingBatch,
    pub coordinates: Vec<Coordinate3D>,
}

/// Session state and the number of searches still running
struct Session {
    state: SearchState,
    in_flight: usize,
}

/// Drives indexing and search over a [`RequestBroker`]
pub struct SearchOrchestrator {
    broker: RequestBroker,
    view: Arc<dyn SearchView>,
    corpus: Corpus,
    index: OnceCell<CorpusIndex>,
    session: Mutex<Session>,
    last_query: Mutex<Option<Coordinate3D>>,
}

impl SearchOrchestrator {
    pub fn new(broker: RequestBroker, corpus: Corpus, view: Arc<dyn SearchView>) -> Self {
        Self {
            broker,
            view,
            corpus,
            index: OnceCell::new(),
            session: Mutex::new(Session {
                state: SearchState::Loading,
                in_flight: 0,
            }),
            last_query: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SearchState {
        self.session.lock().state
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// The index, once [`start`](Self::start) has completed
    pub fn corpus_index(&self) -> Option<&CorpusIndex> {
        self.index.get()
    }

    /// Projection of the most recent query
    pub fn last_query_point(&self) -> Option<Coordinate3D> {
        *self.last_query.lock()
    }

    /// Wait for the model, then index the corpus.
    ///
    /// Works whether or not the model became ready before this call. Once
    /// the corpus is indexed, further calls leave the session as it is.
    pub async fn start(&self) -> Result<()> {
        if self.index.initialized() {
            return self.ensure_usable();
        }

        self.set_state(SearchState::Loading);
        if let Err(e) = self.broker.readiness().wait_ready().await {
            log::error!("Model loading failed: {}", e);
            self.set_state(SearchState::Error);
            return Err(e);
        }
        self.ensure_indexed().await?;

        // A concurrent start may have indexed while this call was loading.
        let mut session = self.session.lock();
        if session.state == SearchState::Loading {
            self.transition(&mut session, SearchState::Ready);
        }
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state() == SearchState::Error {
            return Err(VecscopeError::state(
                "search is disabled after a fatal error; reload to retry",
            ));
        }
        Ok(())
    }

    async fn ensure_indexed(&self) -> Result<&CorpusIndex> {
        self.index
            .get_or_try_init(|| async {
                self.set_state(SearchState::Indexing);
                match self.build_index().await {
                    Ok(index) => {
                        self.view.plot_corpus(&index.coordinates, self.corpus.texts());
                        self.set_state(SearchState::Ready);
                        Ok(index)
                    }
                    Err(e) => {
                        log::error!("Corpus indexing failed: {}", e);
                        self.set_state(SearchState::Error);
                        Err(e)
                    }
                }
            })
            .await
    }

    async fn build_index(&self) -> Result<CorpusIndex> {
        let started = Instant::now();

        let payload = self.broker.embed(self.corpus.texts().to_vec()).await?;
        let embeddings = payload.to_batch()?;
        if embeddings.rows() != self.corpus.len() {
            return Err(VecscopeError::protocol(format!(
                "got {} corpus embeddings for {} items",
                embeddings.rows(),
                self.corpus.len()
            )));
        }

        let points = self.broker.reduce_corpus(&payload).await?;
        if points.len() != self.corpus.len() {
            return Err(VecscopeError::protocol(format!(
                "got {} corpus coordinates for {} items",
                points.len(),
                self.corpus.len()
            )));
        }
        let coordinates = points.iter().map(|p| Coordinate3D::from_slice(p)).collect();

        log::info!(
            "Indexed {} corpus items ({}d) in {:?}",
            embeddings.rows(),
            embeddings.dim(),
            started.elapsed()
        );
        Ok(CorpusIndex {
            embeddings,
            coordinates,
        })
    }

    /// Rank every corpus item against `query`.
    ///
    /// A blank query sends nothing and returns no results. Searches may run
    /// concurrently; each request is correlated independently.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            *self.last_query.lock() = None;
            self.view.clear_query();
            return Ok(vec![]);
        }
        let index = {
            let mut session = self.session.lock();
            if session.state == SearchState::Error {
                return Err(VecscopeError::state(
                    "search is disabled after a fatal error; reload to retry",
                ));
            }
            let index = self
                .index
                .get()
                .ok_or_else(|| VecscopeError::state("corpus has not been indexed yet"))?;
            session.in_flight += 1;
            self.transition(&mut session, SearchState::Searching);
            index
        };

        let started = Instant::now();
        let outcome = self.run_search(index, query).await;

        match &outcome {
            Ok(results) => log::debug!(
                "Search for {:?} ranked {} items in {:?}",
                query,
                results.len(),
                started.elapsed()
            ),
            Err(e) => log::error!("Search failed: {}", e),
        }

        let fatal = matches!(&outcome, Err(e) if e.is_fatal())
            || self.broker.readiness().current().is_failed();
        let mut session = self.session.lock();
        session.in_flight -= 1;
        if fatal {
            self.transition(&mut session, SearchState::Error);
        } else if session.in_flight == 0 {
            self.transition(&mut session, SearchState::Ready);
        }
        drop(session);
        outcome
    }

    async fn run_search(&self, index: &CorpusIndex, query: &str) -> Result<Vec<SearchResult>> {
        let payload = self.broker.embed(query).await?;
        let batch = payload.to_batch()?;
        if batch.dim() != index.embeddings.dim() {
            return Err(VecscopeError::protocol(format!(
                "query embedding is {}d but the corpus is {}d",
                batch.dim(),
                index.embeddings.dim()
            )));
        }
        let query_vector = batch.row(0);

        let projected = self.broker.project_query(&payload).await?;
        let point = projected
            .first()
            .map(|p| Coordinate3D::from_slice(p))
            .ok_or_else(|| VecscopeError::protocol("query projection was empty"))?;
        *self.last_query.lock() = Some(point);
        self.view.plot_query(point, query, query_vector);

        let results = rank(&index.embeddings, query_vector, self.corpus.texts());
        self.view.highlight(results.first().map(|r| r.index));
        self.view.show_results(&results);
        Ok(results)
    }

    fn set_state(&self, next: SearchState) {
        let mut session = self.session.lock();
        self.transition(&mut session, next);
    }

    /// Record and publish a state change while holding the session lock, so
    /// the view sees changes in the order they happen. `Error` is sticky.
    fn transition(&self, session: &mut Session, next: SearchState) {
        if session.state == SearchState::Error && next != SearchState::Error {
            return;
        }
        session.state = next;
        self.view.set_state(next);
    }
}

/// Score every corpus row by cosine similarity to `query`.
///
/// Sorted by descending score; equal scores keep corpus order.
pub fn rank(embeddings: &EmbeddingBatch, query: &[f32], texts: &[String]) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = embeddings
        .iter_rows()
        .zip(texts)
        .enumerate()
        .map(|(index, (row, text))| SearchResult {
            index,
            score: cosine_similarity(query, row),
            text: text.clone(),
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
    results
}
