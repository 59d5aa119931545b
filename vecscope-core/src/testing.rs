//! Test fixtures shared across modules

use crate::embedding::{l2_normalize, EngineHandle, TextEmbedder, VectorEngine};
use crate::error::Result;
use crate::view::{Coordinate3D, SearchResult, SearchState, SearchView};
use parking_lot::Mutex;
use std::sync::Arc;

/// Maps words to hand-picked concept axes so that synonyms share direction.
pub struct ConceptEmbedder;

const CONCEPTS: &[(&[&str], usize)] = &[
    (&["cat", "feline", "kitten"], 0),
    (&["dog", "puppy", "hound"], 1),
    (&["sat", "rested", "slept"], 2),
    (&["ran", "sprinted", "raced"], 3),
    (&["sun", "star"], 4),
    (&["market", "stock", "economy"], 5),
];

pub const CONCEPT_DIM: usize = 8;

impl TextEmbedder for ConceptEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0_f32; CONCEPT_DIM];
                for word in text.split_whitespace() {
                    let word = word.to_lowercase();
                    let axis = CONCEPTS
                        .iter()
                        .find(|(words, _)| words.contains(&word.as_str()))
                        .map(|(_, axis)| *axis)
                        .unwrap_or(CONCEPT_DIM - 1);
                    v[axis] += 1.0;
                }
                l2_normalize(&mut v);
                v
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        CONCEPT_DIM
    }

    fn model_name(&self) -> &str {
        "concepts"
    }
}

pub fn concept_handle() -> Arc<EngineHandle> {
    Arc::new(EngineHandle::ready(VectorEngine::new(Arc::new(
        ConceptEmbedder,
    ))))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    State(SearchState),
    Corpus(usize),
    Query(String),
    Highlight(Option<usize>),
    Results(usize),
    Cleared,
}

/// View that records every call
#[derive(Default)]
pub struct RecordingView {
    pub events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn states(&self) -> Vec<SearchState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &ViewEvent) -> bool {
        self.events.lock().contains(event)
    }
}

impl SearchView for RecordingView {
    fn set_state(&self, state: SearchState) {
        self.events.lock().push(ViewEvent::State(state));
    }

    fn plot_corpus(&self, points: &[Coordinate3D], _texts: &[String]) {
        self.events.lock().push(ViewEvent::Corpus(points.len()));
    }

    fn plot_query(&self, _point: Coordinate3D, text: &str, _embedding: &[f32]) {
        self.events.lock().push(ViewEvent::Query(text.to_string()));
    }

    fn highlight(&self, index: Option<usize>) {
        self.events.lock().push(ViewEvent::Highlight(index));
    }

    fn show_results(&self, results: &[SearchResult]) {
        self.events.lock().push(ViewEvent::Results(results.len()));
    }

    fn clear_query(&self) {
        self.events.lock().push(ViewEvent::Cleared);
    }
}
