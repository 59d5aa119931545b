//! Rendering and UI-state collaborators
//!
//! The orchestrator only pushes data through [`SearchView`]; drawing points,
//! highlighting and enabling inputs are up to the implementation.

use serde::Serialize;
use std::fmt;

/// A point in the visualization space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Coordinate3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Take the first three components; missing ones are 0.
    pub fn from_slice(values: &[f32]) -> Self {
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Self::new(at(0), at(1), at(2))
    }
}

impl fmt::Display for Coordinate3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }
}

/// One ranked corpus item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Position in the corpus
    pub index: usize,
    /// Cosine similarity to the query
    pub score: f32,
    pub text: String,
}

/// Session state as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchState {
    /// Waiting for the model
    Loading,
    Indexing,
    Ready,
    Searching,
    Error,
}

impl SearchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
            Self::Searching => "searching",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of everything the orchestrator wants shown
pub trait SearchView: Send + Sync {
    fn set_state(&self, state: SearchState);

    /// Called once, after indexing, with one point per corpus item.
    fn plot_corpus(&self, points: &[Coordinate3D], texts: &[String]);

    /// Called on every search; replaces the previous query point.
    fn plot_query(&self, point: Coordinate3D, text: &str, embedding: &[f32]);

    fn highlight(&self, index: Option<usize>);

    fn show_results(&self, results: &[SearchResult]);

    /// The query was blank; drop whatever query is on display.
    fn clear_query(&self) {}
}

/// View that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl SearchView for NullView {
    fn set_state(&self, _state: SearchState) {}
    fn plot_corpus(&self, _points: &[Coordinate3D], _texts: &[String]) {}
    fn plot_query(&self, _point: Coordinate3D, _text: &str, _embedding: &[f32]) {}
    fn highlight(&self, _index: Option<usize>) {}
    fn show_results(&self, _results: &[SearchResult]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_from_short_slice() {
        assert_eq!(Coordinate3D::from_slice(&[1.0]), Coordinate3D::new(1.0, 0.0, 0.0));
        assert_eq!(
            Coordinate3D::from_slice(&[1.0, 2.0, 3.0, 4.0]),
            Coordinate3D::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SearchState::Loading.to_string(), "loading");
        assert_eq!(
            serde_json::to_value(SearchState::Searching).unwrap(),
            serde_json::json!("searching")
        );
    }
}
