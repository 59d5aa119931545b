//! Corpus provider
//!
//! The ordered texts that get indexed. Item `i` keeps index `i` everywhere:
//! in the embedding batch, in the 3-D coordinates, and in search results.

use crate::error::{Result, VecscopeError};
use std::path::Path;

/// Sentences of the built-in demonstration corpus
pub const DEFAULT_CORPUS: &[&str] = &[
    "The cat sat on the mat.",
    "My dog loves to chase squirrels.",
    "The sun is a star.",
    "Jupiter is the largest planet in our solar system.",
    "I enjoy reading books about history.",
    "She is a talented musician who plays the piano.",
    "The new software update includes several security patches.",
    "To build a web application, you need to know HTML, CSS, and JavaScript.",
    "The stock market experienced a significant downturn.",
    "Economic policy can have a major impact on inflation.",
];

/// Non-empty, ordered list of texts
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    texts: Vec<String>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self {
            texts: DEFAULT_CORPUS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Corpus {
    /// Build a corpus; blank entries are not allowed.
    pub fn new(texts: Vec<String>) -> Result<Self> {
        if texts.is_empty() {
            return Err(VecscopeError::invalid_input("corpus is empty"));
        }
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(VecscopeError::invalid_input(format!(
                "corpus item {} is blank",
                pos
            )));
        }
        Ok(Self { texts })
    }

    /// Read one item per non-blank line.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let texts: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        log::info!("Loaded {} corpus items from {}", texts.len(), path.display());
        Self::new(texts)
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.texts.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}
