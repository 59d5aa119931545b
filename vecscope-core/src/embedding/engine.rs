//! Vector embedding engine
//!
//! High-level API for generating and caching embeddings.

use super::batch::EmbeddingBatch;
use super::config::{EmbeddingConfig, ModelChoice};
use super::discovery::find_model_cache_dir;
use super::hashing::HashingEmbedder;
use super::onnx::OnnxEmbedder;
use super::{l2_normalize, TextEmbedder};
use crate::error::{Result, VecscopeError};
use crate::protocol::TextInput;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

/// Vector embedding engine with caching
///
/// Wraps a [`TextEmbedder`] with a DashMap cache for repeated lookups and
/// enforces the output contract: every vector has the same dimension and
/// unit L2 norm.
pub struct VectorEngine {
    model: Arc<dyn TextEmbedder>,
    cache: DashMap<String, Vec<f32>>,
    dimension: usize,
}

impl VectorEngine {
    /// Load the model named by `config`.
    ///
    /// # Arguments
    /// * `config` - Model choice and inference settings
    /// * `install_root` - Optional install root used for bundled model discovery
    pub fn load(config: &EmbeddingConfig, install_root: Option<&Path>) -> Result<Self> {
        let engine = match config.model {
            ModelChoice::Hashing => Self::new(Arc::new(HashingEmbedder::new(
                config.hashing_dimension,
            )?)),
            _ => {
                let cache_dir = match &config.cache_dir {
                    Some(dir) => dir.clone(),
                    None => find_model_cache_dir(install_root),
                };
                Self::new(Arc::new(OnnxEmbedder::load(config, &cache_dir)?))
            }
        };

        log::info!(
            "VectorEngine ready ({}, {}d)",
            engine.model_name(),
            engine.dimension()
        );
        Ok(engine)
    }

    /// Create VectorEngine around an already loaded model
    pub fn new(model: Arc<dyn TextEmbedder>) -> Self {
        let dimension = model.dimension();
        Self {
            model,
            cache: DashMap::new(),
            dimension,
        }
    }

    /// Embed one text or a sequence of texts.
    ///
    /// The batch has one row per input text, in input order.
    pub fn embed(&self, input: &TextInput) -> Result<EmbeddingBatch> {
        let texts = input.texts();
        if texts.is_empty() {
            return Err(VecscopeError::invalid_input("no texts to embed"));
        }
        if let Some(pos) = texts.iter().position(|t| t.is_empty()) {
            return Err(VecscopeError::invalid_input(format!(
                "text at position {} is empty",
                pos
            )));
        }

        let rows = self.embed_batch(&texts)?;
        EmbeddingBatch::from_rows(rows)
    }

    /// Generate a single embedding with caching
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut rows = self.embed_batch(&[text])?;
        rows.pop()
            .ok_or_else(|| VecscopeError::embedding("model returned no embeddings"))
    }

    /// Batch embed with caching
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // Check cache for all texts
        let mut results: Vec<Option<Vec<f32>>> = texts
            .iter()
            .map(|text| self.cache.get(*text).map(|v| v.clone()))
            .collect();

        // Find uncached texts
        let uncached: Vec<(usize, &str)> = results
            .iter()
            .enumerate()
            .filter(|(_, cached)| cached.is_none())
            .map(|(i, _)| (i, texts[i]))
            .collect();

        if !uncached.is_empty() {
            let uncached_texts: Vec<&str> = uncached.iter().map(|(_, t)| *t).collect();
            let new_embeddings = self.model.embed_batch(&uncached_texts)?;
            if new_embeddings.len() != uncached_texts.len() {
                return Err(VecscopeError::embedding(format!(
                    "model returned {} embeddings for {} texts",
                    new_embeddings.len(),
                    uncached_texts.len()
                )));
            }

            for ((idx, text), mut emb) in uncached.iter().zip(new_embeddings) {
                if emb.len() != self.dimension {
                    return Err(VecscopeError::embedding(format!(
                        "model returned a {}d vector, expected {}d",
                        emb.len(),
                        self.dimension
                    )));
                }
                l2_normalize(&mut emb);
                self.cache.insert(text.to_string(), emb.clone());
                results[*idx] = Some(emb);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
