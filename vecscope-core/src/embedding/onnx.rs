//! ONNX sentence-transformer embeddings via fastembed
//!
//! Token representations are mean-pooled and L2-normalized by the model
//! pipeline, so similarity downstream is a plain dot product.

use super::config::{EmbeddingConfig, ModelChoice};
use super::TextEmbedder;
use crate::error::{Result, VecscopeError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;

/// fastembed-backed transformer model
pub struct OnnxEmbedder {
    model: TextEmbedding,
    choice: ModelChoice,
    batch_size: usize,
    dimension: usize,
}

impl OnnxEmbedder {
    /// Load (downloading on first use) the configured model into `cache_dir`.
    ///
    /// This is slow and blocking; callers run it off the async runtime.
    pub fn load(config: &EmbeddingConfig, cache_dir: &Path) -> Result<Self> {
        let model_id = match config.model {
            ModelChoice::MiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            ModelChoice::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            ModelChoice::Hashing => {
                return Err(VecscopeError::model(
                    "the hashing embedder is not an ONNX model",
                ))
            }
        };

        log::info!(
            "Loading {} from cache {}",
            config.model,
            cache_dir.display()
        );

        let options = InitOptions::new(model_id)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_max_length(config.max_length)
            .with_show_download_progress(config.show_download_progress);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| VecscopeError::model(format!("Failed to load {}: {}", config.model, e)))?;

        // Get dimension by encoding test string
        let probe = model
            .embed(vec!["test"], None)
            .map_err(|e| VecscopeError::model(format!("Failed to encode test string: {}", e)))?;
        let dimension = probe
            .first()
            .map(Vec::len)
            .ok_or_else(|| VecscopeError::model("model returned no embeddings"))?;

        log::info!(
            "Loaded {} ({}d, max {} tokens)",
            config.model,
            dimension,
            config.max_length
        );

        Ok(Self {
            model,
            choice: config.model,
            batch_size: config.batch_size,
            dimension,
        })
    }
}

impl TextEmbedder for OnnxEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        self.model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| VecscopeError::embedding(format!("Failed to encode texts: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        self.choice.as_str()
    }
}
