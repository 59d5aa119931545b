//! Embedding module
//!
//! Turns text into fixed-length, unit-normalized vectors. The default model
//! is all-MiniLM-L6-v2 (384d) served through fastembed; a hashing embedder is
//! available for offline use.

mod batch;
mod config;
mod discovery;
mod engine;
mod handle;
mod hashing;
mod onnx;

pub use batch::EmbeddingBatch;
pub use config::{EmbeddingConfig, ModelChoice};
pub use discovery::{find_model_cache_dir, MODELS_PATH_ENV};
pub use engine::VectorEngine;
pub use handle::{EngineHandle, EngineStatus};
pub use hashing::HashingEmbedder;
pub use onnx::OnnxEmbedder;

use crate::error::Result;

/// A text embedding model
pub trait TextEmbedder: Send + Sync {
    /// Embed texts, one vector per input, in input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

/// Scale `v` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cosine similarity between two embeddings
///
/// Returns 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
