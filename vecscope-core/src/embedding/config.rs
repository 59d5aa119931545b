//! Embedding model selection and configuration

use crate::error::{Result, VecscopeError};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Models the engine knows how to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelChoice {
    /// sentence-transformers/all-MiniLM-L6-v2 (384d, mean pooling)
    #[default]
    MiniLmL6V2,
    /// BAAI/bge-small-en-v1.5 (384d)
    BgeSmallEnV15,
    /// Offline feature-hashing embedder, no weights required
    Hashing,
}

impl ModelChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MiniLmL6V2 => "all-MiniLM-L6-v2",
            Self::BgeSmallEnV15 => "bge-small-en-v1.5",
            Self::Hashing => "hashing",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelChoice {
    type Err = VecscopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" | "minilm" => Ok(Self::MiniLmL6V2),
            "bge-small-en-v1.5" | "bge-small" => Ok(Self::BgeSmallEnV15),
            "hashing" => Ok(Self::Hashing),
            other => Err(VecscopeError::invalid_input(format!(
                "unknown embedding model: {}",
                other
            ))),
        }
    }
}

/// Embedding engine configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Which model to load (default: all-MiniLM-L6-v2)
    pub model: ModelChoice,
    /// Maximum sequence length in tokens (default: 256)
    pub max_length: usize,
    /// Batch size for inference (default: 64)
    pub batch_size: usize,
    /// Print download progress while fetching weights (default: false)
    pub show_download_progress: bool,
    /// Where model weights are cached; discovered when `None`
    pub cache_dir: Option<PathBuf>,
    /// Output dimension of the hashing embedder (default: 384)
    pub hashing_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: ModelChoice::default(),
            max_length: 256,
            batch_size: 64,
            show_download_progress: false,
            cache_dir: None,
            hashing_dimension: 384,
        }
    }
}
