//! Dimensionality reduction for visualization
//!
//! A reducer is fitted once on the corpus embeddings and afterwards only
//! projects new vectors into the fitted space.

mod eigen;
mod pca;

pub use eigen::SymmetricEigen;
pub use pca::{Pca, ProjectionBasis};

use crate::error::{Result, VecscopeError};
use ndarray::{Array2, ArrayView2};

/// Fit-once, project-many linear reducer
pub trait DimensionalityReducer: Send + Sync {
    /// Learn the projection basis from `x` (one sample per row).
    fn fit(&mut self, x: ArrayView2<'_, f32>) -> Result<()>;

    /// Project `x` into the fitted space. Fails with a state error before `fit`.
    fn transform(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>>;

    fn n_components(&self) -> usize;

    fn is_fitted(&self) -> bool;

    fn fit_transform(&mut self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Reducer configuration
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// Algorithm name (only "pca" is supported)
    pub algorithm: String,
    /// Output dimensions (default: 3)
    pub n_components: usize,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            algorithm: "pca".to_string(),
            n_components: 3,
        }
    }
}

/// Build an unfitted reducer by algorithm name.
pub fn create_reducer(config: &ReducerConfig) -> Result<Box<dyn DimensionalityReducer>> {
    if config.n_components == 0 {
        return Err(VecscopeError::invalid_input(
            "n_components must be at least 1",
        ));
    }
    match config.algorithm.to_ascii_lowercase().as_str() {
        "pca" => Ok(Box::new(Pca::new(config.n_components))),
        other => Err(VecscopeError::invalid_input(format!(
            "Unknown dimensionality reduction algorithm: {}",
            other
        ))),
    }
}

/// Split a projected matrix into per-row coordinate vectors.
pub fn into_rows(points: Array2<f32>) -> Vec<Vec<f32>> {
    points.outer_iter().map(|row| row.to_vec()).collect()
}
