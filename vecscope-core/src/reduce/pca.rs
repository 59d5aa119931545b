//! Principal component analysis
//!
//! Fits a mean and the top-k eigenvectors of the feature covariance, then
//! projects new vectors onto that fixed basis.

use super::eigen::SymmetricEigen;
use super::DimensionalityReducer;
use crate::error::{Result, VecscopeError};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Eigenvalues closer than this (relative) are treated as ties
const TIE_TOLERANCE: f64 = 1e-9;

/// Fitted PCA state. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionBasis {
    mean: Array1<f64>,
    /// `k x D`, one direction per row, in projection order
    components: Array2<f64>,
    explained_variance: Vec<f64>,
}

impl ProjectionBasis {
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Covariance eigenvalue behind each direction (0 for padding directions)
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    /// Center `x` on the stored mean and take one dot product per direction.
    pub fn project(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.input_dim() {
            return Err(VecscopeError::invalid_input(format!(
                "expected {}d vectors, got {}d",
                self.input_dim(),
                x.ncols()
            )));
        }
        let centered = x.mapv(f64::from) - &self.mean;
        let projected = centered.dot(&self.components.t());
        Ok(projected.mapv(|v| v as f32))
    }
}

/// PCA reducer; unfitted until [`DimensionalityReducer::fit`] succeeds
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    basis: Option<ProjectionBasis>,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            basis: None,
        }
    }

    pub fn basis(&self) -> Option<&ProjectionBasis> {
        self.basis.as_ref()
    }

    fn compute_basis(&self, x: ArrayView2<'_, f32>) -> Result<ProjectionBasis> {
        let (samples, features) = x.dim();
        if samples == 0 || features == 0 {
            return Err(VecscopeError::invalid_input(
                "cannot fit PCA on an empty matrix",
            ));
        }

        let x = x.mapv(f64::from);
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| VecscopeError::invalid_input("cannot fit PCA on an empty matrix"))?;
        let centered = &x - &mean;

        // Unbiased covariance; a single sample has zero covariance either way.
        let denom = samples.saturating_sub(1).max(1) as f64;
        let (values, directions) = if samples < features {
            gram_directions(&centered, denom, self.n_components)
        } else {
            covariance_directions(&centered, denom, self.n_components)
        };

        let mut components = Array2::<f64>::zeros((self.n_components, features));
        let mut explained_variance = vec![0.0; self.n_components];
        for (row, (value, mut direction)) in values.into_iter().zip(directions).enumerate() {
            orient(&mut direction);
            components.row_mut(row).assign(&direction);
            explained_variance[row] = value.max(0.0);
        }
        // Rows without a direction stay zero and always project to 0.

        Ok(ProjectionBasis {
            mean,
            components,
            explained_variance,
        })
    }
}

impl DimensionalityReducer for Pca {
    fn fit(&mut self, x: ArrayView2<'_, f32>) -> Result<()> {
        let started = std::time::Instant::now();
        let basis = self.compute_basis(x)?;
        log::debug!(
            "PCA fitted {}x{} -> {} components in {:?}",
            x.nrows(),
            x.ncols(),
            self.n_components,
            started.elapsed()
        );
        self.basis = Some(basis);
        Ok(())
    }

    fn transform(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let basis = self.basis.as_ref().ok_or_else(|| {
            VecscopeError::state("Reducer has not been initialized. Call 'reduceCorpus' first.")
        })?;
        basis.project(x)
    }

    fn n_components(&self) -> usize {
        self.n_components
    }

    fn is_fitted(&self) -> bool {
        self.basis.is_some()
    }
}

type Directions = (Vec<f64>, Vec<Array1<f64>>);

/// Top-k eigenpairs of the `D x D` covariance.
fn covariance_directions(centered: &Array2<f64>, denom: f64, k: usize) -> Directions {
    let covariance = centered.t().dot(centered) / denom;
    let eigen = SymmetricEigen::decompose(&covariance);
    eigen
        .top_indices(k, TIE_TOLERANCE)
        .into_iter()
        .map(|idx| (eigen.values[idx], eigen.vectors.column(idx).to_owned()))
        .unzip()
}

/// Top-k eigenpairs via the `N x N` Gram matrix, for `N < D`.
///
/// Gram and covariance share their non-zero eigenvalues; an eigenvector `u`
/// of the Gram matrix maps to the covariance eigenvector `centeredᵀ u`.
/// Directions with no variance are left out, so they project to 0.
fn gram_directions(centered: &Array2<f64>, denom: f64, k: usize) -> Directions {
    let gram = centered.dot(&centered.t()) / denom;
    let eigen = SymmetricEigen::decompose(&gram);
    let largest = eigen.values.iter().copied().fold(0.0_f64, f64::max);

    let mut values = Vec::with_capacity(k);
    let mut directions = Vec::with_capacity(k);
    for idx in eigen.top_indices(k, TIE_TOLERANCE) {
        let value = eigen.values[idx];
        if value <= largest * TIE_TOLERANCE {
            break;
        }
        let mut direction = centered.t().dot(&eigen.vectors.column(idx));
        let norm = direction.dot(&direction).sqrt();
        if norm == 0.0 {
            break;
        }
        direction /= norm;
        values.push(value);
        directions.push(direction);
    }
    (values, directions)
}

/// Fix the sign of an eigenvector: its largest-magnitude component
/// (first one on ties) is made positive.
fn orient(direction: &mut Array1<f64>) {
    let mut pivot = 0.0_f64;
    for &value in direction.iter() {
        if value.abs() > pivot.abs() {
            pivot = value;
        }
    }
    if pivot < 0.0 {
        direction.mapv_inplace(|v| -v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Array2<f32> {
        // Variance is largest along feature 2, then feature 0.
        array![
            [1.0, 0.5, 10.0, 0.0],
            [2.0, 0.5, -10.0, 0.1],
            [-1.0, 0.5, 4.0, 0.0],
            [-2.0, 0.5, -4.0, -0.1],
            [0.5, 0.5, 0.0, 0.0]
        ]
    }

    #[test]
    fn test_transform_before_fit_is_state_error() {
        let pca = Pca::new(3);
        let err = pca.transform(sample().view()).unwrap_err();
        assert!(matches!(err, VecscopeError::State(_)));
        assert!(err.to_string().contains("not been initialized"));
    }

    #[test]
    fn test_first_direction_follows_largest_variance() {
        let mut pca = Pca::new(3);
        pca.fit(sample().view()).unwrap();
        let basis = pca.basis().unwrap();

        let first = basis.components().row(0);
        assert!(first[2].abs() > 0.99);
        assert!(first[2] > 0.0);
        let ev = basis.explained_variance();
        assert!(ev[0] >= ev[1] && ev[1] >= ev[2]);
    }

    #[test]
    fn test_directions_are_orthonormal() {
        let mut pca = Pca::new(3);
        pca.fit(sample().view()).unwrap();
        let c = pca.basis().unwrap().components();
        let gram = c.dot(&c.t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_fit_is_deterministic_across_instances() {
        let mut a = Pca::new(3);
        let mut b = Pca::new(3);
        a.fit(sample().view()).unwrap();
        b.fit(sample().view()).unwrap();
        assert_eq!(a.basis(), b.basis());
    }

    #[test]
    fn test_transform_reproduces_fit_transform() {
        let mut pca = Pca::new(3);
        let fitted = pca.fit_transform(sample().view()).unwrap();
        let again = pca.transform(sample().view()).unwrap();
        assert_eq!(fitted, again);
        assert_eq!(fitted.dim(), (5, 3));
    }

    #[test]
    fn test_projected_corpus_is_centered() {
        let mut pca = Pca::new(2);
        let points = pca.fit_transform(sample().view()).unwrap();
        for col in points.columns() {
            assert!(col.sum().abs() < 1e-4);
        }
    }

    #[test]
    fn test_more_components_than_features_pads_with_zeros() {
        let x = array![[1.0_f32, 2.0], [3.0, 1.0], [0.0, 0.0]];
        let mut pca = Pca::new(3);
        let points = pca.fit_transform(x.view()).unwrap();
        assert_eq!(points.ncols(), 3);
        assert!(points.column(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut pca = Pca::new(2);
        pca.fit(sample().view()).unwrap();
        let wrong = array![[1.0_f32, 2.0]];
        assert!(matches!(
            pca.transform(wrong.view()),
            Err(VecscopeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let empty = Array2::<f32>::zeros((0, 4));
        assert!(Pca::new(3).fit(empty.view()).is_err());
    }

    #[test]
    fn test_few_samples_match_full_covariance() {
        // 3 samples in 6 dimensions takes the Gram path
        let x = array![
            [1.0_f32, 0.0, 2.0, 0.5, 0.0, -1.0],
            [0.0, 1.0, -1.0, 0.0, 0.5, 0.0],
            [-1.0, 0.5, 0.0, 1.0, 0.0, 1.0]
        ];
        let centered = {
            let x = x.mapv(f64::from);
            let mean = x.mean_axis(Axis(0)).unwrap();
            &x - &mean
        };

        let (gram_values, gram_dirs) = gram_directions(&centered, 2.0, 3);
        let (cov_values, cov_dirs) = covariance_directions(&centered, 2.0, 3);

        // Rank is 2 after centering; the third direction has no variance.
        assert_eq!(gram_values.len(), 2);
        for i in 0..2 {
            assert!((gram_values[i] - cov_values[i]).abs() < 1e-9);
            let alignment = gram_dirs[i].dot(&cov_dirs[i]).abs();
            assert!((alignment - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_gram_path_projects_and_pads() {
        let x = array![[1.0_f32, 2.0, 0.0, 4.0], [3.0, 1.0, 1.0, 0.0]];
        let mut pca = Pca::new(3);
        let points = pca.fit_transform(x.view()).unwrap();
        assert_eq!(points.dim(), (2, 3));
        assert!((points[[0, 0]] + points[[1, 0]]).abs() < 1e-5);
        assert!(points[[0, 0]].abs() > 0.1);
        assert!(points.column(1).iter().all(|v| *v == 0.0));
        assert!(points.column(2).iter().all(|v| *v == 0.0));
        assert_eq!(pca.basis().unwrap().explained_variance()[1], 0.0);
    }
}
