//! Symmetric eigen-decomposition (cyclic Jacobi)

use ndarray::Array2;

/// Sweeps before giving up on full convergence
const MAX_SWEEPS: usize = 64;

/// Off-diagonal mass, relative to the total, at which a sweep stops
const CONVERGENCE: f64 = 1e-24;

/// Eigenvalues and eigenvectors of a real symmetric matrix
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues in the matrix's diagonal order (unsorted)
    pub values: Vec<f64>,
    /// Column `i` is the unit eigenvector for `values[i]`
    pub vectors: Array2<f64>,
}

impl SymmetricEigen {
    /// Decompose `matrix`, which must be square and symmetric.
    ///
    /// Fully deterministic: the rotation order depends only on the input.
    pub fn decompose(matrix: &Array2<f64>) -> Self {
        let n = matrix.nrows();
        let mut a = matrix.clone();
        let mut v = Array2::<f64>::eye(n);

        let total: f64 = a.iter().map(|x| x * x).sum();
        let mut converged = n < 2;

        for sweep in 0..MAX_SWEEPS {
            if converged {
                break;
            }
            let off = off_diagonal_mass(&a);
            if off <= CONVERGENCE * total.max(f64::MIN_POSITIVE) {
                log::debug!("Jacobi converged after {} sweeps", sweep);
                converged = true;
                break;
            }

            for p in 0..n - 1 {
                for q in p + 1..n {
                    let apq = a[[p, q]];
                    if apq == 0.0 {
                        continue;
                    }
                    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                    let c = 1.0 / (t * t + 1.0).sqrt();
                    let s = t * c;

                    for k in 0..n {
                        let akp = a[[k, p]];
                        let akq = a[[k, q]];
                        a[[k, p]] = c * akp - s * akq;
                        a[[k, q]] = s * akp + c * akq;
                    }
                    for k in 0..n {
                        let apk = a[[p, k]];
                        let aqk = a[[q, k]];
                        a[[p, k]] = c * apk - s * aqk;
                        a[[q, k]] = s * apk + c * aqk;
                    }
                    for k in 0..n {
                        let vkp = v[[k, p]];
                        let vkq = v[[k, q]];
                        v[[k, p]] = c * vkp - s * vkq;
                        v[[k, q]] = s * vkp + c * vkq;
                    }
                }
            }
        }

        if !converged && off_diagonal_mass(&a) > CONVERGENCE * total.max(f64::MIN_POSITIVE) {
            log::warn!(
                "Jacobi eigen-decomposition stopped after {} sweeps without full convergence",
                MAX_SWEEPS
            );
        }

        Self {
            values: (0..n).map(|i| a[[i, i]]).collect(),
            vectors: v,
        }
    }

    /// Indices of the `k` largest eigenvalues, largest first.
    ///
    /// Eigenvalues within `tolerance` of each other count as equal and are
    /// ordered by smallest index first.
    pub fn top_indices(&self, k: usize, tolerance: f64) -> Vec<usize> {
        let mut remaining: Vec<usize> = (0..self.values.len()).collect();
        let mut picked = Vec::with_capacity(k.min(remaining.len()));

        while picked.len() < k && !remaining.is_empty() {
            let mut best = 0;
            for (slot, &idx) in remaining.iter().enumerate().skip(1) {
                let current = self.values[remaining[best]];
                if self.values[idx] > current + tolerance * current.abs().max(1.0) {
                    best = slot;
                }
            }
            picked.push(remaining.remove(best));
        }
        picked
    }
}

fn off_diagonal_mass(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for p in 0..n {
        for q in 0..n {
            if p != q {
                sum += a[[p, q]] * a[[p, q]];
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_diagonal_matrix_is_its_own_decomposition() {
        let m = array![[2.0, 0.0], [0.0, 5.0]];
        let eig = SymmetricEigen::decompose(&m);
        assert_eq!(eig.values, vec![2.0, 5.0]);
        assert_eq!(eig.top_indices(1, 1e-9), vec![1]);
    }

    #[test]
    fn test_two_by_two_known_eigenpairs() {
        // Eigenvalues 3 (along [1,1]) and 1 (along [1,-1])
        let m = array![[2.0, 1.0], [1.0, 2.0]];
        let eig = SymmetricEigen::decompose(&m);
        let top = eig.top_indices(2, 1e-9);
        assert!((eig.values[top[0]] - 3.0).abs() < 1e-10);
        assert!((eig.values[top[1]] - 1.0).abs() < 1e-10);

        let v = eig.vectors.column(top[0]);
        assert!((v[0].abs() - v[1].abs()).abs() < 1e-10);
        assert!(v[0] * v[1] > 0.0);
    }

    #[test]
    fn test_reconstruction() {
        let m = array![
            [4.0, 1.0, 0.5, 0.0],
            [1.0, 3.0, 0.2, 0.1],
            [0.5, 0.2, 2.0, 0.3],
            [0.0, 0.1, 0.3, 1.0]
        ];
        let eig = SymmetricEigen::decompose(&m);
        for i in 0..4 {
            let v = eig.vectors.column(i).to_owned();
            let mv = m.dot(&v);
            for k in 0..4 {
                assert!((mv[k] - eig.values[i] * v[k]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_ties_prefer_smaller_index() {
        let m = array![[1.0, 0.0, 0.0], [0.0, 7.0, 0.0], [0.0, 0.0, 7.0]];
        let eig = SymmetricEigen::decompose(&m);
        assert_eq!(eig.top_indices(3, 1e-9), vec![1, 2, 0]);
    }

    #[test]
    fn test_top_indices_caps_at_matrix_size() {
        let m = array![[1.0]];
        let eig = SymmetricEigen::decompose(&m);
        assert_eq!(eig.top_indices(3, 1e-9), vec![0]);
    }
}
