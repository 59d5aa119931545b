//! Flat row-major storage for a set of embeddings.

use crate::error::{Result, VecscopeError};
use ndarray::ArrayView2;

/// `rows` embeddings of `dim` components each, stored contiguously.
///
/// Row `i` lives at `data[i * dim..(i + 1) * dim]`, in corpus order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    data: Vec<f32>,
    rows: usize,
    dim: usize,
}

impl EmbeddingBatch {
    /// Wrap a flat buffer, checking that it holds exactly `rows * dim` values.
    pub fn new(data: Vec<f32>, rows: usize, dim: usize) -> Result<Self> {
        if rows == 0 || dim == 0 {
            return Err(VecscopeError::invalid_input(format!(
                "embedding batch must be non-empty (got {}x{})",
                rows, dim
            )));
        }
        if data.len() != rows * dim {
            return Err(VecscopeError::invalid_input(format!(
                "embedding data has {} values, expected {}x{}={}",
                data.len(),
                rows,
                dim,
                rows * dim
            )));
        }
        Ok(Self { data, rows, dim })
    }

    /// Build a batch from per-item vectors, which must share one dimension.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        let count = rows.len();
        let mut data = Vec::with_capacity(count * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(VecscopeError::invalid_input(format!(
                    "row {} has dimension {}, expected {}",
                    i,
                    row.len(),
                    dim
                )));
            }
            data.extend(row);
        }
        Self::new(data, count, dim)
    }

    /// Reshape a `{data, dims}` pair: `[D]` is one row, `[N, D]` is N rows.
    pub fn from_shape(data: Vec<f32>, dims: &[usize]) -> Result<Self> {
        match *dims {
            [dim] => Self::new(data, 1, dim),
            [rows, dim] => Self::new(data, rows, dim),
            _ => Err(VecscopeError::invalid_input(format!(
                "unsupported embedding shape {:?}",
                dims
            ))),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embedding of item `index`. Panics if out of range, like slice indexing.
    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    /// Borrow the buffer as an `N x D` matrix.
    pub fn view(&self) -> Result<ArrayView2<'_, f32>> {
        ArrayView2::from_shape((self.rows, self.dim), &self.data)
            .map_err(|e| VecscopeError::invalid_input(format!("bad batch shape: {}", e)))
    }
}
