//! Dense `f64` tensors and the shape helpers shared by every module.
use ndarray::{Array1, Array2};

use crate::error::{NnError, Result};

/// Batch-major matrix: one row per sample, one column per feature.
pub type Matrix = Array2<f64>;

/// Vector type (biases, per-sample losses).
pub type Vector = Array1<f64>;

/// Fails with [`NnError::ShapeMismatch`] unless `actual == expected`.
pub(crate) fn ensure_shape(op: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(NnError::ShapeMismatch {
            op,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

/// Fails unless the matrix has `columns` features.
pub(crate) fn ensure_columns(op: &'static str, m: &Matrix, columns: usize) -> Result<()> {
    ensure_shape(op, &[m.nrows(), columns], m.shape())
}

/// Index of the largest entry in each row. Ties resolve to the lowest index.
pub fn argmax_rows(m: &Matrix) -> Vec<usize> {
    m.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |(best, max), (i, &v)| {
                    if v > max {
                        (i, v)
                    } else {
                        (best, max)
                    }
                })
                .0
        })
        .collect()
}
