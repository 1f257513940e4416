//! Metrics for evaluating neural network performance.
use crate::error::{NnError, Result};
use crate::tensor::{argmax_rows, ensure_shape, Matrix};

/// A report-only evaluation of predictions against targets. No gradient.
pub trait Metric {
    fn name(&self) -> &'static str;

    /// `y` holds the targets, `y_hat` the predictions; both batch × classes.
    fn compute(&self, y: &Matrix, y_hat: &Matrix) -> Result<f64>;
}

/// Fraction of rows whose predicted arg-max matches the target arg-max.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn name(&self) -> &'static str {
        "accuracy"
    }

    fn compute(&self, y: &Matrix, y_hat: &Matrix) -> Result<f64> {
        ensure_shape("Accuracy::compute", y.shape(), y_hat.shape())?;
        if y.is_empty() {
            return Err(NnError::EmptyTensor { op: "Accuracy::compute" });
        }
        let correct = argmax_rows(y)
            .into_iter()
            .zip(argmax_rows(y_hat))
            .filter(|(t, p)| t == p)
            .count();
        Ok(correct as f64 / y.nrows() as f64)
    }
}

/// Confusion matrix indexed `[true class][predicted class]`; the number of
/// classes is the column count of `y`.
pub fn confusion_matrix(y: &Matrix, y_hat: &Matrix) -> Result<Vec<Vec<usize>>> {
    ensure_shape("confusion_matrix", y.shape(), y_hat.shape())?;
    if y.ncols() == 0 {
        return Err(NnError::EmptyTensor { op: "confusion_matrix" });
    }
    let classes = y.ncols();
    let mut cm = vec![vec![0; classes]; classes];
    for (t, p) in argmax_rows(y).into_iter().zip(argmax_rows(y_hat)) {
        cm[t][p] += 1;
    }
    Ok(cm)
}
