//! Loss functions. A loss reduces targets `Y` and predictions `Y_hat` to one
//! scalar per sample and seeds backpropagation with `dY_hat`.
use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::tensor::{ensure_shape, Matrix, Vector};

/// A loss is always the root of gradient flow: `backward` takes no upstream gradient.
pub trait Loss {
    fn name(&self) -> &'static str;

    /// Caches `Y`, `Y_hat` and the per-sample loss `L` (one entry per row).
    fn forward(&mut self, y: &Matrix, y_hat: &Matrix) -> Result<&Vector>;

    /// Caches and returns `dY_hat`, computed from the latest forward pass.
    fn backward(&mut self) -> Result<&Matrix>;

    /// Per-sample loss `L` from the latest forward pass.
    fn loss(&self) -> Option<&Vector>;

    /// `dY_hat` from the latest backward pass.
    fn prediction_gradient(&self) -> Option<&Matrix>;
}

#[derive(Debug, Clone, Default)]
struct LossCache {
    y: Option<Matrix>,
    y_hat: Option<Matrix>,
    l: Option<Vector>,
    d_y_hat: Option<Matrix>,
}

impl LossCache {
    fn store(&mut self, y: Matrix, y_hat: Matrix, l: Vector) -> &Vector {
        self.y = Some(y);
        self.y_hat = Some(y_hat);
        self.d_y_hat = None;
        self.l.insert(l)
    }

    fn targets_and_predictions(&self, module: &'static str) -> Result<(&Matrix, &Matrix)> {
        match (self.y.as_ref(), self.y_hat.as_ref()) {
            (Some(y), Some(y_hat)) => Ok((y, y_hat)),
            _ => Err(NnError::ForwardNotRun { module }),
        }
    }
}

fn check_pair(op: &'static str, y: &Matrix, y_hat: &Matrix) -> Result<()> {
    ensure_shape(op, y.shape(), y_hat.shape())?;
    if y.is_empty() {
        return Err(NnError::EmptyTensor { op });
    }
    Ok(())
}

/// Mean squared error: `L = mean((Y - Y_hat)^2)` over the feature axis.
#[derive(Debug, Clone, Default)]
pub struct MeanSquaredError {
    cache: LossCache,
}

impl MeanSquaredError {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Loss for MeanSquaredError {
    fn name(&self) -> &'static str {
        "MeanSquaredError"
    }

    fn forward(&mut self, y: &Matrix, y_hat: &Matrix) -> Result<&Vector> {
        check_pair("MeanSquaredError::forward", y, y_hat)?;
        let l = (y - y_hat)
            .mapv(|d| d * d)
            .mean_axis(Axis(1))
            .ok_or(NnError::EmptyTensor {
                op: "MeanSquaredError::forward",
            })?;
        Ok(self.cache.store(y.clone(), y_hat.clone(), l))
    }

    /// `dY_hat = 2 (Y_hat - Y) / batch_size`
    fn backward(&mut self) -> Result<&Matrix> {
        let (y, y_hat) = self.cache.targets_and_predictions("MeanSquaredError")?;
        let batch = y.nrows() as f64;
        let grad = (y_hat - y) * (2.0 / batch);
        Ok(self.cache.d_y_hat.insert(grad))
    }

    fn loss(&self) -> Option<&Vector> {
        self.cache.l.as_ref()
    }

    fn prediction_gradient(&self) -> Option<&Matrix> {
        self.cache.d_y_hat.as_ref()
    }
}

/// Categorical cross-entropy over one-hot (or row-stochastic) targets.
///
/// Predictions are clipped into `[EPSILON, 1 - EPSILON]` before the logarithm;
/// the cached `Y_hat` is the clipped tensor.
#[derive(Debug, Clone, Default)]
pub struct CategoricalCrossEntropy {
    cache: LossCache,
}

impl CategoricalCrossEntropy {
    pub const EPSILON: f64 = 1e-7;

    pub fn new() -> Self {
        Self::default()
    }
}

impl Loss for CategoricalCrossEntropy {
    fn name(&self) -> &'static str {
        "CategoricalCrossEntropy"
    }

    fn forward(&mut self, y: &Matrix, y_hat: &Matrix) -> Result<&Vector> {
        check_pair("CategoricalCrossEntropy::forward", y, y_hat)?;
        let clipped = y_hat.mapv(|p| p.clamp(Self::EPSILON, 1.0 - Self::EPSILON));
        let l = -(y * &clipped.mapv(f64::ln)).sum_axis(Axis(1));
        Ok(self.cache.store(y.clone(), clipped, l))
    }

    /// `dY_hat = -Y / Y_hat` on the clipped predictions.
    fn backward(&mut self) -> Result<&Matrix> {
        let (y, y_hat) = self.cache.targets_and_predictions("CategoricalCrossEntropy")?;
        let grad = -(y / y_hat);
        Ok(self.cache.d_y_hat.insert(grad))
    }

    fn loss(&self) -> Option<&Vector> {
        self.cache.l.as_ref()
    }

    fn prediction_gradient(&self) -> Option<&Matrix> {
        self.cache.d_y_hat.as_ref()
    }
}

/// Serializable loss selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LossKind {
    MeanSquaredError,
    CategoricalCrossEntropy,
}

/// The closed set of losses, dispatched by matching.
#[derive(Debug, Clone)]
pub enum LossFunction {
    MeanSquaredError(MeanSquaredError),
    CategoricalCrossEntropy(CategoricalCrossEntropy),
}

impl LossFunction {
    pub fn kind(&self) -> LossKind {
        match self {
            LossFunction::MeanSquaredError(_) => LossKind::MeanSquaredError,
            LossFunction::CategoricalCrossEntropy(_) => LossKind::CategoricalCrossEntropy,
        }
    }
}

impl From<LossKind> for LossFunction {
    fn from(kind: LossKind) -> Self {
        match kind {
            LossKind::MeanSquaredError => LossFunction::MeanSquaredError(MeanSquaredError::new()),
            LossKind::CategoricalCrossEntropy => {
                LossFunction::CategoricalCrossEntropy(CategoricalCrossEntropy::new())
            }
        }
    }
}

impl Loss for LossFunction {
    fn name(&self) -> &'static str {
        match self {
            LossFunction::MeanSquaredError(l) => l.name(),
            LossFunction::CategoricalCrossEntropy(l) => l.name(),
        }
    }

    fn forward(&mut self, y: &Matrix, y_hat: &Matrix) -> Result<&Vector> {
        match self {
            LossFunction::MeanSquaredError(l) => l.forward(y, y_hat),
            LossFunction::CategoricalCrossEntropy(l) => l.forward(y, y_hat),
        }
    }

    fn backward(&mut self) -> Result<&Matrix> {
        match self {
            LossFunction::MeanSquaredError(l) => l.backward(),
            LossFunction::CategoricalCrossEntropy(l) => l.backward(),
        }
    }

    fn loss(&self) -> Option<&Vector> {
        match self {
            LossFunction::MeanSquaredError(l) => l.loss(),
            LossFunction::CategoricalCrossEntropy(l) => l.loss(),
        }
    }

    fn prediction_gradient(&self) -> Option<&Matrix> {
        match self {
            LossFunction::MeanSquaredError(l) => l.prediction_gradient(),
            LossFunction::CategoricalCrossEntropy(l) => l.prediction_gradient(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_mse_loss() {
        let mut mse = MeanSquaredError::new();
        let y = array![[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]];
        let y_hat = array![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]];
        let l = mse.forward(&y, &y_hat).unwrap();
        assert_abs_diff_eq!(l[0], 0.0, epsilon = 1e-12);
        // (1 + 4 + 9) / 3
        assert_abs_diff_eq!(l[1], 14.0 / 3.0, epsilon = 1e-12);

        let grad = mse.backward().unwrap();
        // 2 (y_hat - y) / batch, batch = 2
        assert_eq!(grad, &array![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_cross_entropy_loss() {
        let mut cce = CategoricalCrossEntropy::new();
        let y = array![[0.0, 1.0], [1.0, 0.0]];
        let y_hat = array![[0.2, 0.8], [0.5, 0.5]];
        let l = cce.forward(&y, &y_hat).unwrap();
        assert_abs_diff_eq!(l[0], -(0.8f64.ln()), epsilon = 1e-12);
        assert_abs_diff_eq!(l[1], -(0.5f64.ln()), epsilon = 1e-12);

        let grad = cce.backward().unwrap();
        assert_abs_diff_eq!(grad[[0, 1]], -1.0 / 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[[1, 0]], -2.0, epsilon = 1e-12);
        assert_eq!(grad[[0, 0]], 0.0);
    }

    #[test]
    fn cross_entropy_clips_exact_zero_and_one() {
        let mut cce = CategoricalCrossEntropy::new();
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let y_hat = array![[0.0, 1.0], [1.0, 0.0]];
        let l = cce.forward(&y, &y_hat).unwrap().clone();
        assert!(l.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(l[0], -(CategoricalCrossEntropy::EPSILON.ln()), epsilon = 1e-9);

        let grad = cce.backward().unwrap();
        assert!(grad.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn losses_reject_mismatched_batches() {
        let mut mse = MeanSquaredError::new();
        let err = mse.forward(&Matrix::zeros((3, 2)), &Matrix::zeros((2, 2))).unwrap_err();
        assert_eq!(
            err,
            NnError::ShapeMismatch {
                op: "MeanSquaredError::forward",
                expected: vec![3, 2],
                actual: vec![2, 2],
            }
        );
    }

    #[test]
    fn backward_before_forward_fails() {
        let mut loss = LossFunction::from(LossKind::CategoricalCrossEntropy);
        assert_eq!(
            loss.backward().unwrap_err(),
            NnError::ForwardNotRun {
                module: "CategoricalCrossEntropy"
            }
        );
        assert_eq!(loss.kind(), LossKind::CategoricalCrossEntropy);
    }
}
