//! Activation modules. Each caches `X` and `Y` on forward and derives `dX`
//! from the cached tensors and the incoming `dY` on backward.
use std::fmt;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::module::{Layer, Module, TensorCache};
use crate::tensor::Matrix;

/// Sigmoid: `1 / (1 + exp(-x))`
#[derive(Debug, Clone, Default)]
pub struct Sigmoid {
    cache: TensorCache,
}

/// ReLU: `max(0, x)`
#[derive(Debug, Clone, Default)]
pub struct ReLU {
    cache: TensorCache,
}

/// Tanh: `(exp(x) - exp(-x)) / (exp(x) + exp(-x))`
#[derive(Debug, Clone, Default)]
pub struct Tanh {
    cache: TensorCache,
}

/// Row-wise softmax. Each row of the output is a probability distribution.
#[derive(Debug, Clone, Default)]
pub struct Softmax {
    cache: TensorCache,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tanh {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Softmax {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Sigmoid {
    fn name(&self) -> &'static str {
        "Sigmoid"
    }

    fn forward(&mut self, x: &Matrix) -> Result<&Matrix> {
        let y = x.mapv(|v| 1.0 / (1.0 + (-v).exp()));
        Ok(self.cache.store(x.clone(), y))
    }

    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix> {
        let (_, y) = self.cache.for_backward("Sigmoid::backward", dy)?;
        let dx = dy * &y.mapv(|s| s * (1.0 - s));
        Ok(self.cache.store_gradient(dx))
    }

    fn cache(&self) -> &TensorCache {
        &self.cache
    }
}

impl Module for ReLU {
    fn name(&self) -> &'static str {
        "ReLU"
    }

    fn forward(&mut self, x: &Matrix) -> Result<&Matrix> {
        let y = x.mapv(|v| v.max(0.0));
        Ok(self.cache.store(x.clone(), y))
    }

    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix> {
        let (x, _) = self.cache.for_backward("ReLU::backward", dy)?;
        // subgradient 0 at exactly x == 0
        let dx = dy * &x.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        Ok(self.cache.store_gradient(dx))
    }

    fn cache(&self) -> &TensorCache {
        &self.cache
    }
}

impl Module for Tanh {
    fn name(&self) -> &'static str {
        "Tanh"
    }

    fn forward(&mut self, x: &Matrix) -> Result<&Matrix> {
        let y = x.mapv(f64::tanh);
        Ok(self.cache.store(x.clone(), y))
    }

    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix> {
        let (_, y) = self.cache.for_backward("Tanh::backward", dy)?;
        let dx = dy * &y.mapv(|t| 1.0 - t * t);
        Ok(self.cache.store_gradient(dx))
    }

    fn cache(&self) -> &TensorCache {
        &self.cache
    }
}

impl Module for Softmax {
    fn name(&self) -> &'static str {
        "Softmax"
    }

    fn forward(&mut self, x: &Matrix) -> Result<&Matrix> {
        let mut y = x.clone();
        for mut row in y.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row /= sum;
        }
        Ok(self.cache.store(x.clone(), y))
    }

    /// Applies the per-row Jacobian `diag(y) - y·yᵗ` to each row of `dY`.
    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix> {
        let (_, y) = self.cache.for_backward("Softmax::backward", dy)?;
        let mut dx = Matrix::zeros(dy.raw_dim());
        for ((y_row, dy_row), mut dx_row) in y.rows().into_iter().zip(dy.rows()).zip(dx.rows_mut()) {
            let col = y_row.to_owned().insert_axis(Axis(1));
            let jacobian = Array2::from_diag(&y_row) - col.dot(&col.t());
            dx_row.assign(&jacobian.dot(&dy_row));
        }
        Ok(self.cache.store_gradient(dx))
    }

    fn cache(&self) -> &TensorCache {
        &self.cache
    }
}

/// Serializable activation kinds, used by model snapshots and summaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivationKind {
    Sigmoid,
    ReLU,
    Tanh,
    Softmax,
}

impl ActivationKind {
    /// A fresh activation module of this kind, with empty caches.
    pub fn to_layer(self) -> Layer {
        match self {
            ActivationKind::Sigmoid => Sigmoid::new().into(),
            ActivationKind::ReLU => ReLU::new().into(),
            ActivationKind::Tanh => Tanh::new().into(),
            ActivationKind::Softmax => Softmax::new().into(),
        }
    }

    /// The kind of an activation layer, `None` for any other layer.
    pub fn of(layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Sigmoid(_) => Some(ActivationKind::Sigmoid),
            Layer::ReLU(_) => Some(ActivationKind::ReLU),
            Layer::Tanh(_) => Some(ActivationKind::Tanh),
            Layer::Softmax(_) => Some(ActivationKind::Softmax),
            Layer::Dense(_) | Layer::Sequential(_) => None,
        }
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
