//! Dense (fully connected) layer: `Y = X·W + B`.
use ndarray::Axis;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::error::Result;
use crate::module::{Module, ParameterSlot, TensorCache};
use crate::tensor::{ensure_columns, ensure_shape, Matrix, Vector};

/// Scale applied to standard-normal draws when initializing parameters.
pub const INIT_SCALE: f64 = 0.01;

/// A fully-connected layer with weights `W` (input × output) and bias `B` (output).
#[derive(Debug, Clone)]
pub struct Dense {
    weights: Matrix,
    bias: Vector,
    cache: TensorCache,
    d_w: Option<Matrix>,
    d_b: Option<Vector>,
}

impl Dense {
    /// Create a new dense layer with `W` and `B` drawn from `0.01 * N(0, 1)`.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let weights = Matrix::random_using((input_size, output_size), StandardNormal, rng) * INIT_SCALE;
        let bias = Vector::random_using(output_size, StandardNormal, rng) * INIT_SCALE;
        Self::with_parameters(weights, bias)
    }

    /// Rebuild a layer from stored parameters. `bias` must have one entry per
    /// column of `weights`.
    pub fn from_parameters(weights: Matrix, bias: Vector) -> Result<Self> {
        ensure_shape("Dense::from_parameters", &[weights.ncols()], bias.shape())?;
        Ok(Self::with_parameters(weights, bias))
    }

    fn with_parameters(weights: Matrix, bias: Vector) -> Self {
        Self {
            weights,
            bias,
            cache: TensorCache::default(),
            d_w: None,
            d_b: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn bias(&self) -> &Vector {
        &self.bias
    }

    /// `dW` from the latest backward pass, if not yet consumed by an optimizer.
    pub fn weight_gradient(&self) -> Option<&Matrix> {
        self.d_w.as_ref()
    }

    /// `dB` from the latest backward pass, if not yet consumed by an optimizer.
    pub fn bias_gradient(&self) -> Option<&Vector> {
        self.d_b.as_ref()
    }
}

impl Module for Dense {
    fn name(&self) -> &'static str {
        "Dense"
    }

    fn forward(&mut self, x: &Matrix) -> Result<&Matrix> {
        ensure_columns("Dense::forward", x, self.input_size())?;
        let y = x.dot(&self.weights) + &self.bias;
        self.d_w = None;
        self.d_b = None;
        Ok(self.cache.store(x.clone(), y))
    }

    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix> {
        let (x, _) = self.cache.for_backward("Dense::backward", dy)?;
        let d_w = x.t().dot(dy);
        let d_b = dy.sum_axis(Axis(0));
        let dx = dy.dot(&self.weights.t());
        self.d_w = Some(d_w);
        self.d_b = Some(d_b);
        Ok(self.cache.store_gradient(dx))
    }

    fn cache(&self) -> &TensorCache {
        &self.cache
    }

    fn has_parameters(&self) -> bool {
        true
    }

    fn parameters_mut(&mut self) -> Option<Vec<ParameterSlot<'_>>> {
        Some(vec![
            ParameterSlot {
                name: "W",
                value: self.weights.view_mut().into_dyn(),
                gradient: self.d_w.as_ref().map(|g| g.view().into_dyn()),
            },
            ParameterSlot {
                name: "B",
                value: self.bias.view_mut().into_dyn(),
                gradient: self.d_b.as_ref().map(|g| g.view().into_dyn()),
            },
        ])
    }

    fn missing_gradient(&self) -> Option<&'static str> {
        if self.d_w.is_none() {
            Some("W")
        } else if self.d_b.is_none() {
            Some("B")
        } else {
            None
        }
    }

    fn consume_gradients(&mut self) {
        self.d_w = None;
        self.d_b = None;
    }

    fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}
