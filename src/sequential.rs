//! Sequential container: chains its children forward left-to-right and
//! backward right-to-left.
use std::fmt;

use crate::error::{NnError, Result};
use crate::module::{Layer, Module, TensorCache};
use crate::tensor::{argmax_rows, ensure_shape, Matrix};

/// An ordered stack of modules composed into a single module.
///
/// The container owns its children; parameters stay owned by the `Dense`
/// children. An empty stack is the identity map.
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    layers: Vec<Layer>,
    cache: TensorCache,
}

impl Sequential {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            layers,
            cache: TensorCache::default(),
        }
    }

    /// Builder-style append.
    pub fn with(mut self, layer: impl Into<Layer>) -> Self {
        self.layers.push(layer.into());
        self
    }

    pub fn push(&mut self, layer: impl Into<Layer>) {
        self.layers.push(layer.into());
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Runs a forward pass and returns the arg-max class of each row.
    pub fn predict(&mut self, x: &Matrix) -> Result<Vec<usize>> {
        let y = self.forward(x)?;
        Ok(argmax_rows(y))
    }

    /// Every module below this one, depth-first in declaration order.
    pub fn descendants(&self) -> Vec<&Layer> {
        let mut out = Vec::new();
        let mut stack: Vec<&Layer> = self.layers.iter().rev().collect();
        while let Some(layer) = stack.pop() {
            out.push(layer);
            if let Some(children) = layer.submodules() {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// Widths of the network: the first dense layer's input size followed by
    /// every dense layer's output size.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::new();
        for dense in self.descendants().into_iter().filter_map(Layer::as_dense) {
            if sizes.is_empty() {
                sizes.push(dense.input_size());
            }
            sizes.push(dense.output_size());
        }
        sizes
    }

    /// Cached tensors for display: the first dense layer's `X`, then the `Y`
    /// of every activation, in network order. Modules that have not run a
    /// forward pass are skipped.
    pub fn activation_trace(&self) -> Vec<&Matrix> {
        let mut trace = Vec::new();
        let mut seen_dense = false;
        for layer in self.descendants() {
            if let Layer::Dense(dense) = layer {
                if !seen_dense {
                    seen_dense = true;
                    trace.extend(dense.input());
                }
            } else if layer.is_activation() {
                trace.extend(layer.output());
            }
        }
        trace
    }
}

impl Module for Sequential {
    fn name(&self) -> &'static str {
        "Sequential"
    }

    fn forward(&mut self, x: &Matrix) -> Result<&Matrix> {
        let mut current = x.clone();
        for layer in self.layers.iter_mut() {
            current = layer.forward(&current)?.clone();
        }
        Ok(self.cache.store(x.clone(), current))
    }

    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix> {
        let y = self.cache.output().ok_or(NnError::ForwardNotRun { module: "Sequential" })?;
        ensure_shape("Sequential::backward", y.shape(), dy.shape())?;

        let mut grad = dy.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad)?.clone();
        }
        Ok(self.cache.store_gradient(grad))
    }

    fn cache(&self) -> &TensorCache {
        &self.cache
    }

    fn submodules(&self) -> Option<&[Layer]> {
        Some(self.layers.as_slice())
    }

    fn submodules_mut(&mut self) -> Option<&mut [Layer]> {
        Some(self.layers.as_mut_slice())
    }

    fn num_parameters(&self) -> usize {
        self.layers.iter().map(Module::num_parameters).sum()
    }
}

impl FromIterator<Layer> for Sequential {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        Sequential::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Sequential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequential: {:?}", self.layer_sizes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::{ReLU, Sigmoid, Softmax};
    use crate::layers::Dense;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mlp(rng: &mut StdRng) -> Sequential {
        Sequential::default()
            .with(Dense::new(4, 3, rng))
            .with(ReLU::new())
            .with(Dense::new(3, 2, rng))
            .with(Softmax::new())
    }

    #[test]
    fn forward_and_backward_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = mlp(&mut rng);
        let x = Matrix::ones((5, 4));
        let y = model.forward(&x).unwrap();
        assert_eq!(y.dim(), (5, 2));

        let dx = model.backward(&Matrix::ones((5, 2))).unwrap();
        assert_eq!(dx.dim(), (5, 4));
        assert_eq!(model.input(), Some(&x));
    }

    #[test]
    fn backward_before_forward_fails() {
        let mut model = mlp(&mut StdRng::seed_from_u64(3));
        assert_eq!(
            model.backward(&Matrix::ones((1, 2))).unwrap_err(),
            NnError::ForwardNotRun { module: "Sequential" }
        );
    }

    #[test]
    fn empty_sequential_is_identity() {
        let mut model = Sequential::default();
        let x = array![[1.0, -2.0]];
        assert_eq!(model.forward(&x).unwrap(), &x);
        assert_eq!(model.backward(&x).unwrap(), &x);
    }

    #[test]
    fn layer_sizes_and_display_follow_nesting_order() {
        let mut rng = StdRng::seed_from_u64(5);
        let inner = Sequential::default()
            .with(Dense::new(8, 6, &mut rng))
            .with(Sigmoid::new());
        let model = Sequential::default()
            .with(inner)
            .with(Dense::new(6, 3, &mut rng));
        assert_eq!(model.layer_sizes(), vec![8, 6, 3]);
        assert_eq!(model.to_string(), "Sequential: [8, 6, 3]");
        assert_eq!(model.descendants().len(), 4);
        assert_eq!(model.num_parameters(), 8 * 6 + 6 + 6 * 3 + 3);
    }

    #[test]
    fn activation_trace_reads_input_then_activations() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut model = mlp(&mut rng);
        assert!(model.activation_trace().is_empty());

        let x = Matrix::from_elem((1, 4), 0.5);
        let y = model.forward(&x).unwrap().clone();
        let trace = model.activation_trace();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0], &x);
        assert_eq!(trace[1].dim(), (1, 3));
        assert_eq!(trace[2], &y);
    }

    #[test]
    fn predict_returns_argmax_per_row() {
        let layer = Dense::from_parameters(array![[1.0, 0.0], [0.0, 1.0]], array![0.0, 0.0]).unwrap();
        let mut model = Sequential::default().with(layer).with(Softmax::new());
        let classes = model.predict(&array![[3.0, 1.0], [0.0, 2.0]]).unwrap();
        assert_eq!(classes, vec![0, 1]);
    }
}
