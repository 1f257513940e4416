//! The module contract shared by every node of a model tree.
//!
//! A module caches the tensors of its latest forward pass (`X`, `Y`) and the
//! gradient of its latest backward pass (`dX`). Modules with learnable state
//! additionally expose their parameters to optimizers as [`ParameterSlot`]s;
//! containers expose their children through [`Module::submodules`].
use ndarray::{ArrayViewD, ArrayViewMutD};

use crate::activations::{ReLU, Sigmoid, Softmax, Tanh};
use crate::error::{NnError, Result};
use crate::layers::Dense;
use crate::sequential::Sequential;
use crate::tensor::{ensure_shape, Matrix};

/// Cached tensors of one forward/backward cycle.
#[derive(Debug, Clone, Default)]
pub struct TensorCache {
    pub(crate) x: Option<Matrix>,
    pub(crate) y: Option<Matrix>,
    pub(crate) dx: Option<Matrix>,
}

impl TensorCache {
    /// Input of the latest forward pass (`X`).
    pub fn input(&self) -> Option<&Matrix> {
        self.x.as_ref()
    }

    /// Output of the latest forward pass (`Y`).
    pub fn output(&self) -> Option<&Matrix> {
        self.y.as_ref()
    }

    /// Gradient w.r.t. the input from the latest backward pass (`dX`).
    pub fn input_gradient(&self) -> Option<&Matrix> {
        self.dx.as_ref()
    }

    /// Records a forward pass. The previous cycle's `dX` is dropped.
    pub(crate) fn store(&mut self, x: Matrix, y: Matrix) -> &Matrix {
        self.x = Some(x);
        self.dx = None;
        self.y.insert(y)
    }

    /// Cached `(X, Y)` for a backward pass receiving `dy`.
    pub(crate) fn for_backward(&self, module: &'static str, dy: &Matrix) -> Result<(&Matrix, &Matrix)> {
        match (self.x.as_ref(), self.y.as_ref()) {
            (Some(x), Some(y)) => {
                ensure_shape(module, y.shape(), dy.shape())?;
                Ok((x, y))
            }
            _ => Err(NnError::ForwardNotRun { module }),
        }
    }

    pub(crate) fn store_gradient(&mut self, dx: Matrix) -> &Matrix {
        self.dx.insert(dx)
    }
}

/// A named learnable tensor together with its latest gradient.
///
/// `gradient` is `None` when no backward has run since the last forward or
/// since the last optimizer step consumed it.
#[derive(Debug)]
pub struct ParameterSlot<'a> {
    pub name: &'static str,
    pub value: ArrayViewMutD<'a, f64>,
    pub gradient: Option<ArrayViewD<'a, f64>>,
}

/// Forward/backward protocol implemented by every node of a model.
pub trait Module {
    /// Short type name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Evaluates the module on `x` (batch × features), caches `X` and `Y`,
    /// and returns the cached `Y`.
    fn forward(&mut self, x: &Matrix) -> Result<&Matrix>;

    /// Consumes the gradient of the module's output, caches `dX` (and any
    /// parameter gradients) and returns the cached `dX`.
    ///
    /// Reads only what the preceding `forward` on this instance cached.
    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix>;

    fn cache(&self) -> &TensorCache;

    fn input(&self) -> Option<&Matrix> {
        self.cache().input()
    }

    fn output(&self) -> Option<&Matrix> {
        self.cache().output()
    }

    fn input_gradient(&self) -> Option<&Matrix> {
        self.cache().input_gradient()
    }

    /// Children of a container. `None` means the module is a leaf.
    fn submodules(&self) -> Option<&[Layer]> {
        None
    }

    fn submodules_mut(&mut self) -> Option<&mut [Layer]> {
        None
    }

    /// Whether the module owns learnable parameters.
    fn has_parameters(&self) -> bool {
        false
    }

    /// Parameters paired with their latest gradients. `None` means the module
    /// has no learnable state.
    fn parameters_mut(&mut self) -> Option<Vec<ParameterSlot<'_>>> {
        None
    }

    /// Name of the first parameter without a fresh gradient, if any.
    fn missing_gradient(&self) -> Option<&'static str> {
        None
    }

    /// Marks the parameter gradients as used so they cannot be applied twice.
    fn consume_gradients(&mut self) {}

    /// Number of scalar parameters owned by this module and its descendants.
    fn num_parameters(&self) -> usize {
        0
    }
}

/// The closed set of modules a model can be assembled from.
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Sigmoid(Sigmoid),
    ReLU(ReLU),
    Tanh(Tanh),
    Softmax(Softmax),
    Sequential(Sequential),
}

macro_rules! dispatch {
    ($layer:expr, $m:ident => $body:expr) => {
        match $layer {
            Layer::Dense($m) => $body,
            Layer::Sigmoid($m) => $body,
            Layer::ReLU($m) => $body,
            Layer::Tanh($m) => $body,
            Layer::Softmax($m) => $body,
            Layer::Sequential($m) => $body,
        }
    };
}

impl Layer {
    pub fn as_dense(&self) -> Option<&Dense> {
        match self {
            Layer::Dense(dense) => Some(dense),
            _ => None,
        }
    }

    pub fn as_sequential(&self) -> Option<&Sequential> {
        match self {
            Layer::Sequential(seq) => Some(seq),
            _ => None,
        }
    }

    /// True for the element-wise and row-wise nonlinearities.
    pub fn is_activation(&self) -> bool {
        matches!(
            self,
            Layer::Sigmoid(_) | Layer::ReLU(_) | Layer::Tanh(_) | Layer::Softmax(_)
        )
    }
}

impl Module for Layer {
    fn name(&self) -> &'static str {
        dispatch!(self, m => m.name())
    }

    fn forward(&mut self, x: &Matrix) -> Result<&Matrix> {
        dispatch!(self, m => m.forward(x))
    }

    fn backward(&mut self, dy: &Matrix) -> Result<&Matrix> {
        dispatch!(self, m => m.backward(dy))
    }

    fn cache(&self) -> &TensorCache {
        dispatch!(self, m => m.cache())
    }

    fn submodules(&self) -> Option<&[Layer]> {
        dispatch!(self, m => m.submodules())
    }

    fn submodules_mut(&mut self) -> Option<&mut [Layer]> {
        dispatch!(self, m => m.submodules_mut())
    }

    fn has_parameters(&self) -> bool {
        dispatch!(self, m => m.has_parameters())
    }

    fn parameters_mut(&mut self) -> Option<Vec<ParameterSlot<'_>>> {
        dispatch!(self, m => m.parameters_mut())
    }

    fn missing_gradient(&self) -> Option<&'static str> {
        dispatch!(self, m => m.missing_gradient())
    }

    fn consume_gradients(&mut self) {
        dispatch!(self, m => m.consume_gradients())
    }

    fn num_parameters(&self) -> usize {
        dispatch!(self, m => m.num_parameters())
    }
}

impl From<Dense> for Layer {
    fn from(dense: Dense) -> Self {
        Layer::Dense(dense)
    }
}

impl From<Sigmoid> for Layer {
    fn from(act: Sigmoid) -> Self {
        Layer::Sigmoid(act)
    }
}

impl From<ReLU> for Layer {
    fn from(act: ReLU) -> Self {
        Layer::ReLU(act)
    }
}

impl From<Tanh> for Layer {
    fn from(act: Tanh) -> Self {
        Layer::Tanh(act)
    }
}

impl From<Softmax> for Layer {
    fn from(act: Softmax) -> Self {
        Layer::Softmax(act)
    }
}

impl From<Sequential> for Layer {
    fn from(seq: Sequential) -> Self {
        Layer::Sequential(seq)
    }
}
