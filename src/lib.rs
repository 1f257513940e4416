//! A minimal feed-forward neural network engine for educational purposes:
//! composable modules with explicit backpropagation, losses, an optimizer
//! that walks the module tree, metrics, and dataset loaders.
//!
//! - Dense layers and Sigmoid/ReLU/Tanh/Softmax activations
//! - `Sequential` containers, nestable to any depth
//! - MSE and categorical cross-entropy losses
//! - Stochastic gradient descent and a mini-batch training loop
//! - Gzipped JSON model snapshots
//! - XOR, Iris (CSV) and MNIST (IDX) loaders

pub mod activations;
pub mod datasets;
pub mod error;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod module;
pub mod optimizer;
pub mod persistence;
pub mod sequential;
pub mod tensor;
pub mod train;
pub mod utils;

pub use activations::{ActivationKind, ReLU, Sigmoid, Softmax, Tanh};
pub use datasets::{load_iris, load_mnist, one_hot, xor, Dataset};
pub use error::{NnError, Result};
pub use layers::Dense;
pub use loss::{CategoricalCrossEntropy, Loss, LossFunction, LossKind, MeanSquaredError};
pub use metrics::{confusion_matrix, Accuracy, Metric};
pub use module::{Layer, Module, ParameterSlot, TensorCache};
pub use optimizer::{Optimizer, StochasticGradientDescent};
pub use persistence::{LayerSnapshot, ModelSnapshot};
pub use sequential::Sequential;
pub use tensor::{argmax_rows, Matrix, Vector};
pub use train::{evaluate, fit, train_step, History, TrainConfig};
pub use utils::{model_summary, print_model_summary, print_summary_table};
