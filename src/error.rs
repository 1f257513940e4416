//! Error types for forward, backward, and update operations.
use thiserror::Error;

/// Errors raised by the core training engine.
///
/// Every variant is a caller-side programming or configuration error; none is
/// retried internally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NnError {
    /// An operand's shape does not match what the operation requires.
    #[error("shape mismatch in {op}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// `backward` was called on a module with no cached forward pass.
    #[error("{module}: backward called before forward")]
    ForwardNotRun { module: &'static str },

    /// An optimizer asked for a gradient that the latest backward did not produce.
    #[error("{module}: gradient d{parameter} is missing or already consumed; run backward before updating")]
    StaleGradient {
        module: &'static str,
        parameter: &'static str,
    },

    /// A reduction was asked to run over zero elements.
    #[error("{op}: empty tensor")]
    EmptyTensor { op: &'static str },

    /// Invalid hyper-parameters or training configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_names_both_shapes() {
        let err = NnError::ShapeMismatch {
            op: "Dense::forward",
            expected: vec![4, 3],
            actual: vec![4, 2],
        };
        let msg = err.to_string();
        assert!(msg.contains("Dense::forward"));
        assert!(msg.contains("[4, 3]"));
        assert!(msg.contains("[4, 2]"));
    }

    #[test]
    fn stale_gradient_names_the_gradient_slot() {
        let err = NnError::StaleGradient {
            module: "Dense",
            parameter: "W",
        };
        assert!(err.to_string().contains("dW"));
    }
}
