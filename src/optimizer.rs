//! Parameter-update rules applied over a whole module tree.
use log::{debug, trace};
use ndarray::{ArrayViewD, ArrayViewMutD, Zip};

use crate::error::{NnError, Result};
use crate::module::{Module, ParameterSlot};

/// An update rule for learnable parameters.
///
/// Implementors provide the per-module rule; [`Optimizer::update`] finds every
/// parameterized module in a tree and applies it.
pub trait Optimizer {
    fn learning_rate(&self) -> f64;

    /// Applies the rule to one module's parameters using their latest gradients.
    fn update_module(&mut self, module: &mut dyn Module) -> Result<()>;

    /// Updates every parameterized module reachable from `root`, including
    /// `root` itself, exactly once.
    ///
    /// Traversal uses an explicit stack, so nesting depth is not bounded by
    /// the call stack. Gradients are consumed by the update; a second call
    /// without an intervening backward fails with [`NnError::StaleGradient`].
    /// Every gradient in the tree is checked before any parameter changes.
    fn update(&mut self, root: &mut dyn Module) -> Result<()> {
        ensure_gradients(&*root)?;
        let mut stack: Vec<&mut dyn Module> = vec![root];
        let mut updated = 0usize;
        while let Some(module) = stack.pop() {
            if module.has_parameters() {
                self.update_module(&mut *module)?;
                module.consume_gradients();
                updated += 1;
            }
            if let Some(children) = module.submodules_mut() {
                stack.extend(children.iter_mut().map(|child| child as &mut dyn Module));
            }
        }
        debug!("optimizer step: updated {} parameterized modules", updated);
        Ok(())
    }
}

/// Fails on the first parameterized module in the tree lacking a gradient.
fn ensure_gradients(root: &dyn Module) -> Result<()> {
    let mut stack: Vec<&dyn Module> = vec![root];
    while let Some(module) = stack.pop() {
        if let Some(parameter) = module.missing_gradient() {
            return Err(NnError::StaleGradient {
                module: module.name(),
                parameter,
            });
        }
        if let Some(children) = module.submodules() {
            stack.extend(children.iter().map(|child| child as &dyn Module));
        }
    }
    Ok(())
}

/// Pairs every slot with its gradient, failing on the first missing one
/// before any value is modified.
fn with_gradients<'a>(
    module: &'static str,
    slots: Vec<ParameterSlot<'a>>,
) -> Result<Vec<(&'static str, ArrayViewMutD<'a, f64>, ArrayViewD<'a, f64>)>> {
    slots
        .into_iter()
        .map(|ParameterSlot { name, value, gradient }| match gradient {
            Some(gradient) => Ok((name, value, gradient)),
            None => Err(NnError::StaleGradient {
                module,
                parameter: name,
            }),
        })
        .collect()
}

/// Plain gradient descent: `P <- P - learning_rate * dP`.
#[derive(Debug, Clone)]
pub struct StochasticGradientDescent {
    pub learning_rate: f64,
}

impl StochasticGradientDescent {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for StochasticGradientDescent {
    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn update_module(&mut self, module: &mut dyn Module) -> Result<()> {
        let name = module.name();
        let Some(slots) = module.parameters_mut() else {
            return Ok(());
        };
        let lr = self.learning_rate;
        for (parameter, mut value, gradient) in with_gradients(name, slots)? {
            trace!("{}: sgd step on {}", name, parameter);
            Zip::from(&mut value).and(&gradient).for_each(|p, &g| *p -= lr * g);
        }
        Ok(())
    }
}
