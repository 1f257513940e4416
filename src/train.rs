//! Training loop: forward, loss, backward, update, repeated over mini-batches.
use std::fs;
use std::path::Path;

use anyhow::Context;
use log::{debug, info};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::loss::Loss;
use crate::metrics::Metric;
use crate::module::Module;
use crate::optimizer::{Optimizer, StochasticGradientDescent};
use crate::sequential::Sequential;
use crate::tensor::{ensure_shape, Matrix};

/// Hyper-parameters of a training run. Missing JSON fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Reshuffle sample order every epoch.
    pub shuffle: bool,
    /// Seed for the shuffling RNG; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.1,
            shuffle: true,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("parsing training config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading training config {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let reason = if self.epochs == 0 {
            "epochs must be positive"
        } else if self.batch_size == 0 {
            "batch_size must be positive"
        } else if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            "learning_rate must be finite and positive"
        } else {
            return Ok(());
        };
        Err(NnError::InvalidConfig {
            reason: reason.to_string(),
        })
    }

    /// Plain SGD with this config's learning rate.
    pub fn optimizer(&self) -> StochasticGradientDescent {
        StochasticGradientDescent::new(self.learning_rate)
    }
}

/// Per-epoch record of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Mean per-sample loss of each epoch.
    pub epoch_losses: Vec<f64>,
}

impl History {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// One full training step on a batch. Returns the batch mean loss.
pub fn train_step(
    model: &mut Sequential,
    loss: &mut dyn Loss,
    optimizer: &mut dyn Optimizer,
    x: &Matrix,
    y: &Matrix,
) -> Result<f64> {
    let y_hat = model.forward(x)?;
    let per_sample = loss.forward(y, y_hat)?;
    let mean = per_sample.mean().unwrap_or(0.0);
    let seed = loss.backward()?;
    model.backward(seed)?;
    optimizer.update(model)?;
    Ok(mean)
}

/// Trains `model` on `(x, y)` for `config.epochs` epochs of mini-batches.
pub fn fit(
    model: &mut Sequential,
    loss: &mut dyn Loss,
    optimizer: &mut dyn Optimizer,
    x: &Matrix,
    y: &Matrix,
    config: &TrainConfig,
) -> Result<History> {
    config.validate()?;
    ensure_shape("fit", &[x.nrows()], &[y.nrows()])?;
    if x.nrows() == 0 {
        return Err(NnError::EmptyTensor { op: "fit" });
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut indices: Vec<usize> = (0..x.nrows()).collect();
    let mut history = History::default();

    info!(
        "training {} on {} samples: {} epochs, batch size {}, {} with lr {}",
        model,
        x.nrows(),
        config.epochs,
        config.batch_size,
        loss.name(),
        optimizer.learning_rate()
    );

    for epoch in 0..config.epochs {
        if config.shuffle {
            indices.shuffle(&mut rng);
        }
        let mut total = 0.0;
        for (step, batch) in indices.chunks(config.batch_size).enumerate() {
            let bx = x.select(Axis(0), batch);
            let by = y.select(Axis(0), batch);
            let batch_loss = train_step(model, loss, optimizer, &bx, &by)?;
            debug!("epoch {} step {}: loss = {:.6}", epoch + 1, step, batch_loss);
            total += batch_loss * batch.len() as f64;
        }
        let avg = total / x.nrows() as f64;
        info!("Epoch {}: Loss = {:.6}", epoch + 1, avg);
        history.epoch_losses.push(avg);
    }
    Ok(history)
}

/// Forward pass over `x` scored with `metric` against `y`.
pub fn evaluate(model: &mut Sequential, metric: &dyn Metric, x: &Matrix, y: &Matrix) -> Result<f64> {
    let y_hat = model.forward(x)?;
    metric.compute(y, y_hat)
}
