//! Model persistence: a `Sequential` tree as gzip-compressed JSON.
//!
//! Only structure and parameters are stored. Cached tensors and gradients are
//! transient and come back empty.
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::activations::ActivationKind;
use crate::layers::Dense;
use crate::module::Layer;
use crate::sequential::Sequential;
use crate::tensor::Vector;

/// Snapshot format written by this version of the crate.
pub const FORMAT_VERSION: u32 = 1;

/// Serializable description of one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LayerSnapshot {
    Dense {
        input_size: usize,
        output_size: usize,
        weights: Vec<Vec<f64>>, // [input_size][output_size]
        bias: Vec<f64>,         // [output_size]
    },
    Activation {
        activation: ActivationKind,
    },
    Sequential {
        layers: Vec<LayerSnapshot>,
    },
}

/// Serializable description of a whole model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub format_version: u32,
    pub layers: Vec<LayerSnapshot>,
}

fn finite_values<'a>(what: &str, values: impl IntoIterator<Item = &'a f64>) -> Result<Vec<f64>> {
    values
        .into_iter()
        .map(|&v| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(anyhow!("refusing to save non-finite {} value {}", what, v))
            }
        })
        .collect()
}

impl LayerSnapshot {
    fn activation(activation: ActivationKind) -> Self {
        LayerSnapshot::Activation { activation }
    }

    fn from_layer(layer: &Layer) -> Result<Self> {
        Ok(match layer {
            Layer::Dense(dense) => LayerSnapshot::Dense {
                input_size: dense.input_size(),
                output_size: dense.output_size(),
                weights: dense
                    .weights()
                    .rows()
                    .into_iter()
                    .map(|row| finite_values("weight", row))
                    .collect::<Result<_>>()?,
                bias: finite_values("bias", dense.bias())?,
            },
            Layer::Sequential(seq) => LayerSnapshot::Sequential {
                layers: seq
                    .layers()
                    .iter()
                    .map(LayerSnapshot::from_layer)
                    .collect::<Result<_>>()?,
            },
            Layer::Sigmoid(_) => LayerSnapshot::activation(ActivationKind::Sigmoid),
            Layer::ReLU(_) => LayerSnapshot::activation(ActivationKind::ReLU),
            Layer::Tanh(_) => LayerSnapshot::activation(ActivationKind::Tanh),
            Layer::Softmax(_) => LayerSnapshot::activation(ActivationKind::Softmax),
        })
    }

    fn into_layer(self) -> Result<Layer> {
        match self {
            LayerSnapshot::Dense {
                input_size,
                output_size,
                weights,
                bias,
            } => {
                if weights.len() != input_size || weights.iter().any(|row| row.len() != output_size) {
                    bail!(
                        "dense weights are not {}x{} (got {} rows)",
                        input_size,
                        output_size,
                        weights.len()
                    );
                }
                let flat: Vec<f64> = weights.into_iter().flatten().collect();
                let weights = Array2::from_shape_vec((input_size, output_size), flat)?;
                let dense = Dense::from_parameters(weights, Vector::from(bias))
                    .context("dense bias does not match output size")?;
                Ok(dense.into())
            }
            LayerSnapshot::Activation { activation } => Ok(activation.to_layer()),
            LayerSnapshot::Sequential { layers } => {
                let layers = layers
                    .into_iter()
                    .map(LayerSnapshot::into_layer)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Sequential::new(layers).into())
            }
        }
    }
}

impl ModelSnapshot {
    /// Fails if any parameter is NaN or infinite.
    pub fn from_model(model: &Sequential) -> Result<Self> {
        Ok(Self {
            format_version: FORMAT_VERSION,
            layers: model
                .layers()
                .iter()
                .map(LayerSnapshot::from_layer)
                .collect::<Result<_>>()?,
        })
    }

    pub fn into_model(self) -> Result<Sequential> {
        if self.format_version != FORMAT_VERSION {
            bail!(
                "unsupported model format version {} (expected {})",
                self.format_version,
                FORMAT_VERSION
            );
        }
        let layers = self
            .layers
            .into_iter()
            .map(LayerSnapshot::into_layer)
            .collect::<Result<Vec<_>>>()?;
        Ok(Sequential::new(layers))
    }
}

impl Sequential {
    /// Gzip-compressed JSON snapshot of the model. Non-finite parameters are
    /// rejected.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(&ModelSnapshot::from_model(self)?)?;
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&json)?;
        Ok(enc.finish()?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut dec = GzDecoder::new(bytes);
        let mut buf = Vec::new();
        dec.read_to_end(&mut buf).context("decompressing model")?;
        let snapshot: ModelSnapshot = serde_json::from_slice(&buf).context("parsing model snapshot")?;
        snapshot.into_model()
    }

    /// Save model to `path`, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = self.to_bytes()?;
        let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        file.write_all(&bytes)?;
        info!("saved {} ({} bytes) to {}", self, bytes.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
        let model = Self::from_bytes(&bytes)?;
        info!("loaded {} from {}", model, path.display());
        Ok(model)
    }
}
