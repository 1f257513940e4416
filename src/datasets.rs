//! Dataset loading utilities: XOR, Iris (CSV) and MNIST (gzipped IDX).
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use byteorder::{BigEndian, ReadBytesExt};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use log::info;
use ndarray::{array, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{NnError, Result};
use crate::tensor::{ensure_shape, Matrix};

const IDX_LABELS_MAGIC: i32 = 2049;
const IDX_IMAGES_MAGIC: i32 = 2051;
const MNIST_CLASSES: usize = 10;
const IRIS_SPECIES: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Paired train and test partitions. Row `i` of an input matrix belongs with
/// row `i` of the matching target matrix.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub train_inputs: Matrix,
    pub train_targets: Matrix,
    pub test_inputs: Matrix,
    pub test_targets: Matrix,
}

impl Dataset {
    pub fn validate(&self) -> Result<()> {
        ensure_shape("Dataset::train", &[self.train_inputs.nrows()], &[self.train_targets.nrows()])?;
        ensure_shape("Dataset::test", &[self.test_inputs.nrows()], &[self.test_targets.nrows()])?;
        ensure_shape(
            "Dataset::features",
            &[self.train_inputs.ncols(), self.train_targets.ncols()],
            &[self.test_inputs.ncols(), self.test_targets.ncols()],
        )
    }

    /// Shuffles rows and moves `test_fraction` of them into the test partition.
    pub fn split<R: Rng + ?Sized>(
        inputs: Matrix,
        targets: Matrix,
        test_fraction: f64,
        rng: &mut R,
    ) -> Result<Self> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(NnError::InvalidConfig {
                reason: format!("test_fraction must be in [0, 1), got {}", test_fraction),
            });
        }
        ensure_shape("Dataset::split", &[inputs.nrows()], &[targets.nrows()])?;

        let mut indices: Vec<usize> = (0..inputs.nrows()).collect();
        indices.shuffle(rng);
        let n_test = (inputs.nrows() as f64 * test_fraction).round() as usize;
        let (test, train) = indices.split_at(n_test);

        Ok(Self {
            train_inputs: inputs.select(Axis(0), train),
            train_targets: targets.select(Axis(0), train),
            test_inputs: inputs.select(Axis(0), test),
            test_targets: targets.select(Axis(0), test),
        })
    }

    pub fn train_len(&self) -> usize {
        self.train_inputs.nrows()
    }

    pub fn test_len(&self) -> usize {
        self.test_inputs.nrows()
    }
}

/// One-hot encode labels into a `labels.len() × num_classes` matrix.
/// Out-of-range labels give an all-zero row.
pub fn one_hot(labels: &[usize], num_classes: usize) -> Matrix {
    let mut out = Matrix::zeros((labels.len(), num_classes));
    for (row, &label) in labels.iter().enumerate() {
        if label < num_classes {
            out[[row, label]] = 1.0;
        }
    }
    out
}

/// The four XOR cases and their single-column targets.
pub fn xor() -> (Matrix, Matrix) {
    let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    let y = array![[0.0], [1.0], [1.0], [0.0]];
    (x, y)
}

/// Load Iris from CSV: four feature columns and a species column, with a
/// header row. Species are one-hot encoded over three classes.
pub fn load_iris(path: impl AsRef<Path>) -> anyhow::Result<(Matrix, Matrix)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut features = Vec::new();
    let mut labels = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| anyhow!("CSV parse error: {}", e))?;
        if record.len() != 5 {
            continue;
        }
        for field in record.iter().take(4) {
            let value: f64 = field
                .trim()
                .parse()
                .with_context(|| format!("record {}: bad feature {:?}", line + 1, field))?;
            features.push(value);
        }
        // Normalize values like "Iris-setosa" -> "setosa"
        let species = record[4].trim_matches('"').trim().to_lowercase();
        let name = species.trim_start_matches("iris-");
        let label = IRIS_SPECIES
            .iter()
            .position(|s| *s == name)
            .ok_or_else(|| anyhow!("Unknown species: {}", species))?;
        labels.push(label);
    }
    if labels.is_empty() {
        bail!("No data loaded from Iris");
    }

    let inputs = Array2::from_shape_vec((labels.len(), 4), features)?;
    info!("loaded {} Iris samples from {}", labels.len(), path.display());
    Ok((inputs, one_hot(&labels, IRIS_SPECIES.len())))
}

/// A decoded IDX array: dimension sizes and the raw `u8` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxArray {
    pub dims: Vec<usize>,
    pub data: Vec<u8>,
}

fn element_count(dims: &[usize]) -> anyhow::Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| anyhow!("IDX dimensions {:?} overflow", dims))
}

/// Parse an uncompressed IDX file (labels: magic 2049, images: magic 2051).
pub fn parse_idx(bytes: &[u8]) -> anyhow::Result<IdxArray> {
    let mut r = Cursor::new(bytes);
    let magic = r
        .read_i32::<BigEndian>()
        .map_err(|e| anyhow!("Read magic: {}", e))?;
    let rank = match magic {
        IDX_LABELS_MAGIC => 1,
        IDX_IMAGES_MAGIC => 3,
        _ => bail!("Invalid magic: {}", magic),
    };
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        let size = r.read_i32::<BigEndian>().context("reading IDX dimensions")?;
        dims.push(usize::try_from(size).map_err(|_| anyhow!("negative IDX dimension {}", size))?);
    }
    let mut data = Vec::new();
    r.read_to_end(&mut data)
        .map_err(|e| anyhow!("Read data: {}", e))?;

    let expected = element_count(&dims)?;
    if data.len() < expected {
        bail!("IDX payload has {} bytes, dimensions {:?} need {}", data.len(), dims, expected);
    }
    data.truncate(expected);
    Ok(IdxArray { dims, data })
}

fn read_idx_gz(path: &Path) -> anyhow::Result<IdxArray> {
    let file = File::open(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let mut gz = GzDecoder::new(file);
    let mut contents = Vec::new();
    gz.read_to_end(&mut contents)
        .map_err(|e| anyhow!("Gzip read error in {}: {}", path.display(), e))?;
    parse_idx(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn load_mnist_part(dir: &Path, prefix: &str) -> anyhow::Result<(Matrix, Matrix)> {
    let labels = read_idx_gz(&dir.join(format!("{}-labels-idx1-ubyte.gz", prefix)))?;
    let images = read_idx_gz(&dir.join(format!("{}-images-idx3-ubyte.gz", prefix)))?;
    if images.dims.len() != 3 || labels.dims.len() != 1 {
        bail!("{}: expected an image file and a label file", prefix);
    }
    let n = labels.dims[0];
    if images.dims[0] != n {
        bail!("{}: {} images but {} labels", prefix, images.dims[0], n);
    }

    let pixels = element_count(&images.dims[1..])?;
    let inputs = Array2::from_shape_vec(
        (n, pixels),
        images.data.iter().map(|&b| b as f64 / 255.0).collect(),
    )?;
    let labels: Vec<usize> = labels.data.iter().map(|&b| b as usize).collect();
    Ok((inputs, one_hot(&labels, MNIST_CLASSES)))
}

/// Load MNIST train (`train-*`) and test (`t10k-*`) gzipped IDX files from `dir`.
pub fn load_mnist(dir: impl AsRef<Path>) -> anyhow::Result<Dataset> {
    let dir = dir.as_ref();
    let (train_inputs, train_targets) = load_mnist_part(dir, "train")?;
    let (test_inputs, test_targets) = load_mnist_part(dir, "t10k")?;
    let dataset = Dataset {
        train_inputs,
        train_targets,
        test_inputs,
        test_targets,
    };
    dataset.validate()?;
    info!(
        "loaded MNIST from {}: {} train / {} test",
        dir.display(),
        dataset.train_len(),
        dataset.test_len()
    );
    Ok(dataset)
}
