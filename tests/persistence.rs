use ndarray::array;
use primitive_nn::{
    Dense, Matrix, Module, Optimizer, ReLU, Sequential, Sigmoid, Softmax,
    StochasticGradientDescent, Tanh,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn model(rng: &mut StdRng) -> Sequential {
    Sequential::default()
        .with(
            Sequential::default()
                .with(Dense::new(3, 5, rng))
                .with(Tanh::new()),
        )
        .with(Dense::new(5, 4, rng))
        .with(ReLU::new())
        .with(Dense::new(4, 2, rng))
        .with(Softmax::new())
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("net.nn.gz");
    let mut original = model(&mut StdRng::seed_from_u64(12));
    let x = array![[0.3, -0.2, 1.0], [2.0, 0.5, -1.5]];
    let expected = original.forward(&x).unwrap().clone();

    original.save(&path).unwrap();
    let mut restored = Sequential::load(&path).unwrap();

    assert_eq!(restored.layer_sizes(), original.layer_sizes());
    assert_eq!(restored.num_parameters(), original.num_parameters());
    assert_eq!(restored.descendants().len(), original.descendants().len());
    assert_eq!(restored.forward(&x).unwrap(), &expected);
}

#[test]
fn restored_model_has_empty_caches_and_trains() {
    let mut trained = model(&mut StdRng::seed_from_u64(4));
    let x = Matrix::from_elem((2, 3), 0.5);
    trained.forward(&x).unwrap();
    trained.backward(&Matrix::ones((2, 2))).unwrap();

    let mut restored = Sequential::from_bytes(&trained.to_bytes().unwrap()).unwrap();
    assert!(restored.output().is_none());
    assert!(restored.activation_trace().is_empty());
    assert!(restored.layers()[1].as_dense().unwrap().weight_gradient().is_none());

    restored.forward(&x).unwrap();
    restored.backward(&Matrix::ones((2, 2))).unwrap();
    StochasticGradientDescent::new(0.1).update(&mut restored).unwrap();
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Sequential::load(dir.path().join("nope.nn.gz")).unwrap_err();
    assert!(err.to_string().contains("nope.nn.gz"));
}

#[test]
fn snapshot_is_plain_json_inside_gzip() {
    use std::io::Read;

    let model = Sequential::default()
        .with(Dense::from_parameters(array![[1.5], [-2.0]], array![0.25]).unwrap())
        .with(Sigmoid::new());
    let bytes = model.to_bytes().unwrap();
    let mut json = String::new();
    flate2::read::GzDecoder::new(bytes.as_slice())
        .read_to_string(&mut json)
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["format_version"], 1);
    assert_eq!(value["layers"][0]["kind"], "Dense");
    assert_eq!(value["layers"][0]["weights"][1][0], -2.0);
    assert_eq!(value["layers"][1]["activation"], "Sigmoid");
}
