// ml_examples/src/main.rs
use anyhow::Result;
use log::info;
use primitive_nn::{
    evaluate, fit, print_model_summary, print_summary_table, xor, Accuracy, Dense,
    MeanSquaredError, Module, Sequential, Sigmoid, TrainConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut rng = StdRng::seed_from_u64(42);

    println!("=== XOR ===");
    let (x, y) = xor();
    let mut model = Sequential::default()
        .with(Dense::new(2, 4, &mut rng))
        .with(Sigmoid::new())
        .with(Dense::new(4, 1, &mut rng))
        .with(Sigmoid::new());
    print_model_summary(&model);
    let config = TrainConfig {
        epochs: 3000,
        batch_size: 4,
        learning_rate: 10.0,
        shuffle: false,
        seed: Some(42),
    };
    let mut loss = MeanSquaredError::new();
    let mut opt = config.optimizer();
    let history = fit(&mut model, &mut loss, &mut opt, &x, &y, &config)?;
    print_summary_table(&history.epoch_losses, "XOR Loss");
    let predictions = model.forward(&x)?;
    for (input, p) in x.rows().into_iter().zip(predictions.iter()) {
        println!("{:?} -> {:.4}", input.to_vec(), p);
    }

    #[cfg(feature = "iris")]
    {
        use primitive_nn::{confusion_matrix, load_iris, CategoricalCrossEntropy, Dataset, Softmax};

        println!("\n=== Iris Dataset ===");
        let iris_csv = concat!(env!("CARGO_MANIFEST_DIR"), "/src/iris.csv");
        let (inputs, targets) = load_iris(iris_csv)?;
        let data = Dataset::split(inputs, targets, 0.2, &mut rng)?;
        let mut mlp_iris = Sequential::default()
            .with(Dense::new(4, 10, &mut rng))
            .with(Sigmoid::new())
            .with(Dense::new(10, 3, &mut rng))
            .with(Softmax::new());
        print_model_summary(&mlp_iris);
        let config = TrainConfig {
            epochs: 200,
            batch_size: 8,
            learning_rate: 0.1,
            shuffle: true,
            seed: Some(7),
        };
        let mut loss = CategoricalCrossEntropy::new();
        let mut opt = config.optimizer();
        let history = fit(&mut mlp_iris, &mut loss, &mut opt, &data.train_inputs, &data.train_targets, &config)?;
        print_summary_table(&history.epoch_losses, "Iris Loss");
        let iris_acc = evaluate(&mut mlp_iris, &Accuracy, &data.test_inputs, &data.test_targets)?;
        println!("Iris Accuracy: {:.2}%", iris_acc * 100.0);
        let y_hat = mlp_iris.forward(&data.test_inputs)?;
        for row in confusion_matrix(&data.test_targets, y_hat)? {
            println!("{:?}", row);
        }
    }

    #[cfg(feature = "mnist")]
    {
        use ndarray::s;
        use primitive_nn::{load_mnist, CategoricalCrossEntropy, ReLU, Softmax};

        println!("\n=== MNIST Subset (first 1000) ===");
        let data = load_mnist("data")?;
        let n = data.train_len().min(1000);
        let train_x = data.train_inputs.slice(s![..n, ..]).to_owned();
        let train_y = data.train_targets.slice(s![..n, ..]).to_owned();
        let mut mlp_mnist = Sequential::default()
            .with(Dense::new(784, 128, &mut rng))
            .with(ReLU::new())
            .with(Dense::new(128, 10, &mut rng))
            .with(Softmax::new());
        print_model_summary(&mlp_mnist);
        let config = TrainConfig {
            epochs: 20,
            batch_size: 32,
            learning_rate: 0.05,
            shuffle: true,
            seed: Some(1),
        };
        let mut loss = CategoricalCrossEntropy::new();
        let mut opt = config.optimizer();
        let history = fit(&mut mlp_mnist, &mut loss, &mut opt, &train_x, &train_y, &config)?;
        print_summary_table(&history.epoch_losses, "MNIST Loss");
        let mnist_acc = evaluate(&mut mlp_mnist, &Accuracy, &data.test_inputs, &data.test_targets)?;
        println!("MNIST Accuracy: {:.2}%", mnist_acc * 100.0);

        // Demo: save and load model
        mlp_mnist.save("models/mnist_model.nn.gz")?;
        let mut reloaded_mnist = Sequential::load("models/mnist_model.nn.gz")?;
        let mnist_acc_loaded = evaluate(&mut reloaded_mnist, &Accuracy, &data.test_inputs, &data.test_targets)?;
        println!("MNIST Accuracy (reloaded): {:.2}%", mnist_acc_loaded * 100.0);
        anyhow::ensure!(mnist_acc == mnist_acc_loaded, "reloaded model disagrees with the trained one");
    }

    info!("done");
    Ok(())
}
