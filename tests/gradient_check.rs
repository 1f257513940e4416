//! Analytical backward passes checked against central finite differences.
use approx::assert_abs_diff_eq;
use ndarray::array;
use primitive_nn::{
    CategoricalCrossEntropy, Dense, Loss, Matrix, MeanSquaredError, Module, ReLU, Sigmoid,
    Softmax, Tanh, Vector,
};

const H: f64 = 1e-6;
const TOL: f64 = 1e-6;

/// Central-difference gradient of a scalar function of a matrix.
fn numerical_gradient(x: &Matrix, mut f: impl FnMut(&Matrix) -> f64) -> Matrix {
    let mut grad = Matrix::zeros(x.raw_dim());
    for idx in ndarray::indices(x.raw_dim()) {
        let mut plus = x.clone();
        plus[idx] += H;
        let mut minus = x.clone();
        minus[idx] -= H;
        grad[idx] = (f(&plus) - f(&minus)) / (2.0 * H);
    }
    grad
}

fn assert_close(analytic: &Matrix, numeric: &Matrix) {
    assert_eq!(analytic.dim(), numeric.dim());
    for (a, n) in analytic.iter().zip(numeric.iter()) {
        assert_abs_diff_eq!(*a, *n, epsilon = TOL);
    }
}

fn inputs() -> Matrix {
    array![[0.5, -1.2, 2.0, 0.3], [-0.3, 0.8, -2.5, 1.1], [1.7, -0.6, 0.05, -0.9]]
}

fn upstream() -> Matrix {
    array![[0.2, -0.7, 1.3, 0.4], [-1.1, 0.5, 0.9, -0.2], [0.6, 0.3, -0.8, 1.5]]
}

/// Checks `backward(G)` against d/dX of `sum(G * forward(X))`.
fn check_module<M: Module + Clone>(module: M) {
    let x = inputs();
    let g = upstream();

    let mut m = module.clone();
    m.forward(&x).unwrap();
    let analytic = m.backward(&g).unwrap().clone();

    let numeric = numerical_gradient(&x, |x| {
        let mut probe = module.clone();
        (probe.forward(x).unwrap() * &g).sum()
    });
    assert_close(&analytic, &numeric);
}

#[test]
fn sigmoid_gradient() {
    check_module(Sigmoid::new());
}

#[test]
fn relu_gradient_away_from_zero() {
    check_module(ReLU::new());
}

#[test]
fn tanh_gradient() {
    check_module(Tanh::new());
}

#[test]
fn softmax_gradient() {
    check_module(Softmax::new());
}

#[test]
fn relu_at_zero_uses_left_derivative() {
    let x = array![[0.0, 1.0]];
    let mut relu = ReLU::new();
    relu.forward(&x).unwrap();
    let dx = relu.backward(&array![[3.0, 3.0]]).unwrap();
    assert_eq!(dx, &array![[0.0, 3.0]]);

    // one-sided difference from the left agrees with the subgradient
    let left = (ReLU::new().forward(&array![[0.0]]).unwrap()[[0, 0]]
        - ReLU::new().forward(&array![[-H]]).unwrap()[[0, 0]])
        / H;
    assert_eq!(left, dx[[0, 0]]);
}

#[test]
fn dense_gradients() {
    let w = array![[0.1, -0.4], [0.7, 0.2], [-0.5, 0.3], [0.05, -0.9]];
    let b = array![0.2, -0.1];
    let x = inputs();
    let g = array![[0.5, -1.0], [1.2, 0.3], [-0.4, 0.8]];

    let mut dense = Dense::from_parameters(w.clone(), b.clone()).unwrap();
    dense.forward(&x).unwrap();
    let dx = dense.backward(&g).unwrap().clone();

    let objective = |w: &Matrix, b: &Vector, x: &Matrix| {
        let mut probe = Dense::from_parameters(w.clone(), b.clone()).unwrap();
        (probe.forward(x).unwrap() * &g).sum()
    };

    assert_close(&dx, &numerical_gradient(&x, |x| objective(&w, &b, x)));
    assert_close(
        dense.weight_gradient().unwrap(),
        &numerical_gradient(&w, |w| objective(w, &b, &x)),
    );

    let b_row = b.clone().insert_axis(ndarray::Axis(0));
    let numeric_b = numerical_gradient(&b_row, |b| objective(&w, &b.row(0).to_owned(), &x));
    let analytic_b = dense.bias_gradient().unwrap().clone().insert_axis(ndarray::Axis(0));
    assert_close(&analytic_b, &numeric_b);
}

#[test]
fn mse_gradient_matches_scaled_sum() {
    let y = array![[1.0, 0.0, 0.5], [0.0, 1.0, -0.5]];
    let y_hat = array![[0.8, 0.3, 0.1], [0.2, 0.6, 0.4]];
    let (batch, features) = (y.nrows() as f64, y.ncols() as f64);

    let mut mse = MeanSquaredError::new();
    mse.forward(&y, &y_hat).unwrap();
    let analytic = mse.backward().unwrap().clone();

    // L is averaged over features; dY_hat is the gradient of sum(L) * F / B.
    let numeric = numerical_gradient(&y_hat, |p| {
        MeanSquaredError::new().forward(&y, p).unwrap().sum() * features / batch
    });
    assert_close(&analytic, &numeric);
}

#[test]
fn cross_entropy_gradient() {
    let y = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
    let y_hat = array![[0.6, 0.3, 0.1], [0.2, 0.5, 0.3]];

    let mut cce = CategoricalCrossEntropy::new();
    cce.forward(&y, &y_hat).unwrap();
    let analytic = cce.backward().unwrap().clone();

    let numeric = numerical_gradient(&y_hat, |p| {
        CategoricalCrossEntropy::new().forward(&y, p).unwrap().sum()
    });
    assert_close(&analytic, &numeric);
}

#[test]
fn cross_entropy_stays_finite_on_saturated_predictions() {
    let y = array![[0.0, 1.0], [1.0, 0.0]];
    let y_hat = array![[1.0, 0.0], [1.0, 0.0]];

    let mut cce = CategoricalCrossEntropy::new();
    let l = cce.forward(&y, &y_hat).unwrap().clone();
    assert!(l.iter().all(|v| v.is_finite()));
    assert_abs_diff_eq!(l[0], -(1e-7f64).ln(), epsilon = 1e-9);
    assert!(cce.backward().unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn softmax_and_cross_entropy_chain_to_prediction_error() {
    let x = array![[2.0, 1.0, 0.1], [0.3, -0.4, 1.2]];
    let y = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];

    let mut softmax = Softmax::new();
    let p = softmax.forward(&x).unwrap().clone();
    let mut cce = CategoricalCrossEntropy::new();
    cce.forward(&y, &p).unwrap();
    let dx = softmax.backward(cce.backward().unwrap()).unwrap();

    assert_close(dx, &(&p - &y));
}
