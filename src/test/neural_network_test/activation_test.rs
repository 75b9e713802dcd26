use super::*;

#[test]
fn relu_forward_and_derivative() {
    let u = array![[-1.0, 0.0, 2.5], [3.0, -0.5, 0.1]];
    let h = Nonlinearity::ReLU.apply(&u.view());
    let d = Nonlinearity::ReLU.derivative(&u.view());

    assert_eq!(h, array![[0.0, 0.0, 2.5], [3.0, 0.0, 0.1]]);
    // zero counts as inactive
    assert_eq!(d, array![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0]]);
}

#[test]
fn smooth_derivatives_match_closed_forms() {
    let u = array![[-2.0, -0.3, 0.0, 0.7, 1.9]];

    let tanh_d = Nonlinearity::Tanh.derivative(&u.view());
    let sig = Nonlinearity::Sigmoid.apply(&u.view());
    let sig_d = Nonlinearity::Sigmoid.derivative(&u.view());

    for (j, &x) in u.iter().enumerate() {
        assert_relative_eq!(tanh_d[[0, j]], 1.0 - x.tanh().powi(2), epsilon = 1e-12);
        let s = 1.0 / (1.0 + (-x).exp());
        assert_relative_eq!(sig[[0, j]], s, epsilon = 1e-12);
        assert_relative_eq!(sig_d[[0, j]], s * (1.0 - s), epsilon = 1e-12);
    }

    let lin = Nonlinearity::Linear.apply(&u.view());
    assert_eq!(lin, u);
    assert!(Nonlinearity::Linear.derivative(&u.view()).iter().all(|&x| x == 1.0));
}

#[test]
fn sigmoid_is_finite_for_extreme_inputs() {
    let u = array![[-1e4, 1e4]];
    let h = Nonlinearity::Sigmoid.apply(&u.view());
    assert!(h.iter().all(|x| x.is_finite()));
    assert_abs_diff_eq!(h[[0, 0]], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(h[[0, 1]], 1.0, epsilon = 1e-12);
}

#[test]
fn nonlinearity_parses_case_insensitively() {
    assert_eq!("ReLU".parse::<Nonlinearity>().unwrap(), Nonlinearity::ReLU);
    assert_eq!("TANH".parse::<Nonlinearity>().unwrap(), Nonlinearity::Tanh);
    assert_eq!("sigmoid".parse::<Nonlinearity>().unwrap(), Nonlinearity::Sigmoid);
    assert_eq!("linear".parse::<Nonlinearity>().unwrap(), Nonlinearity::Linear);

    let err = "softplus".parse::<Nonlinearity>().unwrap_err();
    assert!(matches!(err, ModelError::ConfigurationError(_)));
}

#[test]
fn nonlinearity_serializes_by_name() {
    assert_eq!(serde_json::to_string(&Nonlinearity::ReLU).unwrap(), "\"relu\"");
    let nl: Nonlinearity = serde_json::from_str("\"tanh\"").unwrap();
    assert_eq!(nl, Nonlinearity::Tanh);
    assert_eq!(Nonlinearity::Sigmoid.to_string(), "sigmoid");
}

#[test]
fn softmax_columns_are_distributions() {
    let logits = array![[1.0, 1000.0], [2.0, 1000.0], [3.0, -1000.0]];
    let p = softmax_columns(&logits);

    for col in p.columns() {
        assert_relative_eq!(col.sum(), 1.0, epsilon = 1e-12);
        assert!(col.iter().all(|x| x.is_finite() && *x >= 0.0));
    }
    assert!(p[[2, 0]] > p[[1, 0]] && p[[1, 0]] > p[[0, 0]]);
    assert_relative_eq!(p[[0, 1]], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(p[[2, 1]], 0.0, epsilon = 1e-12);
}
