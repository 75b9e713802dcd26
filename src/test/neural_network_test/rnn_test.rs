use super::*;

#[test]
fn hyperparams_validation() {
    assert!(RnnHyperparams::default().validate().is_ok());

    let cases = [
        RnnHyperparams { recurrent_layer: 0, ..small_hps(Nonlinearity::ReLU, 1) },
        RnnHyperparams { recurrent_layer: 4, ..small_hps(Nonlinearity::ReLU, 1) },
        RnnHyperparams { hidden_size: 0, ..small_hps(Nonlinearity::ReLU, 1) },
        RnnHyperparams { output_size: 0, ..small_hps(Nonlinearity::ReLU, 1) },
        RnnHyperparams { max_act: 0.0, ..small_hps(Nonlinearity::ReLU, 1) },
        RnnHyperparams { max_act: f64::INFINITY, ..small_hps(Nonlinearity::ReLU, 1) },
    ];
    for hps in cases {
        let err = RNN::new(hps.clone(), 0).unwrap_err();
        assert!(
            matches!(err, ModelError::ConfigurationError(_)),
            "{:?} should be rejected",
            hps
        );
    }
}

#[test]
fn hyperparams_json_fills_defaults() {
    let hps: RnnHyperparams =
        serde_json::from_str(r#"{"hidden_size": 12, "nl": "tanh"}"#).unwrap();
    assert_eq!(hps.hidden_size, 12);
    assert_eq!(hps.nl, Nonlinearity::Tanh);
    assert_eq!(hps.hidden_layers, 5);
    assert_eq!(hps.recurrent_layer, 3);
    assert_eq!(hps.output_size, 34);
}

#[test]
fn inference_returns_probabilities_without_cost() {
    let mut rnn = RNN::new(small_hps(Nonlinearity::ReLU, 2), 1).unwrap();
    let (data, _) = toy_batch();

    let (cost, output) = rnn.cost_and_grad(&data, None, true, None).unwrap();
    assert!(cost.is_none());

    let probs = output.probabilities().unwrap();
    assert_eq!(probs.dim(), (5, 4, 3));
    for t in 0..4 {
        for b in 0..3 {
            assert_relative_eq!(probs.slice(s![.., t, b]).sum(), 1.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn cost_is_the_same_with_and_without_gradients() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.3, 5);
    let (data, labels) = toy_batch();

    let (cost_fwd, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), false, None).unwrap();
    assert!(output.probabilities().is_some());
    let (cost_bwd, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), true, None).unwrap();
    assert!(output.into_gradients().is_some());

    assert_eq!(cost_fwd.unwrap(), cost_bwd.unwrap());
}

#[test]
fn cost_is_mean_negative_log_likelihood_over_batch_and_time() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 1), 0.2, 9);
    let (data, labels) = toy_batch();

    let (cost, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), false, None).unwrap();
    let probs = output.probabilities().unwrap();

    let mut expected = 0.0;
    for (b, seq) in labels.iter().enumerate() {
        for (t, &c) in seq.iter().enumerate() {
            expected -= probs[[c, t, b]].ln();
        }
    }
    expected /= 3.0 * 4.0;
    assert_relative_eq!(cost.unwrap(), expected, epsilon = 1e-12);
}

#[test]
fn unlabeled_batch_has_zero_cost_and_gradient() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 2), 0.3, 2);
    let (data, _) = toy_batch();
    let labels = vec![vec![], vec![], vec![]];

    let (cost, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), true, None).unwrap();
    assert_eq!(cost.unwrap(), 0.0);
    let grads = output.into_gradients().unwrap();
    assert_eq!(grads.global_norm(), 0.0);
}

#[test]
fn gradients_skip_unused_slots() {
    // recurrent layer 2 has no bh1 term, and only its column of h0 is read
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.3, 4);
    let (data, labels) = toy_batch();

    let (_, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), true, None).unwrap();
    let grads = output.into_gradients().unwrap();

    assert!(grads.inter[0].bias.iter().all(|&x| x == 0.0));
    assert!(grads.inter[1].bias.iter().any(|&x| x != 0.0));
    assert!(grads.h0.column(0).iter().all(|&x| x == 0.0));
    assert!(grads.h0.column(2).iter().all(|&x| x == 0.0));
    assert!(grads.h0.column(1).iter().any(|&x| x != 0.0));
}

#[test]
fn recurrent_preactivation_is_clipped() {
    let hps = RnnHyperparams {
        max_act: 0.2,
        ..small_hps(Nonlinearity::ReLU, 2)
    };
    let mut rnn = scaled_rnn(hps, 2.0, 8);
    let (data, _) = toy_batch();

    let trace = rnn.forward_trace(&data, None).unwrap();
    let u_rec = trace.pre_activations().slice(s![.., .., .., 1]);
    assert!(u_rec.iter().all(|&x| x <= 0.2));
    assert!(u_rec.iter().any(|&x| x == 0.2));

    // other layers are left alone
    let u_top = trace.pre_activations().slice(s![.., .., .., 2]);
    assert!(u_top.iter().any(|&x| x > 0.2));
}

#[test]
fn clip_activation_is_idempotent_and_leaves_small_values() {
    let mut pre = array![[-3.0, 0.5, 4.99], [5.0, 5.01, 100.0]];
    clip_activation(&mut pre, 5.0);
    assert_eq!(pre, array![[-3.0, 0.5, 4.99], [5.0, 5.0, 5.0]]);

    let once = pre.clone();
    clip_activation(&mut pre, 5.0);
    assert_eq!(pre, once);
}

#[test]
fn resuming_from_last_hidden_state_matches_one_long_run() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.4, 6);
    let seqs = vec![vec![0, 1, 2, 3, 4, 0], vec![4, 4, 3, 1, 0, 2], vec![2, 0, 1, 1, 3, 4]];
    let full = one_hot_lists(&seqs, 5).unwrap();
    let first = full.slice(s![.., 0..3, ..]).to_owned();
    let second = full.slice(s![.., 3..6, ..]).to_owned();

    let (_, out_full) = rnn.cost_and_grad(&full, None, false, None).unwrap();
    let probs_full = out_full.probabilities().unwrap().clone();

    rnn.cost_and_grad(&first, None, false, None).unwrap();
    let carry = rnn.last_hidden_state().unwrap().clone();
    assert_eq!(carry.dim(), (6, 3, 3));
    let (_, out_second) = rnn.cost_and_grad(&second, None, false, Some(&carry)).unwrap();
    let probs_second = out_second.probabilities().unwrap();

    let expected = probs_full.slice(s![.., 3..6, ..]);
    for (a, b) in probs_second.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn last_hidden_state_is_the_final_timestep() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 3), 0.3, 12);
    let (data, _) = toy_batch();
    assert!(rnn.last_hidden_state().is_none());

    let trace = rnn.forward_trace(&data, None).unwrap();
    let last = rnn.last_hidden_state().unwrap();
    assert_eq!(last, &trace.activations().index_axis(Axis(1), 3).to_owned());
}

#[test]
fn mismatched_inputs_are_rejected() {
    let mut rnn = RNN::new(small_hps(Nonlinearity::ReLU, 2), 0).unwrap();
    let (data, labels) = toy_batch();

    let wrong_classes = Array3::<f64>::zeros((4, 4, 3));
    let err = rnn.cost_and_grad(&wrong_classes, None, false, None).unwrap_err();
    assert!(matches!(err, ModelError::InputValidationError(_)));

    let empty = Array3::<f64>::zeros((5, 0, 3));
    assert!(rnn.cost_and_grad(&empty, None, false, None).is_err());

    let too_long = vec![vec![0; 5], vec![0], vec![0]];
    assert!(rnn.cost_and_grad(&data, Some(too_long.as_slice()), true, None).is_err());

    let out_of_range = vec![vec![5], vec![0], vec![0]];
    assert!(rnn.cost_and_grad(&data, Some(out_of_range.as_slice()), true, None).is_err());

    let too_few = vec![vec![0], vec![0]];
    assert!(rnn.cost_and_grad(&data, Some(too_few.as_slice()), true, None).is_err());

    let bad_carry = Array3::<f64>::zeros((6, 2, 3));
    let err = rnn
        .cost_and_grad(&data, Some(labels.as_slice()), true, Some(&bad_carry))
        .unwrap_err();
    assert!(matches!(err, ModelError::InputValidationError(_)));
}

#[test]
fn with_params_checks_shapes() {
    let params = ParamSet::zeros(6, 2, 5);
    let err = RNN::with_params(small_hps(Nonlinearity::ReLU, 2), params).unwrap_err();
    assert!(matches!(err, ModelError::ConfigurationError(_)));

    let params = ParamSet::zeros(7, 3, 5);
    assert!(RNN::with_params(small_hps(Nonlinearity::ReLU, 2), params).is_err());
}

#[test]
fn checkpoint_from_another_architecture_is_rejected() {
    let path = temp_path("rnn_checkpoint_arch.json");
    let rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 1), 0.3, 4);
    rnn.save_to_path(&path).unwrap();

    let mismatched = [
        small_hps(Nonlinearity::ReLU, 3),
        small_hps(Nonlinearity::Tanh, 3),
        small_hps(Nonlinearity::ReLU, 1),
        RnnHyperparams {
            max_act: 2.5,
            ..small_hps(Nonlinearity::Tanh, 1)
        },
    ];
    for hps in mismatched {
        let mut other = RNN::new(hps.clone(), 8).unwrap();
        let before = other.params().clone();
        let err = other.load_from_path(&path).unwrap_err();
        assert!(matches!(err, IoError::StateMismatch(_)), "{:?}", hps);
        assert_eq!(other.params(), &before);
    }

    let mut other_batch = RNN::new(
        RnnHyperparams {
            batch_size: 7,
            ..small_hps(Nonlinearity::Tanh, 1)
        },
        8,
    )
    .unwrap();
    other_batch.load_from_path(&path).unwrap();
    assert_eq!(other_batch.params(), rnn.params());

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn backward_trace_exposes_gradient_tensors() {
    let hps = small_hps(Nonlinearity::Tanh, 2);
    let mut rnn = scaled_rnn(hps.clone(), 0.3, 13);
    let (data, labels) = toy_batch();

    let (_, output) = rnn
        .cost_and_grad(&data, Some(labels.as_slice()), true, None)
        .unwrap();
    let grads = output.into_gradients().unwrap();

    let (trace, gradient_trace, traced_grads) = rnn.backward_trace(&data, &labels, None).unwrap();
    assert_eq!(traced_grads, grads);

    let du = gradient_trace.pre_activation_gradients();
    let dh = gradient_trace.activation_gradients();
    let (timesteps, batch) = (data.shape()[1], data.shape()[2]);
    assert_eq!(du.dim(), (hps.hidden_size, timesteps, batch, hps.hidden_layers));
    assert_eq!(dh.dim(), du.dim());

    // top layer is not recurrent, so du = tanh'(u) * dh there
    let top = hps.hidden_layers - 1;
    for t in 0..timesteps {
        let u = trace.pre_activations().slice(s![.., t, .., top]);
        let expected = Nonlinearity::Tanh.derivative(&u) * &dh.slice(s![.., t, .., top]);
        for (a, b) in du.slice(s![.., t, .., top]).iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }
    assert!(dh.iter().any(|&x| x != 0.0));
}

#[test]
fn checkpoint_round_trip() {
    let path = temp_path("rnn_checkpoint.json");
    let rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.3, 21);
    rnn.save_to_path(&path).unwrap();

    let mut other = RNN::new(small_hps(Nonlinearity::Tanh, 2), 99).unwrap();
    assert_ne!(other.params(), rnn.params());
    other.load_from_path(&path).unwrap();
    assert_eq!(other.params(), rnn.params());

    let restored = RNN::from_path(&path).unwrap();
    assert_eq!(restored.hyperparams(), rnn.hyperparams());
    assert_eq!(restored.params(), rnn.params());

    let mut wider = RNN::new(
        RnnHyperparams {
            hidden_size: 7,
            ..small_hps(Nonlinearity::Tanh, 2)
        },
        0,
    )
    .unwrap();
    let before = wider.params().clone();
    let err = wider.load_from_path(&path).unwrap_err();
    assert!(matches!(err, IoError::StateMismatch(_)));
    assert_eq!(wider.params(), &before);

    std::fs::remove_file(&path).unwrap();
}
