use super::*;

fn opt_hps() -> OptimizerHyperparams {
    OptimizerHyperparams {
        alpha: 0.05,
        mom: 0.9,
        mom_low: 0.5,
        low_mom_iters: 3,
        max_grad: None,
    }
}

#[test]
fn hyperparams_validation() {
    assert!(OptimizerHyperparams::default().validate().is_ok());

    let cases = [
        OptimizerHyperparams { alpha: 0.0, ..opt_hps() },
        OptimizerHyperparams { alpha: f64::NAN, ..opt_hps() },
        OptimizerHyperparams { mom: 1.0, ..opt_hps() },
        OptimizerHyperparams { mom_low: -0.1, ..opt_hps() },
        OptimizerHyperparams { max_grad: Some(0.0), ..opt_hps() },
    ];
    let rnn = RNN::new(small_hps(Nonlinearity::ReLU, 2), 0).unwrap();
    for hps in cases {
        let err = MomentumOptimizer::new(hps, &rnn).unwrap_err();
        assert!(matches!(err, ModelError::ConfigurationError(_)));
    }
}

#[test]
fn nan_momentum_is_rejected() {
    for hps in [
        OptimizerHyperparams { mom: f64::NAN, ..opt_hps() },
        OptimizerHyperparams { mom_low: f64::NAN, ..opt_hps() },
    ] {
        assert!(matches!(
            hps.validate(),
            Err(ModelError::ConfigurationError(_))
        ));
    }
}

#[test]
fn momentum_switches_after_warm_up() {
    let hps = OptimizerHyperparams::default();
    assert_eq!(hps.momentum_at(0), 0.5);
    assert_eq!(hps.momentum_at(hps.low_mom_iters - 1), hps.mom_low);
    assert_eq!(hps.momentum_at(hps.low_mom_iters), hps.mom);

    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 2), 0.1, 1);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();

    for _ in 0..2 {
        opt.step(&mut rnn, &data, &labels).unwrap();
    }
    assert_eq!(opt.iters(), 2);
    assert_eq!(opt.get_mom(), 0.5);
    opt.step(&mut rnn, &data, &labels).unwrap();
    assert_eq!(opt.get_mom(), 0.9);
}

#[test]
fn effective_learning_rate_scales_with_norm() {
    let hps = OptimizerHyperparams {
        alpha: 0.1,
        max_grad: Some(5.0),
        ..OptimizerHyperparams::default()
    };
    assert_relative_eq!(hps.effective_learning_rate(10.0), 0.05, epsilon = 1e-15);
    assert_eq!(hps.effective_learning_rate(5.0), 0.1);
    assert_eq!(hps.effective_learning_rate(1.0), 0.1);

    let unclipped = OptimizerHyperparams::default();
    assert_eq!(unclipped.effective_learning_rate(1e9), unclipped.alpha);
}

#[test]
fn first_step_moves_parameters_by_alpha_times_gradient() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.3, 2);
    let before = rnn.params().clone();
    let (data, labels) = toy_batch();

    let (_, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), true, None).unwrap();
    let grads = output.into_gradients().unwrap();

    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    opt.compute_update(&mut rnn, &data, &labels).unwrap();
    // nothing moves until the update is applied
    assert_eq!(rnn.params(), &before);
    assert_eq!(opt.iters(), 0);

    opt.apply_update(&mut rnn).unwrap();
    assert_eq!(opt.iters(), 1);
    for (((_, after), (_, old)), (_, g)) in rnn.params().iter().zip(before.iter()).zip(grads.iter()) {
        let expected = old - &(g * 0.05);
        for (a, e) in after.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-14);
        }
    }
}

#[test]
fn velocity_accumulates_with_momentum() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.3, 3);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();

    opt.step(&mut rnn, &data, &labels).unwrap();
    let vel_1 = opt.velocities().clone();

    let (_, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), true, None).unwrap();
    let grads_2 = output.into_gradients().unwrap();
    opt.compute_update(&mut rnn, &data, &labels).unwrap();

    for (((_, v2), (_, v1)), (_, g)) in opt.velocities().iter().zip(vel_1.iter()).zip(grads_2.iter()) {
        let expected = v1 * 0.5 + &(g * 0.05);
        for (a, e) in v2.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-14);
        }
    }
}

#[test]
fn clipping_bounds_the_step_and_records_the_norm() {
    let hps = OptimizerHyperparams {
        max_grad: Some(1e-4),
        ..opt_hps()
    };
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.3, 4);
    let (data, labels) = toy_batch();

    let (_, output) = rnn.cost_and_grad(&data, Some(labels.as_slice()), true, None).unwrap();
    let norm = output.into_gradients().unwrap().global_norm();
    assert!(norm > 1e-4);

    let mut opt = MomentumOptimizer::new(hps, &rnn).unwrap();
    opt.compute_update(&mut rnn, &data, &labels).unwrap();

    assert_relative_eq!(opt.grad_norm().unwrap(), norm, max_relative = 1e-12);
    // first velocity is rate * grad, so its norm is alpha * max_grad
    assert_relative_eq!(opt.velocities().global_norm(), 0.05 * 1e-4, max_relative = 1e-9);
}

#[test]
fn grad_norm_is_not_tracked_without_clipping() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::Tanh, 2), 0.3, 4);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();
    opt.step(&mut rnn, &data, &labels).unwrap();
    assert!(opt.grad_norm().is_none());
}

#[test]
fn cost_history_is_smoothed() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 2), 0.3, 5);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();

    for _ in 0..3 {
        opt.step(&mut rnn, &data, &labels).unwrap();
    }
    let c = opt.costs();
    let e = opt.expcosts();
    assert_eq!(c.len(), 3);
    assert_eq!(e[0], c[0]);
    assert_relative_eq!(e[1], 0.01 * c[1] + 0.99 * c[0], epsilon = 1e-15);
    assert_relative_eq!(e[2], 0.01 * c[2] + 0.99 * e[1], epsilon = 1e-15);
}

#[test]
fn state_round_trips_through_bytes() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 2), 0.3, 6);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();
    for _ in 0..2 {
        opt.step(&mut rnn, &data, &labels).unwrap();
    }

    let bytes = opt.to_bytes().unwrap();
    let mut restored = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    restored.load_bytes(&bytes).unwrap();

    assert_eq!(restored.state(), opt.state());
    assert_eq!(restored.velocities(), opt.velocities());
    assert_eq!(restored.iters(), 2);
}

#[test]
fn truncated_state_fails_and_leaves_optimizer_untouched() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 2), 0.3, 7);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();
    opt.step(&mut rnn, &data, &labels).unwrap();
    let bytes = opt.to_bytes().unwrap();

    let mut fresh = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let err = fresh.load_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(err, IoError::DecodeError(_)));
    assert_eq!(fresh.iters(), 0);
    assert!(fresh.costs().is_empty());
    assert_eq!(fresh.velocities().global_norm(), 0.0);
}

#[test]
fn state_for_another_architecture_is_rejected() {
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 2), 0.3, 8);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();
    opt.step(&mut rnn, &data, &labels).unwrap();
    let state = opt.state();

    // two layers instead of three: fewer velocities
    let shallow = RNN::new(
        RnnHyperparams {
            hidden_layers: 2,
            ..small_hps(Nonlinearity::ReLU, 2)
        },
        0,
    )
    .unwrap();
    let mut other = MomentumOptimizer::new(opt_hps(), &shallow).unwrap();
    assert!(matches!(other.restore(state.clone()), Err(IoError::StateMismatch(_))));

    // same count, different shapes
    let wide = RNN::new(
        RnnHyperparams {
            hidden_size: 7,
            ..small_hps(Nonlinearity::ReLU, 2)
        },
        0,
    )
    .unwrap();
    let mut other = MomentumOptimizer::new(opt_hps(), &wide).unwrap();
    assert!(matches!(other.restore(state), Err(IoError::StateMismatch(_))));
    assert_eq!(other.iters(), 0);
}

#[test]
fn state_file_round_trip() {
    let path = temp_path("optimizer_state.bin");
    let mut rnn = scaled_rnn(small_hps(Nonlinearity::ReLU, 2), 0.3, 9);
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    let (data, labels) = toy_batch();
    opt.step(&mut rnn, &data, &labels).unwrap();

    opt.save_state(&path).unwrap();
    let mut restored = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();
    restored.load_state(&path).unwrap();
    assert_eq!(restored.state(), opt.state());

    std::fs::remove_file(&path).unwrap();
    assert!(restored.load_state(&path).is_err());
}

#[test]
fn optimizer_rejects_a_different_model() {
    let rnn = RNN::new(small_hps(Nonlinearity::ReLU, 2), 0).unwrap();
    let mut opt = MomentumOptimizer::new(opt_hps(), &rnn).unwrap();

    let mut other = RNN::new(
        RnnHyperparams {
            hidden_size: 4,
            ..small_hps(Nonlinearity::ReLU, 2)
        },
        0,
    )
    .unwrap();
    let err = opt.apply_update(&mut other).unwrap_err();
    assert!(matches!(err, ModelError::InputValidationError(_)));
    assert_eq!(opt.iters(), 0);
}
