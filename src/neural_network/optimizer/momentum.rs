use super::*;

/// Weight of the newest cost in the smoothed cost history.
const COST_SMOOTHING: f64 = 0.01;

/// Classical momentum optimizer with gradient-norm step clipping and a
/// two-phase momentum schedule.
///
/// Each step computes `vel = mom * vel + rate * grad` and then
/// `param -= vel`. While fewer than `low_mom_iters` updates have been
/// applied, `mom_low` is used instead of `mom`. When `max_grad` is set and
/// the global gradient norm exceeds it, `rate` is scaled down; the gradients
/// themselves are left as computed.
///
/// # Fields
///
/// - `hps` - Optimizer hyperparameters
/// - `vel` - One velocity matrix per parameter, same layout as the model
/// - `iters` - Number of applied updates
/// - `costs` - Raw cost of every computed step
/// - `expcosts` - Exponentially smoothed cost of every computed step
/// - `grad_norm` - Global gradient norm of the latest step, when clipping is enabled
///
/// # Example
/// ```rust
/// use deeprnn::prelude::*;
///
/// let hps = RnnHyperparams {
///     hidden_size: 6,
///     hidden_layers: 2,
///     recurrent_layer: 2,
///     output_size: 3,
///     batch_size: 2,
///     ..RnnHyperparams::default()
/// };
/// let mut rnn = RNN::new(hps, 1).unwrap();
/// let mut opt = MomentumOptimizer::new(OptimizerHyperparams::default(), &rnn).unwrap();
///
/// let data = one_hot_lists(&[vec![0, 1, 2], vec![2, 1, 0]], 3).unwrap();
/// let labels = vec![vec![1, 2, 0], vec![1, 0, 2]];
/// let cost = opt.step(&mut rnn, &data, &labels).unwrap();
///
/// assert_eq!(opt.iters(), 1);
/// assert_eq!(opt.costs(), &[cost]);
/// ```
#[derive(Debug, Clone)]
pub struct MomentumOptimizer {
    hps: OptimizerHyperparams,
    vel: ParamSet,
    iters: u64,
    costs: Vec<f64>,
    expcosts: Vec<f64>,
    grad_norm: Option<f64>,
}

impl MomentumOptimizer {
    /// Creates an optimizer with zero velocities shaped like `model`'s parameters
    ///
    /// # Parameters
    ///
    /// - `hps` - Optimizer hyperparameters
    /// - `model` - The model that will be trained
    ///
    /// # Returns
    ///
    /// - `Ok(MomentumOptimizer)` - A fresh optimizer at iteration 0
    /// - `Err(ModelError::ConfigurationError)` - If `hps` is invalid
    pub fn new(hps: OptimizerHyperparams, model: &dyn Model) -> Result<Self, ModelError> {
        hps.validate()?;
        Ok(MomentumOptimizer {
            hps,
            vel: model.params().zeros_like(),
            iters: 0,
            costs: Vec::new(),
            expcosts: Vec::new(),
            grad_norm: None,
        })
    }

    /// Momentum for the next update
    pub fn get_mom(&self) -> f64 {
        self.hps.momentum_at(self.iters)
    }

    /// Optimizer hyperparameters
    pub fn hyperparams(&self) -> &OptimizerHyperparams {
        &self.hps
    }

    /// Number of applied updates
    pub fn iters(&self) -> u64 {
        self.iters
    }

    /// Raw cost history
    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    /// Smoothed cost history
    pub fn expcosts(&self) -> &[f64] {
        &self.expcosts
    }

    /// Global gradient norm of the latest step; only tracked when `max_grad` is set
    pub fn grad_norm(&self) -> Option<f64> {
        self.grad_norm
    }

    /// Current velocities
    pub fn velocities(&self) -> &ParamSet {
        &self.vel
    }

    /// Returns the learning rate for `grads`, recording their norm when clipping is enabled
    fn clip_grads(&mut self, grads: &ParamSet) -> f64 {
        let Some(max_grad) = self.hps.max_grad else {
            return self.hps.alpha;
        };
        let norm = grads.global_norm();
        self.grad_norm = Some(norm);
        let rate = self.hps.effective_learning_rate(norm);
        if norm > max_grad {
            warn!(
                "gradient norm {:.4} exceeds max_grad {}, scaling learning rate to {:.3e}",
                norm, max_grad, rate
            );
        }
        rate
    }

    /// Appends `cost` to the raw history and its smoothed value to `expcosts`
    fn update_costs(&mut self, cost: f64) {
        let smoothed = match self.expcosts.last() {
            Some(&previous) => COST_SMOOTHING * cost + (1.0 - COST_SMOOTHING) * previous,
            None => cost,
        };
        self.costs.push(cost);
        self.expcosts.push(smoothed);
    }

    /// Captures the current state for persistence
    pub fn state(&self) -> OptimizerState {
        OptimizerState {
            iters: self.iters,
            costs: self.costs.clone(),
            expcosts: self.expcosts.clone(),
            velocities: self
                .vel
                .iter()
                .map(|(_, v)| SerializableMatrix::from_array(v))
                .collect(),
        }
    }

    /// Replaces the current state with `state`
    ///
    /// Velocities are matched to parameters by position. Nothing changes
    /// unless every velocity fits.
    ///
    /// # Parameters
    ///
    /// * `state` - A state captured by [`MomentumOptimizer::state`]
    ///
    /// # Returns
    ///
    /// - `Ok(())` - State restored
    /// - `Err(IoError::StateMismatch)` - On a velocity count or shape mismatch
    pub fn restore(&mut self, state: OptimizerState) -> Result<(), IoError> {
        let expected = self.vel.num_slots();
        if state.velocities.len() != expected {
            return Err(IoError::StateMismatch(format!(
                "state holds {} velocities, model has {} parameters",
                state.velocities.len(),
                expected
            )));
        }

        let mut decoded = Vec::with_capacity(expected);
        for ((id, current), stored) in self.vel.iter().zip(state.velocities.iter()) {
            let matrix = stored.to_array()?;
            if matrix.dim() != current.dim() {
                return Err(IoError::StateMismatch(format!(
                    "velocity for {} has shape {:?}, expected {:?}",
                    id,
                    matrix.dim(),
                    current.dim()
                )));
            }
            decoded.push(matrix);
        }

        for ((_, slot), matrix) in self.vel.iter_mut().zip(decoded) {
            *slot = matrix;
        }
        self.iters = state.iters;
        self.costs = state.costs;
        self.expcosts = state.expcosts;
        Ok(())
    }

    /// Encodes the current state with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>, IoError> {
        self.state().to_bytes()
    }

    /// Restores state from bytes written by [`MomentumOptimizer::to_bytes`]
    ///
    /// # Returns
    ///
    /// - `Ok(())` - State restored
    /// - `Err(IoError::DecodeError)` - If the bytes are malformed or truncated
    /// - `Err(IoError::StateMismatch)` - If the velocities do not fit the model
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        let state = OptimizerState::from_bytes(bytes)?;
        self.restore(state)
    }

    /// Writes the current state to `path` atomically
    ///
    /// # Parameters
    ///
    /// * `path` - Destination path (e.g. "optimizer.bin")
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Saved
    /// - `Err(IoError)` - If encoding or writing failed
    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        self.state().save(path)
    }

    /// Restores state from a file written by [`MomentumOptimizer::save_state`]
    ///
    /// # Parameters
    ///
    /// * `path` - Path of the state file
    ///
    /// # Returns
    ///
    /// - `Ok(())` - State restored
    /// - `Err(IoError)` - If reading or decoding failed, or the state does not fit; the optimizer is unchanged
    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> Result<(), IoError> {
        let state = OptimizerState::load(path)?;
        self.restore(state)
    }
}

impl Optimizer for MomentumOptimizer {
    fn compute_update(
        &mut self,
        model: &mut dyn Model,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
    ) -> Result<f64, ModelError> {
        validate_same_layout(&self.vel, model.params())?;
        let mom = self.get_mom();

        let (cost, output) = model.cost_and_grad(data, Some(labels), true, None)?;
        let cost = cost.ok_or_else(|| {
            ModelError::ProcessingError("model returned no cost for a labeled batch".to_string())
        })?;
        let grads = output.into_gradients().ok_or_else(|| {
            ModelError::ProcessingError("model returned no gradients".to_string())
        })?;

        let rate = self.clip_grads(&grads);
        self.update_costs(cost);
        debug!(
            "iter {}: cost {:.6}, smoothed {:.6}, momentum {}, rate {:.3e}",
            self.iters,
            cost,
            self.expcosts.last().copied().unwrap_or(cost),
            mom,
            rate
        );

        self.vel.zip_mut_with(&grads, |_, v, g| {
            Zip::from(v)
                .and(g)
                .par_for_each(|v, &g| *v = mom * *v + rate * g);
        });
        Ok(cost)
    }

    fn apply_update(&mut self, model: &mut dyn Model) -> Result<(), ModelError> {
        validate_same_layout(&self.vel, model.params())?;
        model.params_mut().zip_mut_with(&self.vel, |_, p, v| {
            *p -= v;
        });
        self.iters += 1;
        Ok(())
    }
}
