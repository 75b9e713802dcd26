use crate::error::{IoError, ModelError, write_atomically};
use crate::neural_network::activation::{Nonlinearity, softmax_columns};
use crate::neural_network::buffer_pool::BufferPool;
use crate::neural_network::neural_network_trait::{CostOutput, Model};
use crate::neural_network::param_set::ParamSet;
use log::info;
use ndarray::{Array2, Array3, Array4, ArrayView2, Axis, Zip, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Forward activation trace of a single pass
pub mod activation_trace;
/// Architecture hyperparameters
pub mod hyperparams;
/// Input validation functions for the RNN engine
mod input_validation_function;
/// JSON checkpoint format for network parameters
pub mod serialize_params;

pub use activation_trace::{ActivationTrace, GradientTrace};
pub use hyperparams::RnnHyperparams;
pub use serialize_params::{SerializableParam, SerializableRnn};

use input_validation_function::{validate_data, validate_initial_state, validate_labels};

/// Half-width of the uniform range fresh weights are drawn from.
pub const INIT_EPS: f64 = 0.01;

/// A deep recurrent network with one designated recurrent layer.
///
/// Hidden layers are stacked; layer 0 reads the one-hot input, every other
/// layer reads the layer below it at the same timestep, and only the
/// recurrent layer also reads its own activation from the previous timestep.
/// The top layer feeds a softmax over `output_size` classes.
///
/// Gradients are computed by hand with backpropagation through time; see
/// [`RNN::cost_and_grad`].
///
/// # Dimensions
///
/// - Input: (output_size, T, batch), one-hot per timestep
/// - Output probabilities: (output_size, T, batch)
/// - Hidden-state carry: (hidden_size, batch, hidden_layers)
///
/// # Fields
///
/// - `hps` - Architecture hyperparameters
/// - `params` - Parameter store
/// - `last_h` - Final-timestep activations of the last forward pass, for resuming
/// - `pool` - Buffer pool backing the activation trace
///
/// # Example
/// ```rust
/// use deeprnn::prelude::*;
///
/// let hps = RnnHyperparams {
///     hidden_size: 8,
///     hidden_layers: 2,
///     recurrent_layer: 1,
///     output_size: 4,
///     batch_size: 2,
///     ..RnnHyperparams::default()
/// };
/// let mut rnn = RNN::new(hps, 7).unwrap();
///
/// let data = one_hot_lists(&[vec![0, 1, 2], vec![3, 2, 1]], 4).unwrap();
/// let labels = vec![vec![1, 2, 3], vec![2, 1]];
/// let (cost, _probs) = rnn.cost_and_grad(&data, Some(labels.as_slice()), false, None).unwrap();
/// assert!(cost.unwrap() > 0.0);
/// ```
#[derive(Debug)]
pub struct RNN {
    hps: RnnHyperparams,
    params: ParamSet,
    last_h: Option<Array3<f64>>,
    pool: BufferPool,
}

impl RNN {
    /// Creates a network with freshly initialised parameters
    ///
    /// # Parameters
    ///
    /// - `hps` - Architecture hyperparameters
    /// - `seed` - Seed for weight initialisation
    ///
    /// # Returns
    ///
    /// - `Ok(RNN)` - The new network
    /// - `Err(ModelError::ConfigurationError)` - If `hps` is invalid
    pub fn new(hps: RnnHyperparams, seed: u64) -> Result<Self, ModelError> {
        hps.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let params = ParamSet::random(
            hps.hidden_size,
            hps.hidden_layers,
            hps.output_size,
            INIT_EPS,
            &mut rng,
        )?;
        Ok(Self::assemble(hps, params))
    }

    /// Creates a network around existing parameters
    ///
    /// # Parameters
    ///
    /// - `hps` - Architecture hyperparameters
    /// - `params` - Parameters whose shapes must match `hps`
    ///
    /// # Returns
    ///
    /// - `Ok(RNN)` - The new network
    /// - `Err(ModelError::ConfigurationError)` - If `hps` is invalid or shapes disagree
    pub fn with_params(hps: RnnHyperparams, params: ParamSet) -> Result<Self, ModelError> {
        hps.validate()?;
        let expected = ParamSet::zeros(hps.hidden_size, hps.hidden_layers, hps.output_size);
        if expected.inter.len() != params.inter.len() {
            return Err(ModelError::ConfigurationError(format!(
                "parameters have {} inter-layer slots, architecture needs {}",
                params.inter.len(),
                expected.inter.len()
            )));
        }
        for ((id, e), (_, p)) in expected.iter().zip(params.iter()) {
            if e.dim() != p.dim() {
                return Err(ModelError::ConfigurationError(format!(
                    "parameter {} has shape {:?}, architecture needs {:?}",
                    id,
                    p.dim(),
                    e.dim()
                )));
            }
        }
        Ok(Self::assemble(hps, params))
    }

    fn assemble(hps: RnnHyperparams, params: ParamSet) -> Self {
        info!(
            "RNN: {} hidden layers of {} units, recurrent layer {}, {} outputs, {} nonlinearity, {} parameters",
            hps.hidden_layers,
            hps.hidden_size,
            hps.recurrent_layer,
            hps.output_size,
            hps.nl,
            params.num_elements()
        );
        RNN {
            hps,
            params,
            last_h: None,
            pool: BufferPool::new(),
        }
    }

    /// Architecture hyperparameters
    pub fn hyperparams(&self) -> &RnnHyperparams {
        &self.hps
    }

    /// Final-timestep activations of every layer from the most recent forward pass
    ///
    /// Pass this back as `initial_hidden_state` to continue the same sequences.
    pub fn last_hidden_state(&self) -> Option<&Array3<f64>> {
        self.last_h.as_ref()
    }

    /// Total number of scalar parameters
    pub fn count_params(&self) -> usize {
        self.params.num_elements()
    }

    /// Drops the buffers retained for activation traces
    pub fn reset_buffers(&mut self) {
        self.pool.reset();
    }

    /// The buffer pool backing activation traces
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Runs the forward pass only and returns the full trace
    ///
    /// Records the hidden-state carry like every forward pass.
    ///
    /// # Parameters
    ///
    /// - `data` - One-hot input of shape (output_size, T, batch)
    /// - `initial_hidden_state` - Optional carry-over state (hidden_size, batch, hidden_layers)
    ///
    /// # Returns
    ///
    /// - `Ok(ActivationTrace)` - Activations of every layer at every timestep
    /// - `Err(ModelError::InputValidationError)` - If the inputs do not fit the architecture
    pub fn forward_trace(
        &mut self,
        data: &Array3<f64>,
        initial_hidden_state: Option<&Array3<f64>>,
    ) -> Result<ActivationTrace, ModelError> {
        let (_, batch) = validate_data(data, self.hps.output_size)?;
        if let Some(state) = initial_hidden_state {
            validate_initial_state(state, self.hps.hidden_size, batch, self.hps.hidden_layers)?;
        }
        let trace = self.forward(data, initial_hidden_state)?;
        self.last_h = Some(trace.last_hidden_state());
        Ok(trace)
    }

    /// Runs the network over a batch and optionally differentiates the cost
    ///
    /// The cost is the negative log-probability of every labeled position,
    /// summed and divided by the batch size and by T. Positions past the end
    /// of a label sequence are ignored by both the cost and the gradient.
    ///
    /// Gradients are those of the time-summed cost: they are divided by the
    /// batch size but not by T.
    ///
    /// # Parameters
    ///
    /// - `data` - One-hot input of shape (output_size, T, batch)
    /// - `labels` - Per batch element, the class at each labeled timestep; `None` for inference
    /// - `compute_gradients` - Whether to run the backward pass
    /// - `initial_hidden_state` - Optional carry-over state (hidden_size, batch, hidden_layers)
    ///
    /// # Returns
    ///
    /// - `Ok((None, CostOutput::Probabilities))` - Inference, when `labels` is `None`
    /// - `Ok((Some(cost), CostOutput::Probabilities))` - When `compute_gradients` is false
    /// - `Ok((Some(cost), CostOutput::Gradients))` - Otherwise
    /// - `Err(ModelError::InputValidationError)` - If the inputs do not fit the architecture
    pub fn cost_and_grad(
        &mut self,
        data: &Array3<f64>,
        labels: Option<&[Vec<usize>]>,
        compute_gradients: bool,
        initial_hidden_state: Option<&Array3<f64>>,
    ) -> Result<(Option<f64>, CostOutput), ModelError> {
        let (timesteps, batch) = validate_data(data, self.hps.output_size)?;
        if let Some(labels) = labels {
            validate_labels(labels, timesteps, batch, self.hps.output_size)?;
        }
        if let Some(state) = initial_hidden_state {
            validate_initial_state(state, self.hps.hidden_size, batch, self.hps.hidden_layers)?;
        }

        let trace = self.forward(data, initial_hidden_state)?;
        self.last_h = Some(trace.last_hidden_state());

        let Some(labels) = labels else {
            let probs = trace.into_probabilities(&mut self.pool);
            return Ok((None, CostOutput::Probabilities(probs)));
        };

        let cost = sequence_cost(&trace.probs, labels);
        if !compute_gradients {
            let probs = trace.into_probabilities(&mut self.pool);
            return Ok((Some(cost), CostOutput::Probabilities(probs)));
        }

        let backward = self.backward(data, labels, &trace);
        trace.release(&mut self.pool);
        let (grads, gradient_trace) = backward?;
        gradient_trace.release(&mut self.pool);
        Ok((Some(cost), CostOutput::Gradients(grads)))
    }

    /// Runs the forward and backward pass and returns both traces with the gradients
    ///
    /// Unlike [`RNN::cost_and_grad`] nothing is handed back to the buffer pool,
    /// so the pre-activation and activation gradients can be inspected.
    ///
    /// # Parameters
    ///
    /// - `data` - One-hot input of shape (output_size, T, batch)
    /// - `labels` - Per batch element, the class at each labeled timestep
    /// - `initial_hidden_state` - Optional carry-over state (hidden_size, batch, hidden_layers)
    ///
    /// # Returns
    ///
    /// - `Ok((ActivationTrace, GradientTrace, ParamSet))` - Forward trace, backward trace and gradients
    /// - `Err(ModelError::InputValidationError)` - If the inputs do not fit the architecture
    pub fn backward_trace(
        &mut self,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
        initial_hidden_state: Option<&Array3<f64>>,
    ) -> Result<(ActivationTrace, GradientTrace, ParamSet), ModelError> {
        let (timesteps, batch) = validate_data(data, self.hps.output_size)?;
        validate_labels(labels, timesteps, batch, self.hps.output_size)?;
        if let Some(state) = initial_hidden_state {
            validate_initial_state(state, self.hps.hidden_size, batch, self.hps.hidden_layers)?;
        }

        let trace = self.forward(data, initial_hidden_state)?;
        self.last_h = Some(trace.last_hidden_state());
        let (grads, gradient_trace) = self.backward(data, labels, &trace)?;
        Ok((trace, gradient_trace, grads))
    }

    fn forward(
        &mut self,
        data: &Array3<f64>,
        initial_hidden_state: Option<&Array3<f64>>,
    ) -> Result<ActivationTrace, ModelError> {
        let hidden = self.hps.hidden_size;
        let layers = self.hps.hidden_layers;
        let rec = self.hps.recurrent_index();
        let max_act = self.hps.max_act;
        let nl = self.hps.nl;
        let (output_size, timesteps, batch) = data.dim();

        let params = &self.params;
        let pool = &mut self.pool;

        let mut h_init: Array3<f64> = pool.zeroed((hidden, batch, layers))?;
        match initial_hidden_state {
            Some(state) => h_init.assign(state),
            None => {
                for k in 0..layers {
                    let column = params.h0.column(k).insert_axis(Axis(1));
                    h_init.index_axis_mut(Axis(2), k).assign(&column);
                }
            }
        }

        let mut u: Array4<f64> = pool.zeroed((hidden, timesteps, batch, layers))?;
        let mut h: Array4<f64> = pool.zeroed((hidden, timesteps, batch, layers))?;
        let mut probs: Array3<f64> = pool.zeroed((output_size, timesteps, batch))?;

        for t in 0..timesteps {
            let x_t = data.index_axis(Axis(1), t);

            for k in 0..layers {
                let mut pre = if k == 0 {
                    let mut z = params.wih.dot(&x_t);
                    z += &params.bih;
                    z
                } else {
                    params.inter[k - 1].weight.dot(&h.slice(s![.., t, .., k - 1]))
                };

                if k == rec {
                    let h_prev = if t == 0 {
                        h_init.index_axis(Axis(2), k)
                    } else {
                        h.slice(s![.., t - 1, .., k])
                    };
                    pre += &params.whh.dot(&h_prev);
                    pre += &params.bhh;
                    clip_activation(&mut pre, max_act);
                } else if k != 0 {
                    pre += &params.inter[k - 1].bias;
                }

                let act = nl.apply(&pre.view());
                u.slice_mut(s![.., t, .., k]).assign(&pre);
                h.slice_mut(s![.., t, .., k]).assign(&act);
            }

            let mut logits = params.who.dot(&h.slice(s![.., t, .., layers - 1]));
            logits += &params.bho;
            probs
                .index_axis_mut(Axis(1), t)
                .assign(&softmax_columns(&logits));
        }

        Ok(ActivationTrace {
            u,
            h,
            probs,
            h_init,
        })
    }

    fn backward(
        &mut self,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
        trace: &ActivationTrace,
    ) -> Result<(ParamSet, GradientTrace), ModelError> {
        let hidden = self.hps.hidden_size;
        let layers = self.hps.hidden_layers;
        let rec = self.hps.recurrent_index();
        let max_act = self.hps.max_act;
        let nl = self.hps.nl;
        let timesteps = trace.timesteps();
        let batch = trace.batch_size();
        let scale = 1.0 / batch as f64;

        let params = &self.params;
        let pool = &mut self.pool;

        let dprobs = output_gradient(pool, &trace.probs, labels)?;
        let mut du: Array4<f64> = pool.zeroed((hidden, timesteps, batch, layers))?;
        let mut dh: Array4<f64> = pool.zeroed((hidden, timesteps, batch, layers))?;
        let mut grads = params.zeros_like();

        for t in (0..timesteps).rev() {
            let dp_t = dprobs.index_axis(Axis(1), t);
            let h_top = trace.h.slice(s![.., t, .., layers - 1]);
            grads.bho.scaled_add(scale, &sum_over_batch(&dp_t));
            grads.who.scaled_add(scale, &dp_t.dot(&h_top.t()));

            for k in (0..layers).rev() {
                let from_above = if k == layers - 1 {
                    params.who.t().dot(&dp_t)
                } else {
                    params.inter[k]
                        .weight
                        .t()
                        .dot(&du.slice(s![.., t, .., k + 1]))
                };
                {
                    let mut dh_tk = dh.slice_mut(s![.., t, .., k]);
                    dh_tk += &from_above;
                }

                let u_tk = trace.u.slice(s![.., t, .., k]);
                let mut du_tk = nl.derivative(&u_tk) * &dh.slice(s![.., t, .., k]);
                if k == rec {
                    // clipped entries are flat in u
                    Zip::from(&mut du_tk).and(&u_tk).for_each(|d, &x| {
                        if x >= max_act {
                            *d = 0.0;
                        }
                    });
                }
                du.slice_mut(s![.., t, .., k]).assign(&du_tk);

                if k > 0 {
                    let h_below = trace.h.slice(s![.., t, .., k - 1]);
                    let slot = &mut grads.inter[k - 1];
                    slot.weight.scaled_add(scale, &du_tk.dot(&h_below.t()));
                    if k != rec {
                        slot.bias.scaled_add(scale, &sum_over_batch(&du_tk.view()));
                    }
                }

                if k == rec {
                    let h_prev = if t == 0 {
                        trace.h_init.index_axis(Axis(2), k)
                    } else {
                        trace.h.slice(s![.., t - 1, .., k])
                    };
                    grads.whh.scaled_add(scale, &du_tk.dot(&h_prev.t()));
                    grads.bhh.scaled_add(scale, &sum_over_batch(&du_tk.view()));

                    let carried = params.whh.t().dot(&du_tk);
                    if t == 0 {
                        grads
                            .h0
                            .column_mut(k)
                            .scaled_add(scale, &carried.sum_axis(Axis(1)));
                    } else {
                        let mut dh_prev = dh.slice_mut(s![.., t - 1, .., k]);
                        dh_prev += &carried;
                    }
                }

                if k == 0 {
                    let x_t = data.index_axis(Axis(1), t);
                    grads.wih.scaled_add(scale, &du_tk.dot(&x_t.t()));
                    grads.bih.scaled_add(scale, &sum_over_batch(&du_tk.view()));
                }
            }
        }

        pool.release(dprobs);
        Ok((grads, GradientTrace { du, dh }))
    }

    /// Saves hyperparameters and parameters to a JSON file
    ///
    /// The file is replaced atomically.
    ///
    /// # Parameters
    ///
    /// * `path` - Destination path (e.g. "rnn.json")
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Saved
    /// - `Err(IoError::JsonError)` - Serialization failed
    /// - `Err(IoError::StdIoError)` - Writing failed
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        let serializable = SerializableRnn::from_rnn(self);
        let bytes = serde_json::to_vec_pretty(&serializable).map_err(IoError::JsonError)?;
        write_atomically(path.as_ref(), &bytes)
    }

    /// Loads parameters from a JSON file into this network
    ///
    /// The file's architecture (everything except `batch_size`) must equal
    /// this network's; parameters are replaced only when every check passes.
    ///
    /// # Parameters
    ///
    /// * `path` - Path written by [`RNN::save_to_path`]
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Parameters replaced
    /// - `Err(IoError::StateMismatch)` - Architecture, names or shapes do not match
    /// - `Err(IoError::JsonError)` / `Err(IoError::StdIoError)` - Reading failed
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), IoError> {
        let params = self.read_checkpoint(path)?;
        self.params = params;
        Ok(())
    }

    /// Reads and checks a checkpoint without touching this network
    ///
    /// # Returns
    ///
    /// - `Ok(ParamSet)` - The stored parameters, ready to install with [`RNN::replace_params`]
    /// - `Err(IoError)` - Reading failed, or the checkpoint belongs to another architecture
    pub fn read_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<ParamSet, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        let stored: SerializableRnn = serde_json::from_reader(reader).map_err(IoError::JsonError)?;
        stored.check_architecture(&self.hps)?;
        let mut params = self.params.clone();
        stored.apply_to_params(&mut params)?;
        Ok(params)
    }

    /// Installs parameters returned by [`RNN::read_checkpoint`]
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Parameters replaced
    /// - `Err(ModelError::ConfigurationError)` - If a shape does not fit the architecture
    pub fn replace_params(&mut self, params: ParamSet) -> Result<(), ModelError> {
        if params.num_slots() != self.params.num_slots() {
            return Err(ModelError::ConfigurationError(format!(
                "parameters have {} slots, architecture needs {}",
                params.num_slots(),
                self.params.num_slots()
            )));
        }
        for ((id, new), (_, old)) in params.iter().zip(self.params.iter()) {
            if new.dim() != old.dim() {
                return Err(ModelError::ConfigurationError(format!(
                    "parameter {} has shape {:?}, architecture needs {:?}",
                    id,
                    new.dim(),
                    old.dim()
                )));
            }
        }
        self.params = params;
        Ok(())
    }

    /// Builds a network entirely from a JSON checkpoint
    ///
    /// # Parameters
    ///
    /// * `path` - Path written by [`RNN::save_to_path`]
    ///
    /// # Returns
    ///
    /// - `Ok(RNN)` - The restored network
    /// - `Err(IoError)` - Reading failed, the stored hyperparameters are invalid, or the parameters do not fit them
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        let stored: SerializableRnn = serde_json::from_reader(reader).map_err(IoError::JsonError)?;
        stored
            .hyperparams
            .validate()
            .map_err(|e| IoError::StateMismatch(e.to_string()))?;
        let hps = stored.hyperparams.clone();
        let mut params = ParamSet::zeros(hps.hidden_size, hps.hidden_layers, hps.output_size);
        stored.apply_to_params(&mut params)?;
        Ok(Self::assemble(hps, params))
    }
}

impl Model for RNN {
    fn cost_and_grad(
        &mut self,
        data: &Array3<f64>,
        labels: Option<&[Vec<usize>]>,
        compute_gradients: bool,
        initial_hidden_state: Option<&Array3<f64>>,
    ) -> Result<(Option<f64>, CostOutput), ModelError> {
        RNN::cost_and_grad(self, data, labels, compute_gradients, initial_hidden_state)
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }
}

/// Hard-clips every entry above `max_act` down to `max_act`
///
/// Entries below the threshold are left untouched, so clipping twice is the
/// same as clipping once.
///
/// # Parameters
///
/// - `pre` - Pre-activation matrix, modified in place
/// - `max_act` - Clip threshold
pub fn clip_activation(pre: &mut Array2<f64>, max_act: f64) {
    pre.mapv_inplace(|x| if x < max_act { x } else { max_act });
}

/// Negative log-likelihood of the labeled positions, divided by batch size and by T
fn sequence_cost(probs: &Array3<f64>, labels: &[Vec<usize>]) -> f64 {
    let (_, timesteps, batch) = probs.dim();
    let total: f64 = labels
        .iter()
        .enumerate()
        .map(|(b, seq)| {
            seq.iter()
                .enumerate()
                .map(|(t, &class)| -probs[[class, t, b]].max(f64::MIN_POSITIVE).ln())
                .sum::<f64>()
        })
        .sum();
    total / batch as f64 / timesteps as f64
}

/// Softmax cross-entropy gradient at the logits: `probs - onehot(label)` on
/// labeled positions, zero elsewhere
fn output_gradient(
    pool: &mut BufferPool,
    probs: &Array3<f64>,
    labels: &[Vec<usize>],
) -> Result<Array3<f64>, ModelError> {
    let mut dprobs: Array3<f64> = pool.zeroed(probs.raw_dim())?;
    for (b, seq) in labels.iter().enumerate() {
        for (t, &class) in seq.iter().enumerate() {
            dprobs
                .slice_mut(s![.., t, b])
                .assign(&probs.slice(s![.., t, b]));
            dprobs[[class, t, b]] -= 1.0;
        }
    }
    Ok(dprobs)
}

fn sum_over_batch(m: &ArrayView2<f64>) -> Array2<f64> {
    m.sum_axis(Axis(1)).insert_axis(Axis(1))
}
