use super::*;

/// Forward activations of one call, indexed (unit, timestep, batch, layer).
///
/// Built from the network's buffer pool for a single `cost_and_grad` call and
/// handed back to the pool when that call finishes. The matching gradient
/// tensors are in [`GradientTrace`], returned by [`RNN::backward_trace`].
///
/// # Fields
///
/// - `u` - Pre-activations, after clipping at the recurrent layer
/// - `h` - Post-nonlinearity activations
/// - `probs` - Softmax outputs (class, timestep, batch)
/// - `h_init` - Hidden state the recurrent layer started from (unit, batch, layer)
#[derive(Debug)]
pub struct ActivationTrace {
    pub(super) u: Array4<f64>,
    pub(super) h: Array4<f64>,
    pub(super) probs: Array3<f64>,
    pub(super) h_init: Array3<f64>,
}

impl ActivationTrace {
    /// Pre-activations `u`
    pub fn pre_activations(&self) -> &Array4<f64> {
        &self.u
    }

    /// Activations `h`
    pub fn activations(&self) -> &Array4<f64> {
        &self.h
    }

    /// Output probabilities
    pub fn probabilities(&self) -> &Array3<f64> {
        &self.probs
    }

    /// Hidden state the pass started from
    pub fn initial_hidden_state(&self) -> &Array3<f64> {
        &self.h_init
    }

    /// Number of timesteps T
    pub fn timesteps(&self) -> usize {
        self.u.shape()[1]
    }

    /// Number of sequences in the batch
    pub fn batch_size(&self) -> usize {
        self.u.shape()[2]
    }

    /// Activations of every layer at the final timestep, shape (unit, batch, layer)
    pub fn last_hidden_state(&self) -> Array3<f64> {
        self.h.index_axis(Axis(1), self.timesteps() - 1).to_owned()
    }

    /// Returns every buffer to the pool
    pub(super) fn release(self, pool: &mut BufferPool) {
        pool.release(self.u);
        pool.release(self.h);
        pool.release(self.probs);
        pool.release(self.h_init);
    }

    /// Returns the activation buffers to the pool and keeps the probabilities
    pub(super) fn into_probabilities(self, pool: &mut BufferPool) -> Array3<f64> {
        pool.release(self.u);
        pool.release(self.h);
        pool.release(self.h_init);
        self.probs
    }
}

/// Backward gradients of one call, indexed (unit, timestep, batch, layer) like [`ActivationTrace`].
///
/// # Fields
///
/// - `du` - Cost gradient with respect to the pre-activations `u`
/// - `dh` - Cost gradient with respect to the activations `h`
#[derive(Debug)]
pub struct GradientTrace {
    pub(super) du: Array4<f64>,
    pub(super) dh: Array4<f64>,
}

impl GradientTrace {
    /// Pre-activation gradients `du`
    pub fn pre_activation_gradients(&self) -> &Array4<f64> {
        &self.du
    }

    /// Activation gradients `dh`
    pub fn activation_gradients(&self) -> &Array4<f64> {
        &self.dh
    }

    /// Returns both buffers to the pool
    pub(super) fn release(self, pool: &mut BufferPool) {
        pool.release(self.du);
        pool.release(self.dh);
    }
}
