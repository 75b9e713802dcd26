use crate::error::ModelError;
use crate::neural_network::param_set::ParamSet;
use ndarray::Array3;

/// What a cost evaluation hands back besides the cost itself.
///
/// # Variants
///
/// - `Probabilities` - Softmax outputs of shape (output_size, T, batch); returned for inference and evaluation
/// - `Gradients` - Gradient of the cost for every parameter, same layout as the parameters
#[derive(Debug, Clone)]
pub enum CostOutput {
    Probabilities(Array3<f64>),
    Gradients(ParamSet),
}

impl CostOutput {
    /// Returns the probabilities, or `None` if this holds gradients
    pub fn probabilities(&self) -> Option<&Array3<f64>> {
        match self {
            CostOutput::Probabilities(p) => Some(p),
            CostOutput::Gradients(_) => None,
        }
    }

    /// Consumes the output and returns the gradients, or `None` if this holds probabilities
    pub fn into_gradients(self) -> Option<ParamSet> {
        match self {
            CostOutput::Gradients(g) => Some(g),
            CostOutput::Probabilities(_) => None,
        }
    }
}

/// Defines the interface a trainable sequence model exposes to optimizers and checkers.
pub trait Model {
    /// Runs the network over a batch and optionally differentiates the cost.
    ///
    /// # Parameters
    ///
    /// - `data` - One-hot input of shape (output_size, T, batch)
    /// - `labels` - Per batch element, the class index at each labeled timestep; `None` for pure inference
    /// - `compute_gradients` - Whether to run the backward pass
    /// - `initial_hidden_state` - Carry-over hidden state of shape (hidden_size, batch, hidden_layers)
    ///
    /// # Returns
    ///
    /// - `Ok((None, CostOutput::Probabilities))` - When `labels` is `None`
    /// - `Ok((Some(cost), CostOutput::Probabilities))` - When gradients were not requested
    /// - `Ok((Some(cost), CostOutput::Gradients))` - Otherwise
    /// - `Err(ModelError::InputValidationError)` - If the inputs do not fit the architecture
    fn cost_and_grad(
        &mut self,
        data: &Array3<f64>,
        labels: Option<&[Vec<usize>]>,
        compute_gradients: bool,
        initial_hidden_state: Option<&Array3<f64>>,
    ) -> Result<(Option<f64>, CostOutput), ModelError>;

    /// Returns the parameter store
    fn params(&self) -> &ParamSet;

    /// Returns the parameter store for in-place updates
    fn params_mut(&mut self) -> &mut ParamSet;
}

/// Defines the interface for optimization algorithms.
///
/// An optimizer splits a training step in two: `compute_update` evaluates the
/// model and refreshes the optimizer's own state, `apply_update` moves the
/// parameters.
pub trait Optimizer {
    /// Evaluates cost and gradients on a batch and updates the optimizer state.
    ///
    /// # Parameters
    ///
    /// - `model` - The model to evaluate; its parameters are not modified
    /// - `data` - One-hot input of shape (output_size, T, batch)
    /// - `labels` - Per batch element class indices
    ///
    /// # Returns
    ///
    /// - `Ok(f64)` - The batch cost
    /// - `Err(ModelError)` - If the model rejected the batch
    fn compute_update(
        &mut self,
        model: &mut dyn Model,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
    ) -> Result<f64, ModelError>;

    /// Applies the pending update to the model's parameters.
    ///
    /// # Parameters
    ///
    /// * `model` - The model whose parameters move
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Parameters updated
    /// - `Err(ModelError::InputValidationError)` - If the model's shapes do not match the optimizer state
    fn apply_update(&mut self, model: &mut dyn Model) -> Result<(), ModelError>;

    /// Runs `compute_update` followed by `apply_update`
    fn step(
        &mut self,
        model: &mut dyn Model,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
    ) -> Result<f64, ModelError> {
        let cost = self.compute_update(model, data, labels)?;
        self.apply_update(model)?;
        Ok(cost)
    }
}
