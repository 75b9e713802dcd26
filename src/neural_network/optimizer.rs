use crate::error::{IoError, ModelError, write_atomically};
use crate::neural_network::neural_network_trait::{Model, Optimizer};
use crate::neural_network::param_set::ParamSet;
use log::{debug, warn};
use ndarray::{Array2, Array3, Zip};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Input validation functions for optimizer hyperparameters and state
mod input_validation_function;
/// Classical momentum optimizer
pub mod momentum;
/// Binary persisted optimizer state
pub mod optimizer_state;

pub use momentum::MomentumOptimizer;
pub use optimizer_state::{OptimizerState, SerializableMatrix};

use input_validation_function::{
    validate_learning_rate, validate_max_grad, validate_momentum, validate_same_layout,
};

/// Hyperparameters of the momentum optimizer.
///
/// # Fields
///
/// - `alpha` - Base learning rate
/// - `mom` - Momentum used once warm-up is over
/// - `mom_low` - Momentum used during warm-up
/// - `low_mom_iters` - Number of warm-up iterations that use `mom_low`
/// - `max_grad` - Global gradient norm above which the step is scaled down; `None` disables clipping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerHyperparams {
    pub alpha: f64,
    pub mom: f64,
    pub mom_low: f64,
    pub low_mom_iters: u64,
    pub max_grad: Option<f64>,
}

impl Default for OptimizerHyperparams {
    fn default() -> Self {
        Self {
            alpha: 1e-3,
            mom: 0.95,
            mom_low: 0.5,
            low_mom_iters: 100,
            max_grad: None,
        }
    }
}

impl OptimizerHyperparams {
    /// Checks every field against its allowed range
    ///
    /// # Returns
    ///
    /// - `Ok(())` - All hyperparameters are usable
    /// - `Err(ModelError::ConfigurationError)` - The first offending field
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_learning_rate(self.alpha)?;
        validate_momentum(self.mom, "mom")?;
        validate_momentum(self.mom_low, "mom_low")?;
        if let Some(max_grad) = self.max_grad {
            validate_max_grad(max_grad)?;
        }
        Ok(())
    }

    /// Momentum in effect after `iters` completed updates
    pub fn momentum_at(&self, iters: u64) -> f64 {
        if iters < self.low_mom_iters {
            self.mom_low
        } else {
            self.mom
        }
    }

    /// Learning rate for a step whose global gradient norm is `grad_norm`
    ///
    /// Without `max_grad`, or with a norm at or below it, this is `alpha`;
    /// above it the rate shrinks to `alpha * max_grad / grad_norm` so the
    /// step length matches a gradient of norm `max_grad`.
    pub fn effective_learning_rate(&self, grad_norm: f64) -> f64 {
        match self.max_grad {
            Some(max_grad) if grad_norm > max_grad => self.alpha * max_grad / grad_norm,
            _ => self.alpha,
        }
    }

    /// Reads hyperparameters from a JSON file; missing fields take their defaults
    ///
    /// # Parameters
    ///
    /// * `path` - Path of the JSON file
    ///
    /// # Returns
    ///
    /// - `Ok(OptimizerHyperparams)` - Parsed (not yet validated) hyperparameters
    /// - `Err(IoError)` - If the file cannot be read or parsed
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        serde_json::from_reader(reader).map_err(IoError::JsonError)
    }
}
