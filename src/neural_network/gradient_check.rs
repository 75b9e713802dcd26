use crate::error::ModelError;
use crate::neural_network::neural_network_trait::Model;
use crate::neural_network::param_set::ParamId;
use log::{debug, warn};
use ndarray::Array3;

/// Result of checking one parameter matrix
///
/// # Fields
///
/// - `id` - The parameter that was probed
/// - `checked` - Number of entries probed
/// - `mismatches` - Entries whose analytic and numerical gradients disagree
/// - `max_abs_error` - Largest `|analytic - numerical|` over all entries
/// - `max_relative_error` - Largest `|analytic - numerical| / max(|analytic|, |numerical|)`
/// - `worst_entry` - `(row, col, analytic, numerical)` of the entry with the largest absolute error
#[derive(Debug, Clone, PartialEq)]
pub struct ParamCheck {
    pub id: ParamId,
    pub checked: usize,
    pub mismatches: usize,
    pub max_abs_error: f64,
    pub max_relative_error: f64,
    pub worst_entry: Option<(usize, usize, f64, f64)>,
}

impl ParamCheck {
    /// Whether every entry of this parameter agreed
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Outcome of a gradient check across several parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GradientCheckReport {
    pub params: Vec<ParamCheck>,
}

impl GradientCheckReport {
    /// Whether every checked parameter agreed
    pub fn passed(&self) -> bool {
        self.params.iter().all(ParamCheck::passed)
    }

    /// The check for one parameter, if it was probed
    pub fn get(&self, id: ParamId) -> Option<&ParamCheck> {
        self.params.iter().find(|p| p.id == id)
    }

    /// Largest relative error over all checked parameters
    pub fn max_relative_error(&self) -> f64 {
        self.params
            .iter()
            .map(|p| p.max_relative_error)
            .fold(0.0, f64::max)
    }
}

/// Verifies analytic gradients against central finite differences.
///
/// Each probed entry is moved by `+eps` and `-eps`, the cost is recomputed
/// without gradients and `(cost(+eps) - cost(-eps)) / 2eps` is compared with
/// the analytic gradient. The model's cost is averaged over timesteps while
/// its gradients are not, so the estimate is multiplied by T first.
///
/// An entry is a mismatch when its absolute error exceeds `abs_tolerance`
/// and its relative error exceeds `rel_tolerance`.
///
/// # Fields
///
/// - `eps` - Perturbation size
/// - `rel_tolerance` - Allowed relative error
/// - `abs_tolerance` - Absolute errors below this always pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientChecker {
    eps: f64,
    rel_tolerance: f64,
    abs_tolerance: f64,
}

impl Default for GradientChecker {
    fn default() -> Self {
        Self {
            eps: 1e-5,
            rel_tolerance: 1e-2,
            abs_tolerance: 1e-8,
        }
    }
}

impl GradientChecker {
    /// Creates a checker
    ///
    /// # Parameters
    ///
    /// - `eps` - Perturbation size
    /// - `rel_tolerance` - Allowed relative error
    /// - `abs_tolerance` - Absolute errors below this always pass
    ///
    /// # Returns
    ///
    /// - `Ok(GradientChecker)` - The checker
    /// - `Err(ModelError::ConfigurationError)` - If `eps` or a tolerance is not positive and finite
    pub fn new(eps: f64, rel_tolerance: f64, abs_tolerance: f64) -> Result<Self, ModelError> {
        for (value, name) in [
            (eps, "eps"),
            (rel_tolerance, "rel_tolerance"),
            (abs_tolerance, "abs_tolerance"),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ModelError::ConfigurationError(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(Self {
            eps,
            rel_tolerance,
            abs_tolerance,
        })
    }

    /// Perturbation size
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Checks every entry of the parameters in `ids`
    ///
    /// Parameters are restored to their exact original values after each
    /// probe. Mismatches are logged and reported, never returned as errors.
    ///
    /// # Parameters
    ///
    /// - `model` - The model under test
    /// - `data` - One-hot input of shape (output_size, T, batch)
    /// - `labels` - Per batch element class indices
    /// - `ids` - Parameters to probe
    ///
    /// # Returns
    ///
    /// - `Ok(GradientCheckReport)` - One entry per probed parameter
    /// - `Err(ModelError::InputValidationError)` - If the batch is rejected or an id does not exist in the model
    pub fn check(
        &self,
        model: &mut dyn Model,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
        ids: &[ParamId],
    ) -> Result<GradientCheckReport, ModelError> {
        let timesteps = data.shape()[1] as f64;
        let (_, output) = model.cost_and_grad(data, Some(labels), true, None)?;
        let grads = output.into_gradients().ok_or_else(|| {
            ModelError::ProcessingError("model returned no gradients".to_string())
        })?;

        let mut params = Vec::with_capacity(ids.len());
        for &id in ids {
            let analytic = grads.get(id).ok_or_else(|| {
                ModelError::InputValidationError(format!("model has no parameter {}", id))
            })?;
            let (rows, cols) = analytic.dim();

            let mut result = ParamCheck {
                id,
                checked: 0,
                mismatches: 0,
                max_abs_error: 0.0,
                max_relative_error: 0.0,
                worst_entry: None,
            };

            for i in 0..rows {
                for j in 0..cols {
                    let cost_plus = self.probe(model, data, labels, id, (i, j), self.eps)?;
                    let cost_minus = self.probe(model, data, labels, id, (i, j), -self.eps)?;
                    let numerical = (cost_plus - cost_minus) / (2.0 * self.eps) * timesteps;
                    let a = analytic[[i, j]];

                    let abs_error = (a - numerical).abs();
                    let scale = a.abs().max(numerical.abs());
                    let rel_error = if scale > 0.0 { abs_error / scale } else { 0.0 };

                    result.checked += 1;
                    if abs_error > self.abs_tolerance && abs_error > self.rel_tolerance * scale {
                        result.mismatches += 1;
                    }
                    if result.worst_entry.is_none() || abs_error > result.max_abs_error {
                        result.worst_entry = Some((i, j, a, numerical));
                    }
                    result.max_abs_error = result.max_abs_error.max(abs_error);
                    result.max_relative_error = result.max_relative_error.max(rel_error);
                }
            }

            match result.worst_entry {
                Some((i, j, a, n)) if !result.passed() => warn!(
                    "gradient check failed for {}: {}/{} entries mismatch, worst at ({}, {}) analytic {:.6e} numerical {:.6e}",
                    id, result.mismatches, result.checked, i, j, a, n
                ),
                _ => debug!(
                    "gradient check passed for {}: max relative error {:.3e}",
                    id, result.max_relative_error
                ),
            }
            params.push(result);
        }

        Ok(GradientCheckReport { params })
    }

    /// Checks every parameter of the model in canonical order
    pub fn check_all(
        &self,
        model: &mut dyn Model,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
    ) -> Result<GradientCheckReport, ModelError> {
        let ids = model.params().keys();
        self.check(model, data, labels, &ids)
    }

    /// Cost with one entry shifted by `delta`; the entry is restored before returning
    fn probe(
        &self,
        model: &mut dyn Model,
        data: &Array3<f64>,
        labels: &[Vec<usize>],
        id: ParamId,
        index: (usize, usize),
        delta: f64,
    ) -> Result<f64, ModelError> {
        let original = shift_entry(model, id, index, delta)?;
        let result = model.cost_and_grad(data, Some(labels), false, None);
        if let Some(m) = model.params_mut().get_mut(id) {
            m[[index.0, index.1]] = original;
        }
        let (cost, _) = result?;
        cost.ok_or_else(|| {
            ModelError::ProcessingError("model returned no cost for a labeled batch".to_string())
        })
    }
}

/// Adds `delta` to one parameter entry and returns its previous value
fn shift_entry(
    model: &mut dyn Model,
    id: ParamId,
    (i, j): (usize, usize),
    delta: f64,
) -> Result<f64, ModelError> {
    let m = model
        .params_mut()
        .get_mut(id)
        .ok_or_else(|| ModelError::InputValidationError(format!("model has no parameter {}", id)))?;
    let original = m[[i, j]];
    m[[i, j]] = original + delta;
    Ok(original)
}
