use super::*;

/// Validates that the learning rate is positive and finite.
///
/// # Parameters
///
/// * `learning_rate` - The learning rate value to validate
///
/// # Returns
///
/// - `Ok(())` if the learning rate is positive and finite
/// - `Err(ModelError::ConfigurationError)` if the learning rate is not positive or not finite
pub(super) fn validate_learning_rate(learning_rate: f64) -> Result<(), ModelError> {
    if !(learning_rate > 0.0 && learning_rate.is_finite()) {
        return Err(ModelError::ConfigurationError(format!(
            "alpha must be positive and finite, got {}",
            learning_rate
        )));
    }
    Ok(())
}

/// Validates that a momentum coefficient is in the range [0, 1).
///
/// # Parameters
///
/// - `value` - The momentum value to validate
/// - `param_name` - The name of the parameter (for error messages)
///
/// # Returns
///
/// - `Ok(())` if the value is in range
/// - `Err(ModelError::ConfigurationError)` if the value is outside [0, 1), NaN included
pub(super) fn validate_momentum(value: f64, param_name: &str) -> Result<(), ModelError> {
    if !(0.0..1.0).contains(&value) {
        return Err(ModelError::ConfigurationError(format!(
            "{} must be in range [0, 1), got {}",
            param_name, value
        )));
    }
    Ok(())
}

/// Validates the gradient clipping threshold.
///
/// # Parameters
///
/// * `max_grad` - The clipping threshold to validate
///
/// # Returns
///
/// - `Ok(())` if the threshold is positive and finite
/// - `Err(ModelError::ConfigurationError)` otherwise
pub(super) fn validate_max_grad(max_grad: f64) -> Result<(), ModelError> {
    if !(max_grad > 0.0 && max_grad.is_finite()) {
        return Err(ModelError::ConfigurationError(format!(
            "max_grad must be positive and finite, got {}",
            max_grad
        )));
    }
    Ok(())
}

/// Validates that two parameter sets have the same slots and shapes.
///
/// # Parameters
///
/// - `expected` - The optimizer's own layout (its velocities)
/// - `actual` - The model's parameters or gradients
///
/// # Returns
///
/// - `Ok(())` if every slot matches
/// - `Err(ModelError::InputValidationError)` on the first mismatch
pub(super) fn validate_same_layout(
    expected: &ParamSet,
    actual: &ParamSet,
) -> Result<(), ModelError> {
    if expected.inter.len() != actual.inter.len() {
        return Err(ModelError::InputValidationError(format!(
            "optimizer tracks {} hidden layers, model has {}",
            expected.hidden_layers(),
            actual.hidden_layers()
        )));
    }
    for ((id, e), (_, a)) in expected.iter().zip(actual.iter()) {
        if e.dim() != a.dim() {
            return Err(ModelError::InputValidationError(format!(
                "{} has shape {:?} in the optimizer and {:?} in the model",
                id,
                e.dim(),
                a.dim()
            )));
        }
    }
    Ok(())
}
