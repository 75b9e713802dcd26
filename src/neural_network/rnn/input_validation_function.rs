use super::*;

/// Validates the one-hot input tensor against the architecture
///
/// # Parameters
///
/// - `data` - Input of shape (output_size, T, batch)
/// - `output_size` - Configured output size
///
/// # Returns
///
/// - `Ok((T, batch))` - Sequence length and batch size of the input
/// - `Err(ModelError::InputValidationError)` - If the shape is wrong or empty
pub(super) fn validate_data(
    data: &Array3<f64>,
    output_size: usize,
) -> Result<(usize, usize), ModelError> {
    let (classes, timesteps, batch) = data.dim();
    if classes != output_size {
        return Err(ModelError::InputValidationError(format!(
            "input has {} classes on axis 0, network expects {}",
            classes, output_size
        )));
    }
    if timesteps == 0 || batch == 0 {
        return Err(ModelError::InputValidationError(format!(
            "input must have at least one timestep and one sequence, got T={} batch={}",
            timesteps, batch
        )));
    }
    Ok((timesteps, batch))
}

/// Validates per-sequence labels against the input shape
///
/// # Parameters
///
/// - `labels` - One label sequence per batch element
/// - `timesteps` - T of the input
/// - `batch` - Batch size of the input
/// - `output_size` - Number of classes
///
/// # Returns
///
/// - `Ok(())` - Labels fit the input
/// - `Err(ModelError::InputValidationError)` - On a count, length or class-range mismatch
pub(super) fn validate_labels(
    labels: &[Vec<usize>],
    timesteps: usize,
    batch: usize,
    output_size: usize,
) -> Result<(), ModelError> {
    if labels.len() != batch {
        return Err(ModelError::InputValidationError(format!(
            "got {} label sequences for a batch of {}",
            labels.len(),
            batch
        )));
    }
    for (b, seq) in labels.iter().enumerate() {
        if seq.len() > timesteps {
            return Err(ModelError::InputValidationError(format!(
                "label sequence {} has length {}, longer than T={}",
                b,
                seq.len(),
                timesteps
            )));
        }
        if let Some(&bad) = seq.iter().find(|&&c| c >= output_size) {
            return Err(ModelError::InputValidationError(format!(
                "label sequence {} contains class {}, output size is {}",
                b, bad, output_size
            )));
        }
    }
    Ok(())
}

/// Validates a caller-supplied carry-over hidden state
///
/// # Parameters
///
/// - `state` - Hidden state of shape (hidden_size, batch, hidden_layers)
/// - `hidden_size` - Configured units per layer
/// - `batch` - Batch size of the input
/// - `hidden_layers` - Configured number of layers
///
/// # Returns
///
/// - `Ok(())` - Shape matches
/// - `Err(ModelError::InputValidationError)` - Otherwise
pub(super) fn validate_initial_state(
    state: &Array3<f64>,
    hidden_size: usize,
    batch: usize,
    hidden_layers: usize,
) -> Result<(), ModelError> {
    let expected = (hidden_size, batch, hidden_layers);
    if state.dim() != expected {
        return Err(ModelError::InputValidationError(format!(
            "initial hidden state has shape {:?}, expected {:?}",
            state.dim(),
            expected
        )));
    }
    Ok(())
}
