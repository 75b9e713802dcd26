use super::*;

/// Encodes index sequences as a one-hot tensor
///
/// Shorter sequences are padded: positions past their end stay all-zero.
///
/// # Parameters
///
/// - `sequences` - One sequence of class indices per batch element
/// - `size` - Number of classes
///
/// # Returns
///
/// - `Ok(Array3<f64>)` - Tensor of shape (size, T, batch) with T the longest sequence length
/// - `Err(ModelError::InputValidationError)` - If there are no sequences or an index is not below `size`
///
/// # Example
/// ```rust
/// use deeprnn::dataset::one_hot_lists;
///
/// let data = one_hot_lists(&[vec![0, 2], vec![1]], 3).unwrap();
/// assert_eq!(data.dim(), (3, 2, 2));
/// assert_eq!(data[[2, 1, 0]], 1.0);
/// assert_eq!(data.sum(), 3.0);
/// ```
pub fn one_hot_lists(sequences: &[Vec<usize>], size: usize) -> Result<Array3<f64>, ModelError> {
    if sequences.is_empty() {
        return Err(ModelError::InputValidationError(
            "cannot one-hot encode an empty batch".to_string(),
        ));
    }
    let timesteps = sequences.iter().map(Vec::len).max().unwrap_or(0);

    let mut out = Array3::zeros((size, timesteps, sequences.len()));
    for (b, seq) in sequences.iter().enumerate() {
        for (t, &class) in seq.iter().enumerate() {
            if class >= size {
                return Err(ModelError::InputValidationError(format!(
                    "index {} at position {} of sequence {} is out of range for {} classes",
                    class, t, b, size
                )));
            }
            out[[class, t, b]] = 1.0;
        }
    }
    Ok(out)
}
