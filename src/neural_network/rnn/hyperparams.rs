use super::*;

/// Architecture and batch hyperparameters of the deep RNN.
///
/// Immutable once a network has been built from them.
///
/// # Fields
///
/// - `hidden_size` - Units per hidden layer
/// - `hidden_layers` - Number of stacked hidden layers
/// - `recurrent_layer` - One-based index of the layer with recurrent connections
/// - `output_size` - Size of the softmax output, which is also the one-hot input size
/// - `batch_size` - Number of sequences per training batch
/// - `max_act` - Threshold the recurrent layer's pre-activation is clipped to
/// - `nl` - Hidden-layer nonlinearity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RnnHyperparams {
    pub hidden_size: usize,
    pub hidden_layers: usize,
    pub recurrent_layer: usize,
    pub output_size: usize,
    pub batch_size: usize,
    pub max_act: f64,
    pub nl: Nonlinearity,
}

impl Default for RnnHyperparams {
    fn default() -> Self {
        Self {
            hidden_size: 1000,
            hidden_layers: 5,
            recurrent_layer: 3,
            output_size: 34,
            batch_size: 128,
            max_act: 5.0,
            nl: Nonlinearity::ReLU,
        }
    }
}

impl RnnHyperparams {
    /// Checks every field against its allowed range
    ///
    /// # Returns
    ///
    /// - `Ok(())` - All hyperparameters are usable
    /// - `Err(ModelError::ConfigurationError)` - The first offending field
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_size(self.hidden_size, "hidden_size")?;
        validate_size(self.hidden_layers, "hidden_layers")?;
        validate_size(self.output_size, "output_size")?;
        validate_size(self.batch_size, "batch_size")?;

        if self.recurrent_layer < 1 || self.recurrent_layer > self.hidden_layers {
            return Err(ModelError::ConfigurationError(format!(
                "recurrent_layer must be in [1, {}], got {}",
                self.hidden_layers, self.recurrent_layer
            )));
        }

        if !(self.max_act > 0.0 && self.max_act.is_finite()) {
            return Err(ModelError::ConfigurationError(format!(
                "max_act must be positive and finite, got {}",
                self.max_act
            )));
        }

        Ok(())
    }

    /// Zero-based index of the recurrent layer
    pub fn recurrent_index(&self) -> usize {
        self.recurrent_layer - 1
    }

    /// Reads hyperparameters from a JSON file; missing fields take their defaults
    ///
    /// # Parameters
    ///
    /// * `path` - Path of the JSON file
    ///
    /// # Returns
    ///
    /// - `Ok(RnnHyperparams)` - Parsed (not yet validated) hyperparameters
    /// - `Err(IoError)` - If the file cannot be read or parsed
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        serde_json::from_reader(reader).map_err(IoError::JsonError)
    }
}

fn validate_size(value: usize, name: &str) -> Result<(), ModelError> {
    if value == 0 {
        return Err(ModelError::ConfigurationError(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(())
}
