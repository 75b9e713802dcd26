use super::*;

/// Serializable representation of one named parameter matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableParam {
    pub name: String,
    pub weight: Vec<Vec<f64>>,
}

/// Serializable representation of a whole network: hyperparameters plus
/// every parameter in canonical order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableRnn {
    pub hyperparams: RnnHyperparams,
    pub params: Vec<SerializableParam>,
}

impl SerializableRnn {
    /// Captures the current hyperparameters and parameters of `rnn`
    pub fn from_rnn(rnn: &RNN) -> Self {
        let params = rnn
            .params
            .iter()
            .map(|(id, m)| SerializableParam {
                name: id.to_string(),
                weight: m.outer_iter().map(|row| row.to_vec()).collect(),
            })
            .collect();

        SerializableRnn {
            hyperparams: rnn.hps.clone(),
            params,
        }
    }

    /// Checks that the stored architecture equals `hps`
    ///
    /// `batch_size` is exempt: it only describes how data was fed.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Same architecture
    /// - `Err(IoError::StateMismatch)` - Naming the first field that differs
    pub fn check_architecture(&self, hps: &RnnHyperparams) -> Result<(), IoError> {
        let stored = &self.hyperparams;
        let mismatch = |field: &str, stored: String, current: String| {
            Err(IoError::StateMismatch(format!(
                "checkpoint has {} = {}, model has {}",
                field, stored, current
            )))
        };
        if stored.hidden_size != hps.hidden_size {
            return mismatch("hidden_size", stored.hidden_size.to_string(), hps.hidden_size.to_string());
        }
        if stored.hidden_layers != hps.hidden_layers {
            return mismatch(
                "hidden_layers",
                stored.hidden_layers.to_string(),
                hps.hidden_layers.to_string(),
            );
        }
        if stored.recurrent_layer != hps.recurrent_layer {
            return mismatch(
                "recurrent_layer",
                stored.recurrent_layer.to_string(),
                hps.recurrent_layer.to_string(),
            );
        }
        if stored.output_size != hps.output_size {
            return mismatch("output_size", stored.output_size.to_string(), hps.output_size.to_string());
        }
        if stored.max_act != hps.max_act {
            return mismatch("max_act", stored.max_act.to_string(), hps.max_act.to_string());
        }
        if stored.nl != hps.nl {
            return mismatch("nl", stored.nl.to_string(), hps.nl.to_string());
        }
        Ok(())
    }

    /// Assigns the stored matrices into `params` in place
    ///
    /// Every stored name must match the canonical key at its position, and
    /// every shape must match; nothing is written unless all entries pass.
    ///
    /// # Parameters
    ///
    /// * `params` - Parameter store to overwrite
    ///
    /// # Returns
    ///
    /// - `Ok(())` - All parameters were assigned
    /// - `Err(IoError::StateMismatch)` - On a count, name or shape mismatch
    pub fn apply_to_params(&self, params: &mut ParamSet) -> Result<(), IoError> {
        let keys = params.keys();
        if keys.len() != self.params.len() {
            return Err(IoError::StateMismatch(format!(
                "checkpoint holds {} parameters, model has {}",
                self.params.len(),
                keys.len()
            )));
        }

        let mut decoded = Vec::with_capacity(keys.len());
        for (id, stored) in keys.iter().zip(self.params.iter()) {
            if stored.name != id.to_string() {
                return Err(IoError::StateMismatch(format!(
                    "expected parameter '{}', found '{}'",
                    id, stored.name
                )));
            }
            let matrix = vec2_to_array2(&stored.weight)?;
            let current = params
                .get(*id)
                .ok_or_else(|| IoError::StateMismatch(format!("model has no parameter '{}'", id)))?;
            if matrix.dim() != current.dim() {
                return Err(IoError::StateMismatch(format!(
                    "parameter '{}' has shape {:?} in checkpoint, {:?} in model",
                    id,
                    matrix.dim(),
                    current.dim()
                )));
            }
            decoded.push(matrix);
        }

        for ((_, slot), matrix) in params.iter_mut().zip(decoded) {
            slot.assign(&matrix);
        }
        Ok(())
    }
}

fn vec2_to_array2(vec: &[Vec<f64>]) -> Result<Array2<f64>, IoError> {
    let rows = vec.len();
    let cols = if rows > 0 { vec[0].len() } else { 0 };
    let flat: Vec<f64> = vec.iter().flat_map(|row| row.iter().cloned()).collect();
    Array2::from_shape_vec((rows, cols), flat).map_err(|e| {
        IoError::StdIoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}
