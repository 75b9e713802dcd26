use crate::error::ModelError;
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Hidden-layer nonlinearity, supporting ReLU, Tanh, Sigmoid and Linear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nonlinearity {
    ReLU,
    Tanh,
    Sigmoid,
    Linear,
}

impl Nonlinearity {
    /// Forward application of the nonlinearity
    ///
    /// # Parameters
    ///
    /// * `u` - Pre-activation matrix (units, batch)
    ///
    /// # Returns
    ///
    /// * `Array2<f64>` - A new matrix with the nonlinearity applied elementwise
    pub fn apply(&self, u: &ArrayView2<f64>) -> Array2<f64> {
        let mut result = u.to_owned();
        match self {
            Nonlinearity::ReLU => result.par_mapv_inplace(|x| if x > 0.0 { x } else { 0.0 }),
            Nonlinearity::Tanh => result.par_mapv_inplace(|x| x.tanh()),
            Nonlinearity::Sigmoid => {
                result.par_mapv_inplace(|x| 1.0 / (1.0 + (-x.clamp(-500.0, 500.0)).exp()))
            }
            Nonlinearity::Linear => {}
        }
        result
    }

    /// Derivative of the nonlinearity evaluated at the pre-activation
    ///
    /// Takes `u` rather than the activated output, since `u` is what the
    /// backward pass keeps in its trace.
    ///
    /// # Parameters
    ///
    /// * `u` - Pre-activation matrix (units, batch)
    ///
    /// # Returns
    ///
    /// * `Array2<f64>` - Elementwise derivative values
    pub fn derivative(&self, u: &ArrayView2<f64>) -> Array2<f64> {
        let mut result = u.to_owned();
        match self {
            Nonlinearity::ReLU => result.par_mapv_inplace(|x| if x > 0.0 { 1.0 } else { 0.0 }),
            Nonlinearity::Tanh => result.par_mapv_inplace(|x| {
                let a = x.tanh();
                1.0 - a * a
            }),
            Nonlinearity::Sigmoid => result.par_mapv_inplace(|x| {
                let a = 1.0 / (1.0 + (-x.clamp(-500.0, 500.0)).exp());
                a * (1.0 - a)
            }),
            Nonlinearity::Linear => result.fill(1.0),
        }
        result
    }

    /// Name used in configuration files and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Nonlinearity::ReLU => "relu",
            Nonlinearity::Tanh => "tanh",
            Nonlinearity::Sigmoid => "sigmoid",
            Nonlinearity::Linear => "linear",
        }
    }
}

impl FromStr for Nonlinearity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Ok(Nonlinearity::ReLU),
            "tanh" => Ok(Nonlinearity::Tanh),
            "sigmoid" => Ok(Nonlinearity::Sigmoid),
            "linear" => Ok(Nonlinearity::Linear),
            other => Err(ModelError::ConfigurationError(format!(
                "unknown nonlinearity '{}', expected one of relu, tanh, sigmoid, linear",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Nonlinearity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Column-wise softmax over the class axis (axis 0)
///
/// Each column is one batch element; the column maximum is subtracted before
/// exponentiation.
///
/// # Parameters
///
/// * `logits` - Matrix of shape (classes, batch)
///
/// # Returns
///
/// * `Array2<f64>` - Probabilities of the same shape, every column summing to 1
pub fn softmax_columns(logits: &Array2<f64>) -> Array2<f64> {
    let mut out = logits.clone();
    Zip::from(out.columns_mut()).par_for_each(|mut col| {
        let max_val = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        col.mapv_inplace(|x| (x - max_val).exp());
        let sum = col.sum();
        col.mapv_inplace(|x| x / sum);
    });
    out
}
