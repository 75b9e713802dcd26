use super::*;

/// A matrix flattened in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl SerializableMatrix {
    /// Flattens `matrix` in row-major order
    pub fn from_array(matrix: &Array2<f64>) -> Self {
        let (rows, cols) = matrix.dim();
        SerializableMatrix {
            rows,
            cols,
            data: matrix.iter().cloned().collect(),
        }
    }

    /// Rebuilds the matrix
    ///
    /// # Returns
    ///
    /// - `Ok(Array2<f64>)` - The matrix
    /// - `Err(IoError::StateMismatch)` - If `data` does not hold `rows * cols` values
    pub fn to_array(&self) -> Result<Array2<f64>, IoError> {
        Array2::from_shape_vec((self.rows, self.cols), self.data.clone()).map_err(|e| {
            IoError::StateMismatch(format!(
                "stored {}x{} matrix holds {} values: {}",
                self.rows,
                self.cols,
                self.data.len(),
                e
            ))
        })
    }
}

/// Everything the momentum optimizer needs to resume training.
///
/// Velocities are listed in canonical parameter order and restored by
/// position.
///
/// # Fields
///
/// - `iters` - Number of applied updates
/// - `costs` - Raw cost of every step
/// - `expcosts` - Exponentially smoothed cost of every step
/// - `velocities` - One velocity matrix per parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub iters: u64,
    pub costs: Vec<f64>,
    pub expcosts: Vec<f64>,
    pub velocities: Vec<SerializableMatrix>,
}

impl OptimizerState {
    /// Encodes the state with bincode's standard configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<u8>)` - Encoded bytes
    /// - `Err(IoError::EncodeError)` - If encoding failed
    pub fn to_bytes(&self) -> Result<Vec<u8>, IoError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(IoError::EncodeError)
    }

    /// Decodes a state written by [`OptimizerState::to_bytes`]
    ///
    /// # Returns
    ///
    /// - `Ok(OptimizerState)` - The decoded state
    /// - `Err(IoError::DecodeError)` - If the bytes are malformed or truncated
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IoError> {
        let (state, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(IoError::DecodeError)?;
        Ok(state)
    }

    /// Writes the encoded state to `path`, replacing any previous file atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        let bytes = self.to_bytes()?;
        write_atomically(path.as_ref(), &bytes)
    }

    /// Reads and decodes a state file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
