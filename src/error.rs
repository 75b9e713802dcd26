use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Error types that can occur during model construction and computation
///
/// # Variants
///
/// - `InputValidationError` - indicates the input data provided does not match the configured architecture
/// - `ConfigurationError` - indicates a hyperparameter is out of range or unknown
/// - `ProcessingError` - indicates that there is something wrong while processing
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    InputValidationError(String),
    ConfigurationError(String),
    ProcessingError(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::InputValidationError(msg) => write!(f, "Input validation error: {}", msg),
            ModelError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
        }
    }
}

/// Implements the standard error trait for ModelError
impl std::error::Error for ModelError {}

/// Input/Output error types that can occur while saving or restoring checkpoints
///
/// # Variants
///
/// - `StdIoError` - Wraps standard I/O errors from file system operations
/// - `JsonError` - Wraps JSON serialization/deserialization errors (model checkpoints, config files)
/// - `EncodeError` - Wraps binary encoding errors (optimizer state)
/// - `DecodeError` - Wraps binary decoding errors, including truncated records
/// - `StateMismatch` - The persisted record does not fit the model it is restored into
#[derive(Debug)]
pub enum IoError {
    StdIoError(std::io::Error),
    JsonError(serde_json::Error),
    EncodeError(bincode::error::EncodeError),
    DecodeError(bincode::error::DecodeError),
    StateMismatch(String),
}

impl IoError {
    pub fn load_in_buf_reader<P: AsRef<Path>>(path: P) -> Result<BufReader<File>, IoError> {
        let file = File::open(path).map_err(IoError::StdIoError)?;
        Ok(BufReader::new(file))
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::StdIoError(e) => write!(f, "IO error: {}", e),
            IoError::JsonError(e) => write!(f, "JSON error: {}", e),
            IoError::EncodeError(e) => write!(f, "Encode error: {}", e),
            IoError::DecodeError(e) => write!(f, "Decode error: {}", e),
            IoError::StateMismatch(msg) => write!(f, "State mismatch: {}", msg),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::StdIoError(e)
    }
}

/// Writes `bytes` to `path` so that readers only ever observe the old file or the complete new one.
///
/// The bytes go to a sibling `.tmp` file first, are flushed to disk, and the
/// temporary file is then renamed over the target.
///
/// # Parameters
///
/// - `path` - Destination file path
/// - `bytes` - Complete file contents
///
/// # Returns
///
/// - `Ok(())` - The file was replaced
/// - `Err(IoError::StdIoError)` - Creating, writing, syncing or renaming failed
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    use std::io::Write;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    let result = (|| -> Result<(), IoError> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}
