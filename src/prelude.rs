/// Prelude module for neural network functionality.
#[cfg(feature = "neural_network")]
pub mod neural_network_prelude;
/// Prelude module for dataset functionality.
#[cfg(feature = "dataset")]
pub mod dataset_prelude;

pub use crate::error::{IoError, ModelError};
#[cfg(feature = "dataset")]
pub use dataset_prelude::*;
#[cfg(feature = "neural_network")]
pub use neural_network_prelude::*;
