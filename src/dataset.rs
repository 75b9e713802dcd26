use crate::error::{IoError, ModelError};
use ahash::AHashMap;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// This module provides a batch source over a plain-text character corpus
pub mod char_stream;
/// This module provides one-hot encoding of index sequences
pub mod one_hot;

pub use char_stream::{BatchOrder, CharStream};
pub use one_hot::one_hot_lists;

/// One training batch of index sequences
///
/// # Fields
///
/// - `data` - Input class indices, one sequence per batch element
/// - `labels` - Target class indices, one sequence per batch element, never longer than its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub data: Vec<Vec<usize>>,
    pub labels: Vec<Vec<usize>>,
}

/// Anything that can hand out training batches.
pub trait BatchSource {
    /// Returns the next batch
    ///
    /// # Returns
    ///
    /// - `Ok(Batch)` - The next batch
    /// - `Err(ModelError)` - If no batch can be produced
    fn get_batch(&mut self) -> Result<Batch, ModelError>;
}
