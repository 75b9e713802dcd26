use crate::error::ModelError;
use ndarray::{Array, Dimension, ShapeBuilder};

/// Upper bound on how many released buffers are kept for reuse.
const MAX_RETAINED_BUFFERS: usize = 16;

/// A pool of reusable `f64` buffers backing the per-call activation trace.
///
/// Arrays handed out by [`BufferPool::zeroed`] are always zero-filled and
/// fully owned by the caller. Giving them back with [`BufferPool::release`]
/// lets the next call reuse the allocation. [`BufferPool::reset`] drops every
/// retained buffer; the training driver calls it at the start of each step.
///
/// # Fields
///
/// - `free` - Released buffers waiting to be reused
/// - `reused` - Number of requests served from `free` since the last reset
/// - `allocated` - Number of requests that needed a fresh allocation since the last reset
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Vec<Vec<f64>>,
    reused: usize,
    allocated: usize,
}

impl BufferPool {
    /// Creates an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a zero-filled array of the requested shape
    ///
    /// The smallest retained buffer with enough capacity is reused when one exists.
    ///
    /// # Parameters
    ///
    /// * `shape` - Shape of the requested array, e.g. `(hidden, t, batch, layers)`
    ///
    /// # Returns
    ///
    /// - `Ok(Array<f64, D>)` - Zero-filled array in standard (row-major) layout
    /// - `Err(ModelError::ProcessingError)` - If the array could not be built from the buffer
    pub fn zeroed<D, Sh>(&mut self, shape: Sh) -> Result<Array<f64, D>, ModelError>
    where
        D: Dimension,
        Sh: ShapeBuilder<Dim = D>,
    {
        let shape = shape.into_shape_with_order();
        let len = shape.raw_dim().size();

        let best_fit = self
            .free
            .iter()
            .enumerate()
            .filter(|(_, b)| b.capacity() >= len)
            .min_by_key(|(_, b)| b.capacity())
            .map(|(idx, _)| idx);

        let buffer = match best_fit {
            Some(idx) => {
                self.reused += 1;
                let mut buffer = self.free.swap_remove(idx);
                buffer.clear();
                buffer.resize(len, 0.0);
                buffer
            }
            None => {
                self.allocated += 1;
                vec![0.0; len]
            }
        };

        Array::from_shape_vec(shape, buffer)
            .map_err(|e| ModelError::ProcessingError(format!("buffer pool shape error: {}", e)))
    }

    /// Hands an array's storage back to the pool
    pub fn release<D: Dimension>(&mut self, array: Array<f64, D>) {
        if self.free.len() >= MAX_RETAINED_BUFFERS {
            return;
        }
        let (buffer, _) = array.into_raw_vec_and_offset();
        self.free.push(buffer);
    }

    /// Drops every retained buffer and clears the counters
    pub fn reset(&mut self) {
        self.free.clear();
        self.reused = 0;
        self.allocated = 0;
    }

    /// Number of buffers currently retained for reuse
    pub fn retained(&self) -> usize {
        self.free.len()
    }

    /// `(reused, allocated)` request counts since the last reset
    pub fn stats(&self) -> (usize, usize) {
        (self.reused, self.allocated)
    }
}
