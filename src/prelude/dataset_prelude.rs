pub use crate::dataset::{Batch, BatchOrder, BatchSource, CharStream, one_hot_lists};
