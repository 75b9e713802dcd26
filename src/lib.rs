/// Error types shared by every module, plus the atomic file write used by all checkpoints.
///
/// - `ModelError` - Configuration, input validation and processing failures
/// - `IoError` - Failures while saving or restoring model and optimizer state
pub mod error;

pub use error::{IoError, ModelError};

/// A convenience module that re-exports the most commonly used types and traits from this crate.
///
/// # Available Components
///
/// - The recurrent network (`RNN`, `RnnHyperparams`) and its parameter store (`ParamSet`, `ParamId`)
/// - The momentum optimizer (`MomentumOptimizer`, `OptimizerHyperparams`, `OptimizerState`)
/// - The gradient checker (`GradientChecker`, `GradientCheckReport`)
/// - The `Model` and `Optimizer` traits
/// - Data utilities (`one_hot_lists`, `CharStream`, `BatchSource`) and the `Trainer`
///
/// # Examples
/// ```rust
/// use deeprnn::prelude::*;
///
/// let hps = RnnHyperparams::default();
/// assert!(hps.validate().is_ok());
/// ```
pub mod prelude;

/// Batch sources and one-hot encoding for character-level training.
///
/// # Components
/// - **Batch** / **BatchSource**: a batch of index sequences and the trait that hands them out
/// - **one_hot_lists**: encodes index sequences as an (classes, T, batch) tensor
/// - **CharStream**: next-character prediction batches over a text corpus, in random or
///   sequential order
///
/// # Examples
/// ```rust
/// use deeprnn::dataset::*;
///
/// let mut stream = CharStream::new("hello world, hello rust", 16, 2, 5, BatchOrder::Random, 42).unwrap();
/// let batch = stream.get_batch().unwrap();
/// let data = one_hot_lists(&batch.data, 16).unwrap();
/// assert_eq!(data.dim(), (16, 5, 2));
/// ```
#[cfg(feature = "dataset")]
pub mod dataset;

/// A deep recurrent network trained with hand-written backpropagation through time.
///
/// The network stacks `hidden_layers` fully connected layers per timestep; exactly one
/// of them (`recurrent_layer`) also reads its own previous activation, and its
/// pre-activation is clipped at `max_act`. A softmax over `output_size` classes sits
/// on top.
///
/// # Core Components
///
/// ## Model
/// - **RNN**: forward pass, cost, BPTT gradients, hidden-state carry, JSON checkpoints
/// - **RnnHyperparams**: architecture configuration with validation
/// - **ParamSet** / **ParamId**: typed parameter, gradient and velocity store in canonical order
/// - **Nonlinearity**: ReLU, Tanh, Sigmoid and Linear hidden units
///
/// ## Training
/// - **MomentumOptimizer**: classical momentum with a warm-up schedule, gradient-norm step
///   clipping, cost smoothing and binary state persistence
/// - **GradientChecker**: central finite-difference verification of the analytic gradients
/// - **Trainer**: batch fetching, training loop with progress bar, evaluation and checkpoints
///
/// # Examples
/// ```rust
/// use deeprnn::prelude::*;
///
/// let hps = RnnHyperparams {
///     hidden_size: 8,
///     hidden_layers: 3,
///     recurrent_layer: 2,
///     output_size: 5,
///     batch_size: 2,
///     ..RnnHyperparams::default()
/// };
/// let mut rnn = RNN::new(hps, 0).unwrap();
/// let mut opt = MomentumOptimizer::new(OptimizerHyperparams::default(), &rnn).unwrap();
///
/// let data = one_hot_lists(&[vec![0, 1, 2, 3], vec![4, 3, 2, 1]], 5).unwrap();
/// let labels = vec![vec![1, 2, 3, 4], vec![3, 2, 1, 0]];
///
/// for _ in 0..3 {
///     opt.step(&mut rnn, &data, &labels).unwrap();
/// }
/// assert_eq!(opt.iters(), 3);
/// ```
#[cfg(feature = "neural_network")]
pub mod neural_network;
