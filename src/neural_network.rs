/// Module that contains the hidden-layer nonlinearities and the output softmax
pub mod activation;
/// Module that contains the reusable buffer pool backing activation traces
pub mod buffer_pool;
/// Module that contains the finite-difference gradient checker
pub mod gradient_check;
/// Module that contains the model and optimizer traits
pub mod neural_network_trait;
/// Module that contains the momentum optimizer and its persisted state
pub mod optimizer;
/// Module that contains the typed parameter store
pub mod param_set;
/// Module that contains the deep recurrent network and its forward/backward engine
pub mod rnn;
/// Module that contains the training driver
#[cfg(feature = "dataset")]
pub mod trainer;

pub use activation::*;
pub use buffer_pool::BufferPool;
pub use gradient_check::*;
pub use neural_network_trait::*;
pub use optimizer::*;
pub use param_set::*;
pub use rnn::*;
#[cfg(feature = "dataset")]
pub use trainer::*;
