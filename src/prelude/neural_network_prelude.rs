pub use crate::neural_network::activation::{Nonlinearity, softmax_columns};
pub use crate::neural_network::gradient_check::{GradientCheckReport, GradientChecker, ParamCheck};
pub use crate::neural_network::neural_network_trait::{CostOutput, Model, Optimizer};
pub use crate::neural_network::optimizer::{
    MomentumOptimizer, OptimizerHyperparams, OptimizerState,
};
pub use crate::neural_network::param_set::{ParamId, ParamSet};
pub use crate::neural_network::rnn::{
    ActivationTrace, GradientTrace, INIT_EPS, RNN, RnnHyperparams,
};
#[cfg(feature = "dataset")]
pub use crate::neural_network::trainer::{RunMode, RunOutcome, Trainer, TrainerConfig};
