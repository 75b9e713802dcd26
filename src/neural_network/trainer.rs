use crate::dataset::{BatchSource, one_hot_lists};
use crate::error::{IoError, ModelError};
use crate::neural_network::gradient_check::{GradientCheckReport, GradientChecker};
use crate::neural_network::neural_network_trait::Optimizer;
use crate::neural_network::optimizer::MomentumOptimizer;
use crate::neural_network::param_set::ParamId;
use crate::neural_network::rnn::RNN;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use ndarray::Array3;
use std::path::{Path, PathBuf};

/// File name of the model checkpoint inside a checkpoint directory.
pub const MODEL_CHECKPOINT: &str = "model.json";
/// File name of the optimizer state inside a checkpoint directory.
pub const OPTIMIZER_CHECKPOINT: &str = "optimizer.bin";

/// Perturbation used by [`RunMode::CheckGradient`].
const CHECK_EPS: f64 = 0.1;

/// What a single [`Trainer::run`] call does with its batch
///
/// # Variants
///
/// - `Train` - One optimizer step
/// - `Evaluate` - Cost and probabilities, parameters untouched
/// - `CheckGradient` - Finite-difference check of `Who`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Train,
    Evaluate,
    CheckGradient,
}

/// Result of a single [`Trainer::run`] call
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Trained { cost: f64 },
    Evaluated { cost: f64, probabilities: Array3<f64> },
    Checked(GradientCheckReport),
}

/// Checkpointing and display settings of a [`Trainer`]
///
/// # Fields
///
/// - `checkpoint_dir` - Directory for model and optimizer checkpoints; `None` disables them
/// - `save_every` - Steps between checkpoints
/// - `show_progress` - Whether [`Trainer::train`] draws a progress bar
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub checkpoint_dir: Option<PathBuf>,
    pub save_every: usize,
    pub show_progress: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: None,
            save_every: 100,
            show_progress: true,
        }
    }
}

/// Drives training: fetches batches, encodes them, and hands them to the
/// optimizer, the evaluator or the gradient checker.
pub struct Trainer<S: BatchSource> {
    model: RNN,
    optimizer: MomentumOptimizer,
    source: S,
    config: TrainerConfig,
}

impl<S: BatchSource> Trainer<S> {
    /// Creates a trainer
    ///
    /// # Parameters
    ///
    /// - `model` - The network to train
    /// - `optimizer` - An optimizer built for `model`
    /// - `source` - Where batches come from
    /// - `config` - Checkpointing and display settings
    ///
    /// # Returns
    ///
    /// - `Ok(Trainer)` - The trainer
    /// - `Err(ModelError::ConfigurationError)` - If `save_every` is zero
    pub fn new(
        model: RNN,
        optimizer: MomentumOptimizer,
        source: S,
        config: TrainerConfig,
    ) -> Result<Self, ModelError> {
        if config.save_every == 0 {
            return Err(ModelError::ConfigurationError(
                "save_every must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            model,
            optimizer,
            source,
            config,
        })
    }

    pub fn model(&self) -> &RNN {
        &self.model
    }

    pub fn optimizer(&self) -> &MomentumOptimizer {
        &self.optimizer
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Splits the trainer back into its parts
    pub fn into_parts(self) -> (RNN, MomentumOptimizer, S) {
        (self.model, self.optimizer, self.source)
    }

    /// Processes one batch in the given mode
    ///
    /// Drops the model's retained trace buffers first, so each step starts
    /// from a clean pool.
    ///
    /// # Parameters
    ///
    /// * `mode` - What to do with the batch
    ///
    /// # Returns
    ///
    /// - `Ok(RunOutcome)` - Outcome matching `mode`
    /// - `Err(ModelError)` - If the batch could not be fetched, encoded or processed
    pub fn run(&mut self, mode: RunMode) -> Result<RunOutcome, ModelError> {
        self.model.reset_buffers();

        let batch = self.source.get_batch()?;
        let data = one_hot_lists(&batch.data, self.model.hyperparams().output_size)?;

        match mode {
            RunMode::Train => {
                let cost = self.optimizer.step(&mut self.model, &data, &batch.labels)?;
                Ok(RunOutcome::Trained { cost })
            }
            RunMode::Evaluate => {
                let (cost, output) =
                    self.model
                        .cost_and_grad(&data, Some(batch.labels.as_slice()), false, None)?;
                let cost = cost.ok_or_else(|| {
                    ModelError::ProcessingError("no cost for a labeled batch".to_string())
                })?;
                let probabilities = output.probabilities().cloned().ok_or_else(|| {
                    ModelError::ProcessingError("no probabilities from evaluation".to_string())
                })?;
                Ok(RunOutcome::Evaluated {
                    cost,
                    probabilities,
                })
            }
            RunMode::CheckGradient => {
                let checker = GradientChecker::new(CHECK_EPS, 1e-2, 1e-8)?;
                let report =
                    checker.check(&mut self.model, &data, &batch.labels, &[ParamId::Who])?;
                Ok(RunOutcome::Checked(report))
            }
        }
    }

    fn train_step(&mut self) -> Result<f64, ModelError> {
        match self.run(RunMode::Train)? {
            RunOutcome::Trained { cost } => Ok(cost),
            other => Err(ModelError::ProcessingError(format!(
                "expected a training outcome, got {:?}",
                other
            ))),
        }
    }

    /// Runs `steps` training steps
    ///
    /// Shows the smoothed cost on a progress bar and writes a checkpoint
    /// every `save_every` steps when a checkpoint directory is configured.
    ///
    /// # Parameters
    ///
    /// * `steps` - Number of optimizer steps
    ///
    /// # Returns
    ///
    /// - `Ok(f64)` - Smoothed cost after the last step
    /// - `Err(ModelError)` - If a step or a checkpoint failed
    pub fn train(&mut self, steps: usize) -> Result<f64, ModelError> {
        let progress_bar = if self.config.show_progress {
            ProgressBar::new(steps as u64)
        } else {
            ProgressBar::hidden()
        };
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} | Cost: {msg}")
                .map_err(|e| {
                    ModelError::ProcessingError(format!("invalid progress bar template: {}", e))
                })?
                .progress_chars("█▓░"),
        );

        info!(
            "training for {} steps from iteration {}",
            steps,
            self.optimizer.iters()
        );

        for step in 1..=steps {
            let cost = self.train_step()?;
            let smoothed = self.optimizer.expcosts().last().copied().unwrap_or(cost);
            progress_bar.set_message(format!("{:.6}", smoothed));
            progress_bar.inc(1);

            if step % self.config.save_every == 0 {
                if let Some(dir) = self.config.checkpoint_dir.clone() {
                    self.save_checkpoint(&dir).map_err(|e| {
                        ModelError::ProcessingError(format!("checkpoint failed: {}", e))
                    })?;
                }
            }
        }

        progress_bar.finish_with_message("Training completed");

        let smoothed = self.optimizer.expcosts().last().copied().unwrap_or(f64::NAN);
        info!(
            "training finished at iteration {}, smoothed cost {:.6}",
            self.optimizer.iters(),
            smoothed
        );
        Ok(smoothed)
    }

    /// Average cost over `batches` held-out batches
    ///
    /// # Parameters
    ///
    /// - `batches` - Number of batches to evaluate
    /// - `carry_hidden_state` - Start each batch from the previous batch's final hidden state
    ///
    /// # Returns
    ///
    /// - `Ok(f64)` - Mean batch cost
    /// - `Err(ModelError)` - If `batches` is zero or a batch was rejected
    pub fn evaluate(&mut self, batches: usize, carry_hidden_state: bool) -> Result<f64, ModelError> {
        if batches == 0 {
            return Err(ModelError::InputValidationError(
                "batches must be greater than 0".to_string(),
            ));
        }
        self.model.reset_buffers();

        let output_size = self.model.hyperparams().output_size;
        let mut total = 0.0;
        let mut carry: Option<Array3<f64>> = None;

        for _ in 0..batches {
            let batch = self.source.get_batch()?;
            let data = one_hot_lists(&batch.data, output_size)?;
            let (cost, _) =
                self.model
                    .cost_and_grad(&data, Some(batch.labels.as_slice()), false, carry.as_ref())?;
            total += cost.ok_or_else(|| {
                ModelError::ProcessingError("no cost for a labeled batch".to_string())
            })?;
            if carry_hidden_state {
                carry = self.model.last_hidden_state().cloned();
            }
        }

        let mean = total / batches as f64;
        info!("evaluated {} batches, mean cost {:.6}", batches, mean);
        Ok(mean)
    }

    /// Writes the model and optimizer state into `dir`
    ///
    /// # Parameters
    ///
    /// * `dir` - Checkpoint directory, created if missing
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Both files written
    /// - `Err(IoError)` - If a file could not be written
    pub fn save_checkpoint(&self, dir: &Path) -> Result<(), IoError> {
        std::fs::create_dir_all(dir)?;
        self.model.save_to_path(dir.join(MODEL_CHECKPOINT))?;
        self.optimizer.save_state(dir.join(OPTIMIZER_CHECKPOINT))?;
        info!(
            "saved checkpoint at iteration {} to {}",
            self.optimizer.iters(),
            dir.display()
        );
        Ok(())
    }

    /// Restores the model and optimizer state from `dir`
    ///
    /// Both files are read and checked before either is installed, so on
    /// error the model and the optimizer are unchanged.
    ///
    /// # Parameters
    ///
    /// * `dir` - Directory written by [`Trainer::save_checkpoint`]
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Both restored
    /// - `Err(IoError)` - If a file is missing, malformed or does not fit the model
    pub fn load_checkpoint(&mut self, dir: &Path) -> Result<(), IoError> {
        let params = self.model.read_checkpoint(dir.join(MODEL_CHECKPOINT))?;
        let mut optimizer = self.optimizer.clone();
        optimizer.load_state(dir.join(OPTIMIZER_CHECKPOINT))?;

        self.model
            .replace_params(params)
            .map_err(|e| IoError::StateMismatch(e.to_string()))?;
        self.optimizer = optimizer;
        info!(
            "resumed from {} at iteration {}",
            dir.display(),
            self.optimizer.iters()
        );
        Ok(())
    }
}
