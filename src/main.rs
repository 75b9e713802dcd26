//! deeprnn - train and inspect a deep character-level RNN
//!
//! Subcommands:
//! - `train`: run momentum training over a text corpus, with periodic checkpoints
//! - `check-grad`: compare analytic and finite-difference gradients on one batch
//! - `eval`: report the mean held-out cost of a checkpoint

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use deeprnn::prelude::*;
use log::{error, info};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "deeprnn")]
#[command(about = "Deep character-level RNN trainer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on a text corpus
    Train(TrainArgs),
    /// Check analytic gradients against central finite differences
    #[command(name = "check-grad")]
    CheckGrad(CheckGradArgs),
    /// Evaluate a checkpoint on a text corpus
    Eval(EvalArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderArg {
    Random,
    Sequential,
}

impl From<OrderArg> for BatchOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Random => BatchOrder::Random,
            OrderArg::Sequential => BatchOrder::Sequential,
        }
    }
}

/// Corpus and network options shared by every subcommand
#[derive(Args, Debug)]
struct CommonArgs {
    /// UTF-8 text file to read batches from
    #[arg(short, long)]
    corpus: PathBuf,

    /// JSON file with network hyperparameters; flags below override it
    #[arg(long)]
    rnn_config: Option<PathBuf>,

    /// Units per hidden layer
    #[arg(long)]
    hidden_size: Option<usize>,

    /// Number of hidden layers
    #[arg(long)]
    hidden_layers: Option<usize>,

    /// One-based index of the recurrent layer
    #[arg(long)]
    recurrent_layer: Option<usize>,

    /// Number of output classes (at least the corpus vocabulary size)
    #[arg(long)]
    output_size: Option<usize>,

    /// Sequences per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Clip threshold of the recurrent layer
    #[arg(long)]
    max_act: Option<f64>,

    /// Hidden nonlinearity: relu, tanh, sigmoid or linear
    #[arg(long)]
    nl: Option<Nonlinearity>,

    /// Characters per sequence
    #[arg(long, default_value = "50")]
    seq_len: usize,

    /// How windows are drawn from the corpus
    #[arg(long, value_enum, default_value = "random")]
    order: OrderArg,

    /// Seed for weight initialisation and random batches
    #[arg(long, default_value = "0")]
    seed: u64,
}

impl CommonArgs {
    fn hyperparams(&self) -> Result<RnnHyperparams> {
        let mut hps = match &self.rnn_config {
            Some(path) => RnnHyperparams::from_json_path(path)
                .with_context(|| format!("Failed to read network config {:?}", path))?,
            None => RnnHyperparams::default(),
        };
        if let Some(v) = self.hidden_size {
            hps.hidden_size = v;
        }
        if let Some(v) = self.hidden_layers {
            hps.hidden_layers = v;
        }
        if let Some(v) = self.recurrent_layer {
            hps.recurrent_layer = v;
        }
        if let Some(v) = self.output_size {
            hps.output_size = v;
        }
        if let Some(v) = self.batch_size {
            hps.batch_size = v;
        }
        if let Some(v) = self.max_act {
            hps.max_act = v;
        }
        if let Some(v) = self.nl {
            hps.nl = v;
        }
        hps.validate()?;
        Ok(hps)
    }

    fn stream(&self, hps: &RnnHyperparams) -> Result<CharStream> {
        let text = CharStream::read_corpus(&self.corpus)
            .with_context(|| format!("Failed to read corpus {:?}", self.corpus))?;
        let stream = CharStream::new(
            &text,
            hps.output_size,
            hps.batch_size,
            self.seq_len,
            self.order.into(),
            self.seed,
        )?;
        info!(
            "corpus {:?}: {} characters, {} distinct",
            self.corpus,
            stream.len(),
            stream.vocab_size()
        );
        Ok(stream)
    }
}

/// Optimizer options
#[derive(Args, Debug)]
struct OptimizerArgs {
    /// JSON file with optimizer hyperparameters; flags below override it
    #[arg(long)]
    opt_config: Option<PathBuf>,

    /// Learning rate
    #[arg(long)]
    alpha: Option<f64>,

    /// Momentum after warm-up
    #[arg(long)]
    mom: Option<f64>,

    /// Momentum during warm-up
    #[arg(long)]
    mom_low: Option<f64>,

    /// Number of warm-up iterations
    #[arg(long)]
    low_mom_iters: Option<u64>,

    /// Gradient norm above which the step is scaled down
    #[arg(long)]
    max_grad: Option<f64>,
}

impl OptimizerArgs {
    fn hyperparams(&self) -> Result<OptimizerHyperparams> {
        let mut hps = match &self.opt_config {
            Some(path) => OptimizerHyperparams::from_json_path(path)
                .with_context(|| format!("Failed to read optimizer config {:?}", path))?,
            None => OptimizerHyperparams::default(),
        };
        if let Some(v) = self.alpha {
            hps.alpha = v;
        }
        if let Some(v) = self.mom {
            hps.mom = v;
        }
        if let Some(v) = self.mom_low {
            hps.mom_low = v;
        }
        if let Some(v) = self.low_mom_iters {
            hps.low_mom_iters = v;
        }
        if self.max_grad.is_some() {
            hps.max_grad = self.max_grad;
        }
        hps.validate()?;
        Ok(hps)
    }
}

#[derive(Parser, Debug)]
struct TrainArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    optimizer: OptimizerArgs,

    /// Number of optimizer steps
    #[arg(long, default_value = "1000")]
    steps: usize,

    /// Directory for model and optimizer checkpoints
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Steps between checkpoints
    #[arg(long, default_value = "100")]
    save_every: usize,

    /// Resume from the checkpoint in --checkpoint-dir
    #[arg(long)]
    resume: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Parser, Debug)]
struct CheckGradArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Finite-difference step
    #[arg(long, default_value = "0.1")]
    eps: f64,

    /// Allowed relative error
    #[arg(long, default_value = "0.01")]
    rel_tolerance: f64,

    /// Absolute errors below this always pass
    #[arg(long, default_value = "1e-8")]
    abs_tolerance: f64,

    /// Check every parameter instead of only Who
    #[arg(long)]
    all: bool,
}

#[derive(Parser, Debug)]
struct EvalArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Model checkpoint written by `train`
    #[arg(short, long)]
    model: PathBuf,

    /// Number of batches to average over
    #[arg(long, default_value = "10")]
    batches: usize,

    /// Carry the hidden state between consecutive batches (use with --order sequential)
    #[arg(long)]
    carry: bool,
}

fn train(args: TrainArgs) -> Result<()> {
    let hps = args.common.hyperparams()?;
    let opt_hps = args.optimizer.hyperparams()?;
    let stream = args.common.stream(&hps)?;

    let model = RNN::new(hps, args.common.seed)?;
    let optimizer = MomentumOptimizer::new(opt_hps, &model)?;
    let config = TrainerConfig {
        checkpoint_dir: args.checkpoint_dir.clone(),
        save_every: args.save_every,
        show_progress: !args.quiet,
    };
    let mut trainer = Trainer::new(model, optimizer, stream, config)?;

    if args.resume {
        let Some(dir) = &args.checkpoint_dir else {
            bail!("--resume needs --checkpoint-dir");
        };
        trainer
            .load_checkpoint(dir)
            .with_context(|| format!("Failed to resume from {:?}", dir))?;
    }

    let smoothed = trainer.train(args.steps)?;
    if let Some(dir) = &args.checkpoint_dir {
        trainer
            .save_checkpoint(dir)
            .with_context(|| format!("Failed to write checkpoint to {:?}", dir))?;
    }
    println!(
        "Trained {} steps, smoothed cost {:.6}",
        trainer.optimizer().iters(),
        smoothed
    );
    Ok(())
}

fn check_grad(args: CheckGradArgs) -> Result<()> {
    let hps = args.common.hyperparams()?;
    let mut stream = args.common.stream(&hps)?;
    let mut model = RNN::new(hps.clone(), args.common.seed)?;

    let batch = stream.get_batch()?;
    let data = one_hot_lists(&batch.data, hps.output_size)?;
    let checker = GradientChecker::new(args.eps, args.rel_tolerance, args.abs_tolerance)?;
    let report = if args.all {
        checker.check_all(&mut model, &data, &batch.labels)?
    } else {
        checker.check(&mut model, &data, &batch.labels, &[ParamId::Who])?
    };

    for param in &report.params {
        println!(
            "{:>6}  {:>6} entries  {:>4} mismatches  max rel err {:.3e}  max abs err {:.3e}",
            param.id.to_string(),
            param.checked,
            param.mismatches,
            param.max_relative_error,
            param.max_abs_error
        );
    }
    if !report.passed() {
        bail!("gradient check failed");
    }
    println!("Gradient check passed");
    Ok(())
}

fn eval(args: EvalArgs) -> Result<()> {
    let model = RNN::from_path(&args.model)
        .with_context(|| format!("Failed to load model {:?}", args.model))?;
    let hps = model.hyperparams().clone();
    let stream = args.common.stream(&hps)?;
    let optimizer = MomentumOptimizer::new(OptimizerHyperparams::default(), &model)?;
    let config = TrainerConfig {
        show_progress: false,
        ..TrainerConfig::default()
    };
    let mut trainer = Trainer::new(model, optimizer, stream, config)?;

    let cost = trainer.evaluate(args.batches, args.carry)?;
    println!("Mean cost over {} batches: {:.6}", args.batches, cost);
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Train(args) => train(args),
        Commands::CheckGrad(args) => check_grad(args),
        Commands::Eval(args) => eval(args),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
