//! Command-line interface definitions.
//!
//! `run` hosts the executor; the other subcommands talk to the same
//! database and can be used while a daemon is running.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::experiment::{AdjustmentMethod, CorrelationMethod, ExperimentKind};

/// Pairwise omics correlation experiment engine
#[derive(Parser, Debug)]
#[command(name = "omicorr")]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the executor until interrupted
    Run(RunArgs),
    /// Submit a new experiment
    Submit(SubmitArgs),
    /// Stop a queued or running experiment
    Stop(StopArgs),
    /// Show experiments, or one experiment in detail
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Interval between store polls for new submissions and stop requests
    #[arg(long, default_value_t = 2000)]
    pub poll_ms: u64,

    /// Recover pending experiments and exit once they are all finished
    #[arg(long)]
    pub drain: bool,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Experiment name
    #[arg(long)]
    pub name: String,

    /// Molecule kind of dataset B
    #[arg(long, default_value = "mirna")]
    pub kind: ExperimentKind,

    /// Gene expression dataset
    #[arg(long)]
    pub source_a: String,

    /// miRNA, CNA or methylation dataset
    #[arg(long)]
    pub source_b: String,

    /// Clinical dataset restricting the common samples
    #[arg(long)]
    pub clinical: Option<String>,

    /// CpG site to gene platform (methylation only)
    #[arg(long)]
    pub cpg_platform: Option<String>,

    #[arg(long, default_value = "pearson")]
    pub method: CorrelationMethod,

    #[arg(long, default_value = "benjamini_hochberg")]
    pub adjustment: AdjustmentMethod,

    /// Minimum absolute correlation
    #[arg(long, default_value_t = 0.7)]
    pub min_correlation: f64,

    #[arg(long, default_value_t = 0.0)]
    pub min_std_dev_a: f64,

    #[arg(long, default_value_t = 0.0)]
    pub min_std_dev_b: f64,

    /// Only correlate molecules that share an identifier
    #[arg(long)]
    pub matching_only: bool,

    /// Keep only the N strongest correlations
    #[arg(long)]
    pub top_n: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Experiment id
    pub id: i32,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Experiment id; omit to list all experiments
    pub id: Option<i32>,

    /// Also print the N strongest persisted results
    #[arg(long)]
    pub results: Option<usize>,
}
