//! Command-line parsing for the two-component error model tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! aggregation/fitting code; `app` turns these structs into a `RunConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{SnrScale, Thresholds};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cv", version, about = "Replicate variability and two-component error model fits")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aggregate replicates, fit every pane, print a summary and results table.
    Fit(FitArgs),
    /// Write the bundled example dataset to CSV.
    Sample(SampleArgs),
    /// Re-fit a previously exported chart JSON.
    Refit(RefitArgs),
}

/// Classification thresholds and display options shared by `fit` and `refit`.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Low quantile / presence threshold.
    #[arg(long, default_value_t = Thresholds::DEFAULT_P_LOW)]
    pub p_low: f64,

    /// High quantile / presence threshold.
    #[arg(long, default_value_t = Thresholds::DEFAULT_P_HIGH)]
    pub p_high: f64,

    /// Only aggregate and classify; skip the model fit.
    #[arg(long)]
    pub no_fit: bool,

    /// How SNR is shown in the results table.
    #[arg(long, value_enum, default_value_t = SnrScale::Linear)]
    pub snr_scale: SnrScale,

    /// Keep only panes of this supergroup.
    #[arg(long)]
    pub supergroup: Option<String>,

    /// Keep only panes of this condition.
    #[arg(long)]
    pub condition: Option<String>,

    /// Also fit the union of the selected panes as one combined pane.
    #[arg(long)]
    pub combine: bool,

    /// Export per-point results (with classification flags) to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export per-pane fit results to CSV.
    #[arg(long = "export-panes")]
    pub export_panes: Option<PathBuf>,

    /// Export the full chart (points, flags, fits, curves) to JSON.
    #[arg(long = "export-chart")]
    pub export_chart: Option<PathBuf>,
}

/// Generator knobs for the bundled example dataset.
#[derive(Debug, Args, Clone)]
pub struct SampleKnobs {
    /// Entities per (supergroup, condition) pane.
    #[arg(long, default_value_t = 20)]
    pub entities: usize,

    /// Replicates per entity.
    #[arg(long, default_value_t = 3)]
    pub replicates: usize,

    /// True constant variance component.
    #[arg(long, default_value_t = 4.0)]
    pub ssq0: f64,

    /// True proportional variance component (squared CV).
    #[arg(long, default_value_t = 0.01)]
    pub ssq1: f64,

    /// Random seed for sample generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for `cv fit`.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Input CSV (one row per replicate). Uses the bundled sample when omitted.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Supergroup column name (optional in the file).
    #[arg(long, default_value = "supergroup")]
    pub supergroup_col: String,

    /// Condition column name.
    #[arg(long, default_value = "condition")]
    pub condition_col: String,

    /// Entity column name.
    #[arg(long, default_value = "entity")]
    pub entity_col: String,

    /// Value column name.
    #[arg(long, default_value = "value")]
    pub value_col: String,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub sample: SampleKnobs,
}

/// Options for `cv sample`.
#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,

    #[command(flatten)]
    pub sample: SampleKnobs,
}

/// Options for `cv refit`.
#[derive(Debug, Parser, Clone)]
pub struct RefitArgs {
    /// Chart JSON produced by `cv fit --export-chart`.
    #[arg(long, value_name = "JSON")]
    pub chart: PathBuf,

    /// Start from the classification stored in the chart instead of the
    /// initial quantile split.
    #[arg(long)]
    pub from_flags: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}
