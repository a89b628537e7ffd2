//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads records (CSV or bundled sample)
//! - runs aggregation + per-pane fitting
//! - prints the summary and results table
//! - writes optional exports

use std::path::Path;

use clap::Parser;
use log::info;

use crate::chart::ChartDataset;
use crate::cli::{Command, FitArgs, ModelArgs, RefitArgs, SampleArgs, SampleKnobs};
use crate::domain::{ColumnNames, Pane, RunConfig, SampleConfig, SnrScale, Thresholds};
use crate::error::AppError;
use crate::fit::FitParams;
use crate::report::{RunSummary, format_results_table, format_run_summary, pane_row};

pub mod pipeline;

/// Entry point for the `cv` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Sample(args) => handle_sample(args),
        Command::Refit(args) => handle_refit(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    println!("{}", format_run_summary(&run.summary));
    print_results(&run.chart, config.snr_scale);
    write_exports(
        &run.chart,
        config.export_points.as_deref(),
        config.export_panes.as_deref(),
        config.export_chart.as_deref(),
    )
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = sample_config_from_knobs(&args.sample);
    let records = crate::data::sample::generate_records(&config)?;
    crate::io::export::export_records(&args.output, &records)?;
    info!("wrote {} sample record(s) to '{}'", records.len(), args.output.display());
    Ok(())
}

fn handle_refit(args: RefitArgs) -> Result<(), AppError> {
    let chart = crate::io::chart_json::read_chart_json(&args.chart)?;
    let params = FitParams {
        thresholds: Thresholds::new(args.model.p_low, args.model.p_high)?,
        fit_enabled: !args.model.no_fit,
    };

    let source = format!("chart '{}'", args.chart.display());
    let refit = pipeline::refit_chart(&chart, params, &refit_options_from_args(&args))?;
    let dataset = crate::io::chart_json::dataset_from_chart(&refit)?;
    let summary = RunSummary::new(source, None, &dataset, params.thresholds, params.fit_enabled);

    println!("{}", format_run_summary(&summary));
    print_results(&refit, args.model.snr_scale);
    write_exports(
        &refit,
        args.model.export.as_deref(),
        args.model.export_panes.as_deref(),
        args.model.export_chart.as_deref(),
    )
}

fn print_results(chart: &ChartDataset, scale: SnrScale) {
    let rows: Vec<_> = chart.all_panes().map(|p| pane_row(p, scale)).collect();
    println!("{}", format_results_table(&rows, scale));
}

fn write_exports(
    chart: &ChartDataset,
    points: Option<&Path>,
    panes: Option<&Path>,
    chart_path: Option<&Path>,
) -> Result<(), AppError> {
    let all: Vec<&Pane> = chart.all_panes().collect();
    if let Some(path) = points {
        crate::io::export::export_points(path, &all)?;
        log_export("points", path);
    }
    if let Some(path) = panes {
        crate::io::export::export_panes(path, &all)?;
        log_export("pane results", path);
    }
    if let Some(path) = chart_path {
        crate::io::chart_json::write_chart_json(path, chart)?;
        log_export("chart", path);
    }
    Ok(())
}

fn log_export(what: &str, path: &Path) {
    info!("exported {what} to '{}'", path.display());
}

pub fn run_config_from_args(args: &FitArgs) -> Result<RunConfig, AppError> {
    let m: &ModelArgs = &args.model;
    Ok(RunConfig {
        input: args.input.clone(),
        columns: ColumnNames {
            supergroup: args.supergroup_col.clone(),
            condition: args.condition_col.clone(),
            entity: args.entity_col.clone(),
            value: args.value_col.clone(),
        },
        thresholds: Thresholds::new(m.p_low, m.p_high)?,
        fit_enabled: !m.no_fit,
        snr_scale: m.snr_scale,
        filter_supergroup: m.supergroup.clone(),
        filter_condition: m.condition.clone(),
        combine: m.combine,
        sample: sample_config_from_knobs(&args.sample),
        export_points: m.export.clone(),
        export_panes: m.export_panes.clone(),
        export_chart: m.export_chart.clone(),
    })
}

pub fn refit_options_from_args(args: &RefitArgs) -> pipeline::RefitOptions {
    pipeline::RefitOptions {
        supergroup: args.model.supergroup.clone(),
        condition: args.model.condition.clone(),
        combine: args.model.combine,
        from_flags: args.from_flags,
    }
}

pub fn sample_config_from_knobs(knobs: &SampleKnobs) -> SampleConfig {
    SampleConfig {
        entities_per_pane: knobs.entities,
        replicates: knobs.replicates,
        ssq0: knobs.ssq0,
        ssq1: knobs.ssq1,
        seed: knobs.seed,
        ..SampleConfig::default()
    }
}
