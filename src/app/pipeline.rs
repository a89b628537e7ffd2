//! Shared "fit pipeline" logic used by the `fit` and `refit` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! source -> records -> aggregation -> pane filter -> per-pane fits
//! (+ combined pane) -> chart grid
//!
//! The command handlers can then focus on presentation and exports.

use log::{info, warn};
use rayon::prelude::*;

use crate::chart::{ChartDataset, Dataset};
use crate::data::source::{DataSource, SampleSource};
use crate::domain::{Pane, RunConfig};
use crate::error::AppError;
use crate::fit::{FitParams, FitSession, combined_key, refine_points};
use crate::io::chart_json::dataset_from_chart;
use crate::io::ingest::CsvSource;
use crate::report::RunSummary;

/// All computed outputs of a single `cv fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub chart: ChartDataset,
}

/// The data source a config asks for: a CSV file, or the bundled sample.
pub fn source_for(config: &RunConfig) -> Box<dyn DataSource> {
    match &config.input {
        Some(path) => Box::new(CsvSource::new(path, config.columns.clone())),
        None => Box::new(SampleSource {
            config: config.sample.clone(),
        }),
    }
}

/// Execute the full pipeline for the source selected by `config`.
pub fn run_fit(config: &RunConfig) -> Result<RunOutput, AppError> {
    let source = source_for(config);
    run_fit_with_source(source.as_ref(), config)
}

/// Execute the pipeline over an already constructed source.
pub fn run_fit_with_source(source: &dyn DataSource, config: &RunConfig) -> Result<RunOutput, AppError> {
    // 1) Records. An empty source is "no data", distinct from a failed read.
    let records = source.records()?;
    if records.is_empty() {
        return Err(AppError::no_data(format!("{} returned no records.", source.describe())));
    }
    info!("loaded {} record(s) from {}", records.len(), source.describe());

    // 2) Aggregate replicates into panes, then apply the pane filter.
    let dataset = Dataset::from_records(&records)?;
    if !dataset.excluded.is_empty() {
        warn!(
            "{} replicate group(s) excluded (fewer than 2 replicates or non-finite summary)",
            dataset.excluded.len()
        );
    }
    let dataset = select_panes(
        dataset,
        config.filter_supergroup.as_deref(),
        config.filter_condition.as_deref(),
    )?;
    info!(
        "built {} pane(s) with {} point(s)",
        dataset.panes.len(),
        dataset.point_count()
    );

    // 3) Fit and assemble.
    let params = FitParams {
        thresholds: config.thresholds,
        fit_enabled: config.fit_enabled,
    };
    let summary = RunSummary::new(
        source.describe(),
        Some(records.len()),
        &dataset,
        params.thresholds,
        params.fit_enabled,
    );
    let chart = fit_dataset(dataset, params, config.combine);

    Ok(RunOutput { summary, chart })
}

/// Apply the optional supergroup/condition pane filter.
pub fn select_panes(
    dataset: Dataset,
    supergroup: Option<&str>,
    condition: Option<&str>,
) -> Result<Dataset, AppError> {
    if supergroup.is_none() && condition.is_none() {
        return Ok(dataset);
    }
    dataset.filtered(supergroup, condition)
}

/// Fit every pane of `dataset` (and the combined pane when asked) into a chart.
pub fn fit_dataset(dataset: Dataset, params: FitParams, combine: bool) -> ChartDataset {
    let mut session = FitSession::new(dataset, params);
    let panes = session.fitted_panes();
    let combined = if combine {
        let keys = session.dataset().ordered_keys();
        session.combined_pane(&keys)
    } else {
        None
    };
    ChartDataset::assemble(session.dataset(), panes, combined, params)
}

/// How `refit_chart` selects and re-fits panes.
#[derive(Debug, Clone, Default)]
pub struct RefitOptions {
    pub supergroup: Option<String>,
    pub condition: Option<String>,
    pub combine: bool,
    /// Start each pane's iteration from the classification stored in the
    /// chart rather than from the quantile split.
    pub from_flags: bool,
}

/// Re-fit an exported chart with (possibly new) parameters.
///
/// The pane filter applies to the chart's grid before fitting, so the
/// combined pane covers only the selected panes.
pub fn refit_chart(
    chart: &ChartDataset,
    params: FitParams,
    options: &RefitOptions,
) -> Result<ChartDataset, AppError> {
    let dataset = select_panes(
        dataset_from_chart(chart)?,
        options.supergroup.as_deref(),
        options.condition.as_deref(),
    )?;
    info!(
        "re-fitting {} pane(s) from chart generated at {}",
        dataset.panes.len(),
        chart.generated_at
    );
    if !options.from_flags {
        return Ok(fit_dataset(dataset, params, options.combine));
    }

    let keys = dataset.ordered_keys();
    let panes: Vec<Pane> = keys
        .par_iter()
        .filter_map(|key| dataset.points(key).map(|pts| refine_points(key, pts, params)))
        .collect();
    let combined = if options.combine {
        let points = dataset.combined_points(&keys);
        (!points.is_empty()).then(|| refine_points(&combined_key(), &points, params))
    } else {
        None
    };
    Ok(ChartDataset::assemble(&dataset, panes, combined, params))
}
