//! Reporting utilities: run summary, per-pane result rows, and formatted
//! terminal output.

use crate::chart::Dataset;
use crate::data::aggregate::ExclusionReason;
use crate::domain::{FitResult, Pane, SnrScale, Thresholds};

pub mod format;

pub use format::*;

/// Dataset-level facts printed above the results table.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub source: String,
    /// Raw record count; `None` when rebuilt from an exported chart.
    pub records: Option<usize>,
    pub groups: usize,
    pub points: usize,
    pub panes: usize,
    pub excluded_replicates: usize,
    pub excluded_non_finite: usize,
    pub thresholds: Thresholds,
    pub fit_enabled: bool,
}

impl RunSummary {
    pub fn new(
        source: impl Into<String>,
        records: Option<usize>,
        dataset: &Dataset,
        thresholds: Thresholds,
        fit_enabled: bool,
    ) -> Self {
        Self {
            source: source.into(),
            records,
            groups: dataset.groups_seen,
            points: dataset.point_count(),
            panes: dataset.panes.len(),
            excluded_replicates: dataset.excluded_count(ExclusionReason::InsufficientReplicates),
            excluded_non_finite: dataset.excluded_count(ExclusionReason::NonFinite),
            thresholds,
            fit_enabled,
        }
    }
}

/// One line of the results table.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneRow {
    pub label: String,
    pub points: usize,
    pub low: usize,
    pub high: usize,
    pub status: String,
    pub sigma0: Option<f64>,
    pub cv1: Option<f64>,
    /// SNR on the requested display scale.
    pub snr: Option<f64>,
}

pub fn pane_row(pane: &Pane, scale: SnrScale) -> PaneRow {
    let components = pane.fit.as_ref().and_then(|f| f.components);
    PaneRow {
        label: pane.key.to_string(),
        points: pane.points.len(),
        low: pane.low_count(),
        high: pane.high_count(),
        status: fit_status(pane.fit.as_ref()),
        sigma0: components.map(|c| c.sigma0),
        cv1: components.map(|c| c.cv1),
        snr: components.and_then(|c| match scale {
            SnrScale::Linear => Some(c.snr),
            SnrScale::Db => c.snr_db(),
        }),
    }
}

pub fn fit_status(fit: Option<&FitResult>) -> String {
    match fit {
        None => "not fitted".to_string(),
        Some(f) if f.converged => format!("converged in {}", f.iterations),
        Some(f) => match f.failure {
            Some(reason) => format!("did not converge: {reason}"),
            None => "did not converge".to_string(),
        },
    }
}
