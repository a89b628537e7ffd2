//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during aggregation and fitting
//! - exported to JSON/CSV
//! - reloaded later for a re-fit from the exported classification

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Condition label that always sorts first in the pane grid.
pub const CONTROL_CONDITION: &str = "Control";

/// Supergroup assigned to records when the source has no supergroup column.
pub const DEFAULT_SUPERGROUP: &str = "All";

/// One raw replicate measurement as supplied by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub supergroup: String,
    pub condition: String,
    pub entity: String,
    pub value: f64,
}

impl MeasurementRecord {
    pub fn new(
        supergroup: impl Into<String>,
        condition: impl Into<String>,
        entity: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            supergroup: supergroup.into(),
            condition: condition.into(),
            entity: entity.into(),
            value,
        }
    }

    pub fn pane_key(&self) -> PaneKey {
        PaneKey::new(&self.supergroup, &self.condition)
    }
}

/// Identifies one (supergroup, condition) cell of the grid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaneKey {
    pub supergroup: String,
    pub condition: String,
}

impl PaneKey {
    pub fn new(supergroup: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            supergroup: supergroup.into(),
            condition: condition.into(),
        }
    }
}

impl fmt::Display for PaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.supergroup, self.condition)
    }
}

/// Signal regime of a point under the current classification.
///
/// `Low` and `High` are mutually exclusive by construction; `Mid` points are
/// outside the model (they contribute to neither variance component).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Low,
    #[default]
    Mid,
    High,
}

impl Regime {
    pub fn is_low(self) -> bool {
        self == Regime::Low
    }

    pub fn is_high(self) -> bool {
        self == Regime::High
    }

    /// Whether the point participates in the model (low OR high).
    pub fn in_model(self) -> bool {
        self != Regime::Mid
    }
}

/// Aggregated replicate statistics for one entity within one pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Pane the point was aggregated in (kept when panes are combined).
    pub origin: PaneKey,
    pub entity: String,
    pub mean: f64,
    /// Bessel-corrected sample standard deviation.
    pub sd: f64,
    /// Sample variance of `ln(value)` across replicates.
    ///
    /// `None` when any replicate is non-positive or the result is not finite.
    pub lvar: Option<f64>,
    /// Replicate count (always >= 2).
    pub n: usize,
    #[serde(default)]
    pub regime: Regime,
}

impl DataPoint {
    pub fn is_low_signal(&self) -> bool {
        self.regime.is_low()
    }

    pub fn is_high_signal(&self) -> bool {
        self.regime.is_high()
    }

    /// A copy of this point carrying a different classification.
    pub fn with_regime(&self, regime: Regime) -> Self {
        Self {
            regime,
            ..self.clone()
        }
    }

    /// `lvar` when it is usable for the proportional component (finite, > 0).
    pub fn usable_lvar(&self) -> Option<f64> {
        self.lvar.filter(|v| v.is_finite() && *v > 0.0)
    }
}

/// The two user-adjustable quantile thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub p_low: f64,
    pub p_high: f64,
}

impl Thresholds {
    pub const DEFAULT_P_LOW: f64 = 0.1;
    pub const DEFAULT_P_HIGH: f64 = 0.9;

    /// Validate and build thresholds (`0 <= p_low <= p_high <= 1`).
    pub fn new(p_low: f64, p_high: f64) -> Result<Self, AppError> {
        for (name, p) in [("p_low", p_low), ("p_high", p_high)] {
            if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
                return Err(AppError::invalid_input(format!(
                    "Invalid {name}={p}: must be a finite value in [0, 1]."
                )));
            }
        }
        if p_low > p_high {
            return Err(AppError::invalid_input(format!(
                "Invalid thresholds: p_low={p_low} is greater than p_high={p_high}."
            )));
        }
        Ok(Self { p_low, p_high })
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            p_low: Self::DEFAULT_P_LOW,
            p_high: Self::DEFAULT_P_HIGH,
        }
    }
}

/// Why a pane has no fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitFailure {
    /// Fewer than three aggregated points in the pane.
    InsufficientPoints,
    /// No low-signal points with replicate degrees of freedom.
    NoLowSignalPoints,
    /// No high-signal point has a finite, positive log-variance.
    NoHighSignalVariance,
    /// Reclassification left no low-signal or no high-signal points.
    DegenerateClassification,
    /// Membership did not stabilize within the iteration limit.
    MaxIterationsExceeded,
}

impl FitFailure {
    pub fn describe(self) -> &'static str {
        match self {
            FitFailure::InsufficientPoints => "fewer than 3 points",
            FitFailure::NoLowSignalPoints => "no usable low-signal points",
            FitFailure::NoHighSignalVariance => "no high-signal log-variance",
            FitFailure::DegenerateClassification => "degenerate classification",
            FitFailure::MaxIterationsExceeded => "max iterations exceeded",
        }
    }
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Estimated variance components and the metrics derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceComponents {
    /// Constant (additive) variance component.
    pub ssq0: f64,
    /// Proportional variance component (squared CV).
    pub ssq1: f64,
    pub sigma0: f64,
    pub cv1: f64,
    /// Linear signal-to-noise ratio `1 / cv1` (0 when `ssq1 == 0`).
    pub snr: f64,
}

impl VarianceComponents {
    pub fn new(ssq0: f64, ssq1: f64) -> Self {
        let cv1 = ssq1.sqrt();
        Self {
            ssq0,
            ssq1,
            sigma0: ssq0.sqrt(),
            cv1,
            snr: if ssq1 > 0.0 { 1.0 / cv1 } else { 0.0 },
        }
    }

    /// SNR in decibels, `-10 * log10(cv1)`; `None` when `cv1 == 0`.
    pub fn snr_db(&self) -> Option<f64> {
        if self.cv1 > 0.0 {
            Some(-10.0 * self.cv1.log10())
        } else {
            None
        }
    }
}

/// One sample of the fitted SD curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub mean: f64,
    pub predicted_sd: f64,
}

/// Outcome of fitting one pane.
///
/// A failed fit is a normal, displayable state: `converged` is false,
/// `components` is `None` and `failure` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub converged: bool,
    pub iterations: usize,
    pub components: Option<VarianceComponents>,
    pub failure: Option<FitFailure>,
    pub curve: Vec<CurvePoint>,
}

impl FitResult {
    pub fn failed(failure: FitFailure, iterations: usize) -> Self {
        Self {
            converged: false,
            iterations,
            components: None,
            failure: Some(failure),
            curve: Vec::new(),
        }
    }

    pub fn ssq0(&self) -> Option<f64> {
        self.components.map(|c| c.ssq0)
    }

    pub fn ssq1(&self) -> Option<f64> {
        self.components.map(|c| c.ssq1)
    }
}

/// One (supergroup, condition) cell: its points plus an optional fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pane {
    pub key: PaneKey,
    pub points: Vec<DataPoint>,
    pub fit: Option<FitResult>,
}

impl Pane {
    pub fn new(key: PaneKey, points: Vec<DataPoint>) -> Self {
        Self {
            key,
            points,
            fit: None,
        }
    }

    pub fn low_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_low_signal()).count()
    }

    pub fn high_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_high_signal()).count()
    }
}

/// How SNR is shown in reports. The stored `snr` is always linear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SnrScale {
    #[default]
    Linear,
    Db,
}

/// CSV column names used to build `MeasurementRecord`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub supergroup: String,
    pub condition: String,
    pub entity: String,
    pub value: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            supergroup: "supergroup".to_string(),
            condition: "condition".to_string(),
            entity: "entity".to_string(),
            value: "value".to_string(),
        }
    }
}

/// Parameters of the bundled example dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub supergroups: Vec<String>,
    pub conditions: Vec<String>,
    pub entities_per_pane: usize,
    pub replicates: usize,
    /// True constant variance component.
    pub ssq0: f64,
    /// True proportional variance component (squared CV).
    pub ssq1: f64,
    /// True entity means are log-uniform over `[mean_min, mean_max]`.
    pub mean_min: f64,
    pub mean_max: f64,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            supergroups: vec!["A".to_string(), "B".to_string()],
            conditions: vec![CONTROL_CONDITION.to_string(), "Treat".to_string()],
            entities_per_pane: 20,
            replicates: 3,
            ssq0: 4.0,
            ssq1: 0.01,
            mean_min: 0.01,
            mean_max: 20_000.0,
            seed: 42,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// CSV input; the bundled sample is used when absent.
    pub input: Option<PathBuf>,
    pub columns: ColumnNames,
    pub thresholds: Thresholds,
    pub fit_enabled: bool,
    pub snr_scale: SnrScale,

    pub filter_supergroup: Option<String>,
    pub filter_condition: Option<String>,
    /// Fit the union of the selected panes as one combined pane.
    pub combine: bool,

    pub sample: SampleConfig,

    pub export_points: Option<PathBuf>,
    pub export_panes: Option<PathBuf>,
    pub export_chart: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: None,
            columns: ColumnNames::default(),
            thresholds: Thresholds::default(),
            fit_enabled: true,
            snr_scale: SnrScale::Linear,
            filter_supergroup: None,
            filter_condition: None,
            combine: false,
            sample: SampleConfig::default(),
            export_points: None,
            export_panes: None,
            export_chart: None,
        }
    }
}
