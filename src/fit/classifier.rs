//! Quantile-based signal classification.
//!
//! Two rules share the same `p_low` / `p_high` numbers:
//!
//! - the *initial* rule compares each mean against type-7 quantiles of the
//!   pane's mean distribution
//! - the *in-loop* rule compares each point's presence score directly against
//!   `p_low` / `p_high` as fractions

use crate::domain::{DataPoint, Regime, Thresholds};
use crate::math::{quantile_sorted, sorted};
use crate::models::presence;

/// Mean cut-offs for the initial classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanCutoffs {
    pub low: f64,
    pub high: f64,
}

/// Quantiles of the point means at `p_low` and `p_high`.
///
/// `None` when there are no finite means.
pub fn mean_cutoffs(points: &[DataPoint], thresholds: Thresholds) -> Option<MeanCutoffs> {
    let means: Vec<f64> = points
        .iter()
        .map(|p| p.mean)
        .filter(|m| m.is_finite())
        .collect();
    let means = sorted(&means);
    Some(MeanCutoffs {
        low: quantile_sorted(&means, thresholds.p_low)?,
        high: quantile_sorted(&means, thresholds.p_high)?,
    })
}

/// Initial classification against the mean distribution.
///
/// `mean <= low cut-off` is low-signal, `mean >= high cut-off` is high-signal.
/// When both hold (equal thresholds), low wins so the flags stay exclusive.
pub fn classify_by_mean(points: &[DataPoint], thresholds: Thresholds) -> Vec<Regime> {
    let Some(cut) = mean_cutoffs(points, thresholds) else {
        return vec![Regime::Mid; points.len()];
    };
    points
        .iter()
        .map(|p| {
            if p.mean <= cut.low {
                Regime::Low
            } else if p.mean >= cut.high {
                Regime::High
            } else {
                Regime::Mid
            }
        })
        .collect()
}

/// In-loop reclassification from the current model estimate.
pub fn classify_by_presence(
    points: &[DataPoint],
    ssq0: f64,
    ssq1: f64,
    thresholds: Thresholds,
) -> Vec<Regime> {
    points
        .iter()
        .map(|p| {
            let score = presence(p.mean, ssq0, ssq1);
            if score < thresholds.p_low {
                Regime::Low
            } else if score > thresholds.p_high {
                Regime::High
            } else {
                Regime::Mid
            }
        })
        .collect()
}

/// A classification with no low-signal or no high-signal points.
pub fn is_degenerate(regimes: &[Regime]) -> bool {
    !regimes.iter().any(|r| r.is_low()) || !regimes.iter().any(|r| r.is_high())
}

/// Whether two classifications put the same points in the model.
///
/// Only low-OR-high membership is compared, not which side a point is on.
pub fn same_membership(a: &[Regime], b: &[Regime]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.in_model() == y.in_model())
}

/// New points carrying the given classification.
pub fn apply_regimes(points: &[DataPoint], regimes: &[Regime]) -> Vec<DataPoint> {
    points
        .iter()
        .zip(regimes)
        .map(|(p, &r)| p.with_regime(r))
        .collect()
}
