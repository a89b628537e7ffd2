//! Two-component error model fitting for a single pane.
//!
//! Given a pane's points and thresholds `(p_low, p_high)` we run a fixed-point
//! iteration:
//!
//! 1. classify points against quantiles of the mean distribution
//! 2. estimate `ssq0` (pooled variance of low-signal points) and `ssq1`
//!    (`exp(median lvar of high-signal points) - 1`)
//! 3. reclassify every point from its presence score under `(ssq0, ssq1)`
//! 4. stop when low-OR-high membership no longer changes
//!
//! Insufficient or degenerate data never errors: the result carries
//! `converged = false` and a `FitFailure`.

use log::debug;

use crate::domain::{DataPoint, FitFailure, FitResult, Regime, Thresholds, VarianceComponents};
use crate::fit::classifier::{
    apply_regimes, classify_by_mean, classify_by_presence, is_degenerate, same_membership,
};
use crate::fit::curve::fit_curve;
use crate::math::median;

/// Iteration limit for the fixed-point loop.
pub const MAX_ITERATIONS: usize = 25;

/// Minimum number of points for a fit to be attempted.
pub const MIN_POINTS: usize = 3;

/// Fit output: the result plus the points carrying their final classification.
///
/// The input points are never modified; `points` is a fresh list.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneFit {
    pub result: FitResult,
    pub points: Vec<DataPoint>,
}

/// Fit a pane from scratch (initial quantile classification, then iterate).
pub fn fit_pane(points: &[DataPoint], thresholds: Thresholds) -> PaneFit {
    if points.len() < MIN_POINTS {
        return PaneFit {
            result: FitResult::failed(FitFailure::InsufficientPoints, 0),
            points: points.to_vec(),
        };
    }
    let initial = classify_by_mean(points, thresholds);
    iterate(points, initial, thresholds)
}

/// Continue fitting from the classification the points already carry.
///
/// Running this on the points returned by a converged fit reproduces the same
/// components (it converges on its first iteration).
pub fn refine(points: &[DataPoint], thresholds: Thresholds) -> PaneFit {
    if points.len() < MIN_POINTS {
        return PaneFit {
            result: FitResult::failed(FitFailure::InsufficientPoints, 0),
            points: points.to_vec(),
        };
    }
    let current: Vec<Regime> = points.iter().map(|p| p.regime).collect();
    iterate(points, current, thresholds)
}

fn iterate(points: &[DataPoint], mut regimes: Vec<Regime>, thresholds: Thresholds) -> PaneFit {
    for iteration in 1..=MAX_ITERATIONS {
        let Some(ssq0) = pooled_low_variance(points, &regimes) else {
            return failed(points, &regimes, FitFailure::NoLowSignalPoints, iteration);
        };
        let Some(ssq1) = proportional_variance(points, &regimes) else {
            return failed(points, &regimes, FitFailure::NoHighSignalVariance, iteration);
        };

        let next = classify_by_presence(points, ssq0, ssq1, thresholds);
        debug!(
            "iteration {iteration}: ssq0={ssq0:.6} ssq1={ssq1:.6} low={} high={}",
            next.iter().filter(|r| r.is_low()).count(),
            next.iter().filter(|r| r.is_high()).count(),
        );

        if is_degenerate(&next) {
            return failed(points, &regimes, FitFailure::DegenerateClassification, iteration);
        }

        let stable = same_membership(&regimes, &next);
        regimes = next;
        if stable {
            return PaneFit {
                result: FitResult {
                    converged: true,
                    iterations: iteration,
                    components: Some(VarianceComponents::new(ssq0, ssq1)),
                    failure: None,
                    curve: fit_curve(points, ssq0, ssq1),
                },
                points: apply_regimes(points, &regimes),
            };
        }
    }

    failed(points, &regimes, FitFailure::MaxIterationsExceeded, MAX_ITERATIONS)
}

fn failed(points: &[DataPoint], regimes: &[Regime], failure: FitFailure, iterations: usize) -> PaneFit {
    debug!("fit failed after {iterations} iteration(s): {failure}");
    PaneFit {
        result: FitResult::failed(failure, iterations),
        points: apply_regimes(points, regimes),
    }
}

/// Pooled variance of the low-signal points:
/// `sum(sd_i^2 * (n_i - 1)) / (sum(n_i) - count)`.
pub fn pooled_low_variance(points: &[DataPoint], regimes: &[Regime]) -> Option<f64> {
    let mut ss = 0.0;
    let mut dof = 0usize;
    for (p, r) in points.iter().zip(regimes) {
        if !r.is_low() || p.n < 2 || !p.sd.is_finite() {
            continue;
        }
        ss += p.sd * p.sd * (p.n - 1) as f64;
        dof += p.n - 1;
    }
    if dof == 0 {
        return None;
    }
    let ssq0 = ss / dof as f64;
    ssq0.is_finite().then_some(ssq0)
}

/// `exp(median(lvar)) - 1` over high-signal points with usable `lvar`,
/// clamped at 0.
pub fn proportional_variance(points: &[DataPoint], regimes: &[Regime]) -> Option<f64> {
    let lvars: Vec<f64> = points
        .iter()
        .zip(regimes)
        .filter(|(_, r)| r.is_high())
        .filter_map(|(p, _)| p.usable_lvar())
        .collect();
    let ssq1 = (median(&lvars)?.exp() - 1.0).max(0.0);
    ssq1.is_finite().then_some(ssq1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::aggregate::summarize_replicates;
    use crate::domain::PaneKey;

    /// Replicates `mu * exp(s * c_j) + sigma * d_j` with orthogonal, zero-mean
    /// patterns `c`, `d`, so replicate variance is close to `sigma^2 + s^2 mu^2`.
    fn structured_points(n: usize, sigma: f64, s: f64) -> Vec<DataPoint> {
        let key = PaneKey::new("A", "Control");
        let c = [-1.0, 0.0, 1.0];
        let d = [1.0 / 3f64.sqrt(), -2.0 / 3f64.sqrt(), 1.0 / 3f64.sqrt()];
        (0..n)
            .map(|i| {
                // Log-spaced means from 0.01 to 20000.
                let u = i as f64 / (n as f64 - 1.0);
                let mu = (0.01f64.ln() + u * (20_000f64.ln() - 0.01f64.ln())).exp();
                let values: Vec<f64> = (0..3)
                    .map(|j| mu * (s * c[j]).exp() + sigma * d[j])
                    .collect();
                summarize_replicates(&key, &format!("e{i:03}"), &values).unwrap()
            })
            .collect()
    }

    fn th() -> Thresholds {
        Thresholds::new(0.1, 0.9).unwrap()
    }

    #[test]
    fn recovers_components_from_structured_replicates() {
        let pts = structured_points(60, 2.0, 0.1);
        let fit = fit_pane(&pts, th());
        assert!(fit.result.converged, "{:?}", fit.result.failure);
        let c = fit.result.components.unwrap();
        assert!((c.sigma0 - 2.0).abs() / 2.0 < 0.05, "sigma0={}", c.sigma0);
        assert!((c.cv1 - 0.1).abs() / 0.1 < 0.05, "cv1={}", c.cv1);
        assert!((c.snr - 1.0 / c.cv1).abs() < 1e-12);
        assert!(fit.result.iterations >= 1 && fit.result.iterations <= MAX_ITERATIONS);
        assert_eq!(fit.result.curve.len(), crate::fit::curve::CURVE_SAMPLES);
        assert_eq!(fit.points.len(), pts.len());
        assert!(fit.points.iter().any(|p| p.is_low_signal()));
        assert!(fit.points.iter().any(|p| p.is_high_signal()));
    }

    #[test]
    fn refit_from_converged_classification_is_a_fixed_point() {
        let pts = structured_points(60, 2.0, 0.1);
        let first = fit_pane(&pts, th());
        assert!(first.result.converged);

        let again = refine(&first.points, th());
        assert!(again.result.converged);
        assert_eq!(again.result.iterations, 1);
        let (a, b) = (
            first.result.components.unwrap(),
            again.result.components.unwrap(),
        );
        assert!((a.ssq0 - b.ssq0).abs() <= 1e-12 * a.ssq0.max(1.0));
        assert!((a.ssq1 - b.ssq1).abs() <= 1e-12 * a.ssq1.max(1.0));
        assert_eq!(first.points, again.points);
    }

    #[test]
    fn two_points_do_not_fit() {
        let pts = structured_points(60, 2.0, 0.1);
        let fit = fit_pane(&pts[..2], th());
        assert!(!fit.result.converged);
        assert_eq!(fit.result.failure, Some(FitFailure::InsufficientPoints));
        assert!(fit.result.components.is_none());
        assert!(fit.result.curve.is_empty());
        assert_eq!(fit.points.len(), 2);
    }

    #[test]
    fn identical_replicates_fail_without_nan() {
        let key = PaneKey::new("A", "Control");
        let pts: Vec<DataPoint> = (1..=10)
            .map(|i| {
                let v = i as f64 * 10.0;
                summarize_replicates(&key, &format!("e{i}"), &[v, v, v]).unwrap()
            })
            .collect();

        let regimes = classify_by_mean(&pts, th());
        assert_eq!(pooled_low_variance(&pts, &regimes), Some(0.0));

        let fit = fit_pane(&pts, th());
        assert!(!fit.result.converged);
        assert_eq!(fit.result.failure, Some(FitFailure::NoHighSignalVariance));
        assert!(fit.result.ssq0().is_none());
        assert!(fit.result.ssq1().is_none());
        let json = serde_json::to_string(&fit.result).unwrap();
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn unreachable_high_threshold_is_degenerate() {
        // Presence never exceeds 1, so nothing can be reclassified high.
        let pts = structured_points(60, 2.0, 0.1);
        let fit = fit_pane(&pts, Thresholds::new(0.1, 1.0).unwrap());
        assert!(!fit.result.converged);
        assert_eq!(fit.result.failure, Some(FitFailure::DegenerateClassification));
        assert!(fit.result.components.is_none());
        assert_eq!(fit.result.iterations, 1);
        // Points keep the classification from before the failing step.
        assert_eq!(fit.points.iter().filter(|p| p.is_high_signal()).count(), 1);
        assert!(fit.points.iter().any(|p| p.is_low_signal()));
    }

    #[test]
    fn low_points_without_replicate_spread_fail() {
        let pts: Vec<DataPoint> = structured_points(20, 2.0, 0.1)
            .into_iter()
            .map(|p| DataPoint { n: 1, ..p })
            .collect();
        let fit = fit_pane(&pts, th());
        assert!(!fit.result.converged);
        assert_eq!(fit.result.failure, Some(FitFailure::NoLowSignalPoints));
        assert!(fit.result.components.is_none());
        assert_eq!(fit.result.iterations, 1);

        let nan_sd: Vec<DataPoint> = structured_points(20, 2.0, 0.1)
            .into_iter()
            .map(|p| DataPoint { sd: f64::NAN, ..p })
            .collect();
        assert_eq!(fit_pane(&nan_sd, th()).result.failure, Some(FitFailure::NoLowSignalPoints));
    }

    /// Two classifications that map onto each other: with `{a} / {d, d2, e}`
    /// the estimate gives sigma0/cv ~ 300, which yields `{a, b} / {e}`, whose
    /// estimate gives ~ 10, which yields the first one again.
    fn oscillating_points() -> Vec<DataPoint> {
        let key = PaneKey::new("A", "Control");
        let mk = |entity: &str, mean: f64, sd: f64, lvar: Option<f64>, regime: Regime| DataPoint {
            origin: key.clone(),
            entity: entity.to_string(),
            mean,
            sd,
            lvar,
            n: 3,
            regime,
        };
        vec![
            mk("a", 1.0, 0.3, None, Regime::Low),
            mk("b", 10.0, 1.4, None, Regime::Mid),
            mk("d", 100.0, 1.0, Some(1e-6), Regime::High),
            mk("d2", 200.0, 1.0, Some(1e-6), Regime::High),
            mk("e", 1e5, 1.0, Some(0.01), Regime::High),
        ]
    }

    #[test]
    fn oscillating_membership_hits_iteration_limit() {
        let pts = oscillating_points();
        let fit = refine(&pts, th());
        assert!(!fit.result.converged);
        assert_eq!(fit.result.failure, Some(FitFailure::MaxIterationsExceeded));
        assert!(fit.result.components.is_none());
        assert!(fit.result.curve.is_empty());
        assert_eq!(fit.result.iterations, MAX_ITERATIONS);

        let regimes: Vec<Regime> = fit.points.iter().map(|p| p.regime).collect();
        assert_eq!(
            regimes,
            vec![Regime::Low, Regime::Low, Regime::Mid, Regime::Mid, Regime::High]
        );
    }

    #[test]
    fn raising_p_high_never_adds_high_points_after_convergence() {
        for pts in [structured_points(60, 2.0, 0.1), structured_points(40, 1.5, 0.2)] {
            let mut prev = usize::MAX;
            for p_high in [0.5, 0.6, 0.7, 0.8, 0.9, 0.95] {
                let fit = fit_pane(&pts, Thresholds::new(0.1, p_high).unwrap());
                assert!(fit.result.converged, "p_high={p_high}: {:?}", fit.result.failure);
                let highs = fit.points.iter().filter(|p| p.is_high_signal()).count();
                assert!(highs <= prev, "p_high={p_high}: {highs} > {prev}");
                prev = highs;
            }
        }
    }

    #[test]
    fn pooled_variance_weights_by_degrees_of_freedom() {
        let key = PaneKey::new("A", "Control");
        let a = summarize_replicates(&key, "a", &[1.0, 3.0]).unwrap(); // var 2, dof 1
        let b = summarize_replicates(&key, "b", &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(); // var 2.5, dof 4
        let pts = vec![a, b];
        let regimes = vec![Regime::Low, Regime::Low];
        let ssq0 = pooled_low_variance(&pts, &regimes).unwrap();
        assert!((ssq0 - (2.0 + 2.5 * 4.0) / 5.0).abs() < 1e-12);
        assert!(pooled_low_variance(&pts, &[Regime::Mid, Regime::High]).is_none());
    }

    #[test]
    fn proportional_variance_uses_median_of_high_lvar() {
        let key = PaneKey::new("A", "Control");
        let mk = |lvar: Option<f64>| DataPoint {
            origin: key.clone(),
            entity: "e".to_string(),
            mean: 100.0,
            sd: 10.0,
            lvar,
            n: 3,
            regime: Regime::High,
        };
        let pts = vec![mk(Some(0.01)), mk(Some(0.03)), mk(None), mk(Some(0.0))];
        let regimes = vec![Regime::High; 4];
        let ssq1 = proportional_variance(&pts, &regimes).unwrap();
        assert!((ssq1 - (0.02f64.exp() - 1.0)).abs() < 1e-12);

        let none = vec![mk(None), mk(Some(0.0))];
        assert!(proportional_variance(&none, &[Regime::High, Regime::High]).is_none());
    }

    #[test]
    fn fitting_is_deterministic() {
        let pts = structured_points(40, 1.5, 0.2);
        assert_eq!(fit_pane(&pts, th()), fit_pane(&pts, th()));
    }
}
