//! Fit curve sampling for overlays.

use crate::domain::{CurvePoint, DataPoint};
use crate::models::predict_sd;

/// Number of samples per curve.
pub const CURVE_SAMPLES: usize = 200;

/// Lower bound of the sampled mean domain (keeps the curve off zero/negative means).
pub const MIN_CURVE_MEAN: f64 = 1e-6;

/// Sample the fitted SD curve across the observed mean range of `points`.
pub fn fit_curve(points: &[DataPoint], ssq0: f64, ssq1: f64) -> Vec<CurvePoint> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for p in points.iter().filter(|p| p.mean.is_finite()) {
        lo = lo.min(p.mean);
        hi = hi.max(p.mean);
    }
    sample_curve(lo, hi, ssq0, ssq1, CURVE_SAMPLES)
}

/// Evenly spaced samples over `[max(MIN_CURVE_MEAN, min_mean), max_mean]`.
///
/// Empty when the range is degenerate (`max_mean <= 0` or `min_mean >= max_mean`)
/// or the components would produce non-finite values.
pub fn sample_curve(
    min_mean: f64,
    max_mean: f64,
    ssq0: f64,
    ssq1: f64,
    samples: usize,
) -> Vec<CurvePoint> {
    if !(min_mean.is_finite() && max_mean.is_finite()) || max_mean <= 0.0 || min_mean >= max_mean {
        return Vec::new();
    }
    if !(ssq0.is_finite() && ssq1.is_finite() && ssq0 >= 0.0 && ssq1 >= 0.0) {
        return Vec::new();
    }
    let start = min_mean.max(MIN_CURVE_MEAN);
    if start >= max_mean {
        return Vec::new();
    }

    let n = samples.max(2);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let mean = start + u * (max_mean - start);
        let predicted_sd = predict_sd(mean, ssq0, ssq1);
        if !predicted_sd.is_finite() {
            return Vec::new();
        }
        out.push(CurvePoint { mean, predicted_sd });
    }
    out
}
