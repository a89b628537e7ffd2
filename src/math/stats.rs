//! Descriptive statistics with fully specified tie/interpolation rules.
//!
//! Everything here is deterministic:
//! - quantiles use linear interpolation between order statistics (type 7)
//! - even-length medians average the two middle values
//!
//! so fits are reproducible bit-for-bit given the same inputs.

use std::cmp::Ordering;

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Bessel-corrected sample variance (divides by `n - 1`).
///
/// `None` when fewer than two values are given.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (values.len() as f64 - 1.0))
}

/// Bessel-corrected sample standard deviation.
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Sort a copy of `values` ascending (NaNs compare equal, so callers should
/// filter them first).
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

/// Type-7 quantile of an already sorted slice.
///
/// For `n` values and probability `p`, `h = (n - 1) * p` and the result is the
/// linear interpolation between `x[floor(h)]` and `x[ceil(h)]`. `p` is clamped
/// to `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Type-7 quantile of unsorted values.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), p)
}

/// Median; the average of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}
