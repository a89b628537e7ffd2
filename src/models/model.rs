//! Two-component error model evaluation.
//!
//! The model decomposes replicate variance as
//!
//! ```text
//! var(mean) = ssq0 + ssq1 * mean^2
//! ```
//!
//! The fitter relies on two primitive operations:
//! - predict the replicate SD at a given mean (for curves)
//! - score how proportional-noise dominated a point is (for reclassification)

/// Predicted replicate SD at `mean`: `sqrt(ssq1 * mean^2 + ssq0)`.
pub fn predict_sd(mean: f64, ssq0: f64, ssq1: f64) -> f64 {
    (ssq1 * mean * mean + ssq0).sqrt()
}

/// Presence score `sqrt(ssq1)*mean / (sqrt(ssq1)*mean + sqrt(ssq0))`.
///
/// Always in `[0, 1]`. Returns 0 when `ssq1 == 0`, `mean <= 0`, or the
/// denominator is 0.
pub fn presence(mean: f64, ssq0: f64, ssq1: f64) -> f64 {
    if ssq1 == 0.0 || mean <= 0.0 {
        return 0.0;
    }
    let proportional = ssq1.sqrt() * mean;
    let denom = proportional + ssq0.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (proportional / denom).clamp(0.0, 1.0)
}
