//! Mathematical utilities: means, sample variances, quantiles, medians.

pub mod stats;

pub use stats::*;
