//! Bundled example dataset: replicate measurements drawn from a known
//! two-component error model.
//!
//! For each pane and entity a true mean `mu` is drawn log-uniformly from
//! `[mean_min, mean_max]`, then every replicate is
//!
//! ```text
//! value = mu * exp(s * z1 - s^2 / 2) + sqrt(ssq0) * z2,    s^2 = ln(1 + ssq1)
//! ```
//!
//! with independent standard normals `z1`, `z2`. The log-normal factor has
//! mean 1 and squared CV `ssq1`, so the replicate variance is
//! `ssq0 + ssq1 * mu^2`.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{MeasurementRecord, SampleConfig};
use crate::error::AppError;

pub fn generate_records(config: &SampleConfig) -> Result<Vec<MeasurementRecord>, AppError> {
    validate(config)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::internal(format!("Noise distribution error: {e}")))?;

    let s2 = config.ssq1.ln_1p();
    let s = s2.sqrt();
    let sigma0 = config.ssq0.sqrt();
    let (ln_lo, ln_hi) = (config.mean_min.ln(), config.mean_max.ln());

    let n_panes = config.supergroups.len() * config.conditions.len();
    let mut records =
        Vec::with_capacity(n_panes * config.entities_per_pane * config.replicates);

    for supergroup in &config.supergroups {
        for condition in &config.conditions {
            for e in 0..config.entities_per_pane {
                let mu = rng.gen_range(ln_lo..=ln_hi).exp();
                let entity = format!("E{:03}", e + 1);
                for _ in 0..config.replicates {
                    let z1 = normal.sample(&mut rng);
                    let z2 = normal.sample(&mut rng);
                    let value = mu * (s * z1 - 0.5 * s2).exp() + sigma0 * z2;
                    records.push(MeasurementRecord::new(
                        supergroup.as_str(),
                        condition.as_str(),
                        entity.as_str(),
                        value,
                    ));
                }
            }
        }
    }

    Ok(records)
}

fn validate(config: &SampleConfig) -> Result<(), AppError> {
    if config.supergroups.is_empty() || config.conditions.is_empty() {
        return Err(AppError::invalid_input(
            "Sample needs at least one supergroup and one condition.",
        ));
    }
    if config.entities_per_pane == 0 {
        return Err(AppError::invalid_input("Sample entity count must be > 0."));
    }
    if config.replicates == 0 {
        return Err(AppError::invalid_input("Sample replicate count must be > 0."));
    }
    if !(config.ssq0.is_finite() && config.ssq0 >= 0.0) {
        return Err(AppError::invalid_input("Sample ssq0 must be finite and >= 0."));
    }
    if !(config.ssq1.is_finite() && config.ssq1 >= 0.0) {
        return Err(AppError::invalid_input("Sample ssq1 must be finite and >= 0."));
    }
    if !(config.mean_min.is_finite()
        && config.mean_max.is_finite()
        && config.mean_min > 0.0
        && config.mean_max > config.mean_min)
    {
        return Err(AppError::invalid_input(
            "Invalid sample mean range (need 0 < mean_min < mean_max).",
        ));
    }
    Ok(())
}
