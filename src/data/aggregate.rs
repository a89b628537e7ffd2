//! Replicate aggregation: raw records -> per-pane `DataPoint`s.
//!
//! Records are grouped by the full (supergroup, condition, entity) key. Groups
//! that cannot produce a point (fewer than two replicates, non-finite summary)
//! are recorded as exclusions rather than silently dropped.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::domain::{DataPoint, MeasurementRecord, PaneKey, Regime};
use crate::math::{mean, sample_sd, sample_variance};

/// Minimum replicate count for a group to become a point.
pub const MIN_REPLICATES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    InsufficientReplicates,
    NonFinite,
}

/// A replicate group that did not become a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedGroup {
    pub key: PaneKey,
    pub entity: String,
    pub n: usize,
    pub reason: ExclusionReason,
}

/// Aggregation output: points per pane plus exclusion diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Points per pane, each list sorted by entity.
    pub panes: BTreeMap<PaneKey, Vec<DataPoint>>,
    pub excluded: Vec<ExcludedGroup>,
    pub groups_seen: usize,
}

impl Aggregation {
    pub fn point_count(&self) -> usize {
        self.panes.values().map(Vec::len).sum()
    }

    pub fn excluded_count(&self, reason: ExclusionReason) -> usize {
        count_excluded(&self.excluded, reason)
    }
}

/// Number of excluded groups with the given reason.
pub fn count_excluded(excluded: &[ExcludedGroup], reason: ExclusionReason) -> usize {
    excluded.iter().filter(|e| e.reason == reason).count()
}

/// Group records by (supergroup, condition, entity) and summarize each group.
pub fn aggregate_replicates(records: &[MeasurementRecord]) -> Aggregation {
    let mut groups: BTreeMap<(PaneKey, &str), Vec<f64>> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.pane_key(), r.entity.as_str()))
            .or_default()
            .push(r.value);
    }

    let mut out = Aggregation {
        groups_seen: groups.len(),
        ..Aggregation::default()
    };

    for ((key, entity), values) in groups {
        match summarize_replicates(&key, entity, &values) {
            Ok(point) => out.panes.entry(key).or_default().push(point),
            Err(reason) => out.excluded.push(ExcludedGroup {
                key,
                entity: entity.to_string(),
                n: values.len(),
                reason,
            }),
        }
    }

    debug!(
        "aggregated {} groups into {} points across {} panes ({} excluded)",
        out.groups_seen,
        out.point_count(),
        out.panes.len(),
        out.excluded.len()
    );

    out
}

/// Summarize one replicate group into a point.
///
/// `lvar` is only computed when every replicate is strictly positive; otherwise
/// (or when it comes out non-finite) it is `None` and the point stays usable for
/// everything except the proportional variance estimate.
pub fn summarize_replicates(
    origin: &PaneKey,
    entity: &str,
    values: &[f64],
) -> Result<DataPoint, ExclusionReason> {
    if values.len() < MIN_REPLICATES {
        return Err(ExclusionReason::InsufficientReplicates);
    }

    let (Some(m), Some(sd)) = (mean(values), sample_sd(values)) else {
        return Err(ExclusionReason::InsufficientReplicates);
    };
    if !(m.is_finite() && sd.is_finite()) {
        return Err(ExclusionReason::NonFinite);
    }

    let lvar = if values.iter().all(|v| *v > 0.0) {
        let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
        sample_variance(&logs).filter(|v| v.is_finite())
    } else {
        None
    };

    Ok(DataPoint {
        origin: origin.clone(),
        entity: entity.to_string(),
        mean: m,
        sd,
        lvar,
        n: values.len(),
        regime: Regime::Mid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(sg: &str, cond: &str, entity: &str, value: f64) -> MeasurementRecord {
        MeasurementRecord::new(sg, cond, entity, value)
    }

    #[test]
    fn groups_by_full_key_and_computes_sample_sd() {
        let records = vec![
            rec("A", "Control", "g1", 2.0),
            rec("A", "Control", "g1", 4.0),
            rec("A", "Control", "g1", 6.0),
            rec("A", "Treat", "g1", 10.0),
            rec("A", "Treat", "g1", 14.0),
            rec("B", "Control", "g1", 1.0),
            rec("B", "Control", "g1", 1.0),
        ];
        let agg = aggregate_replicates(&records);
        assert_eq!(agg.groups_seen, 3);
        assert_eq!(agg.panes.len(), 3);

        let ctrl = &agg.panes[&PaneKey::new("A", "Control")][0];
        assert_eq!(ctrl.n, 3);
        assert!((ctrl.mean - 4.0).abs() < 1e-12);
        // deviations 4+0+4 over n-1 = 2 -> variance 4
        assert!((ctrl.sd - 2.0).abs() / 2.0 < 1e-9);

        let treat = &agg.panes[&PaneKey::new("A", "Treat")][0];
        assert!((treat.sd - 8.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(treat.regime, Regime::Mid);
    }

    #[test]
    fn single_replicates_are_excluded_and_counted() {
        let records = vec![
            rec("A", "Control", "g1", 1.0),
            rec("A", "Control", "g2", 3.0),
            rec("A", "Control", "g2", 5.0),
        ];
        let agg = aggregate_replicates(&records);
        assert_eq!(agg.point_count(), 1);
        assert_eq!(agg.excluded.len(), 1);
        assert_eq!(agg.excluded[0].entity, "g1");
        assert_eq!(agg.excluded[0].n, 1);
        assert_eq!(
            agg.excluded_count(ExclusionReason::InsufficientReplicates),
            1
        );
    }

    #[test]
    fn non_finite_values_are_excluded() {
        let records = vec![
            rec("A", "Control", "g1", f64::INFINITY),
            rec("A", "Control", "g1", 1.0),
        ];
        let agg = aggregate_replicates(&records);
        assert_eq!(agg.point_count(), 0);
        assert_eq!(agg.excluded_count(ExclusionReason::NonFinite), 1);
    }

    #[test]
    fn lvar_requires_positive_replicates() {
        let key = PaneKey::new("A", "Control");
        let p = summarize_replicates(&key, "g1", &[-1.0, 2.0, 3.0]).unwrap();
        assert!(p.lvar.is_none());
        assert!(p.mean.is_finite());

        let q = summarize_replicates(&key, "g2", &[1.0, std::f64::consts::E]).unwrap();
        // logs are 0 and 1 -> sample variance 0.5
        assert!((q.lvar.unwrap() - 0.5).abs() < 1e-12);

        let flat = summarize_replicates(&key, "g3", &[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(flat.sd, 0.0);
        assert_eq!(flat.lvar, Some(0.0));
        assert!(flat.usable_lvar().is_none());
    }

    #[test]
    fn points_are_sorted_by_entity_within_pane() {
        let records = vec![
            rec("A", "Control", "zeta", 1.0),
            rec("A", "Control", "zeta", 2.0),
            rec("A", "Control", "alpha", 1.0),
            rec("A", "Control", "alpha", 2.0),
        ];
        let agg = aggregate_replicates(&records);
        let names: Vec<&str> = agg.panes[&PaneKey::new("A", "Control")]
            .iter()
            .map(|p| p.entity.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
