//! The aggregated dataset: points per pane plus grid ordering.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::aggregate::{Aggregation, ExcludedGroup, ExclusionReason, aggregate_replicates, count_excluded};
use crate::domain::{CONTROL_CONDITION, DataPoint, MeasurementRecord, Pane, PaneKey};
use crate::error::AppError;

/// Key used for a combined view over several panes.
pub const COMBINED_LABEL: &str = "Combined";

/// Aggregated points keyed by pane, with the grid's row/column order.
///
/// Built once per raw-data load; fitting never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub panes: BTreeMap<PaneKey, Vec<DataPoint>>,
    /// Grid rows, sorted alphabetically.
    pub supergroups: Vec<String>,
    /// Grid columns, `Control` first then alphabetical.
    pub conditions: Vec<String>,
    pub excluded: Vec<ExcludedGroup>,
    pub groups_seen: usize,
}

impl Dataset {
    /// Aggregate raw records into a dataset.
    ///
    /// Zero records, or records that all fail aggregation, are a "no data" error.
    pub fn from_records(records: &[MeasurementRecord]) -> Result<Self, AppError> {
        if records.is_empty() {
            return Err(AppError::no_data("No measurement records were supplied."));
        }
        Self::from_aggregation(aggregate_replicates(records))
    }

    pub fn from_aggregation(agg: Aggregation) -> Result<Self, AppError> {
        if agg.panes.is_empty() {
            return Err(AppError::no_data(format!(
                "No replicate group has at least 2 finite replicates ({} groups excluded).",
                agg.excluded.len()
            )));
        }
        let (supergroups, conditions) = grid_axes(agg.panes.keys());
        Ok(Self {
            panes: agg.panes,
            supergroups,
            conditions,
            excluded: agg.excluded,
            groups_seen: agg.groups_seen,
        })
    }

    /// Rebuild a dataset from previously exported panes (points keep their flags).
    pub fn from_panes(panes: Vec<Pane>, excluded: Vec<ExcludedGroup>) -> Result<Self, AppError> {
        let mut map = BTreeMap::new();
        for pane in panes {
            if pane.points.is_empty() {
                continue;
            }
            if map.insert(pane.key.clone(), pane.points).is_some() {
                return Err(AppError::invalid_input(format!("Duplicate pane: {}", pane.key)));
            }
        }
        let groups_seen = map.values().map(Vec::len).sum::<usize>() + excluded.len();
        Self::from_aggregation(Aggregation {
            panes: map,
            excluded,
            groups_seen,
        })
    }

    pub fn point_count(&self) -> usize {
        self.panes.values().map(Vec::len).sum()
    }

    pub fn excluded_count(&self, reason: ExclusionReason) -> usize {
        count_excluded(&self.excluded, reason)
    }

    pub fn points(&self, key: &PaneKey) -> Option<&[DataPoint]> {
        self.panes.get(key).map(Vec::as_slice)
    }

    /// Pane keys in grid order (row-major: supergroup, then condition).
    pub fn ordered_keys(&self) -> Vec<PaneKey> {
        let mut out = Vec::with_capacity(self.panes.len());
        for sg in &self.supergroups {
            for cond in &self.conditions {
                let key = PaneKey::new(sg.as_str(), cond.as_str());
                if self.panes.contains_key(&key) {
                    out.push(key);
                }
            }
        }
        out
    }

    /// Keep only panes matching the given supergroup/condition (exact match).
    pub fn filtered(&self, supergroup: Option<&str>, condition: Option<&str>) -> Result<Self, AppError> {
        let panes: BTreeMap<PaneKey, Vec<DataPoint>> = self
            .panes
            .iter()
            .filter(|(k, _)| supergroup.is_none_or(|sg| k.supergroup == sg))
            .filter(|(k, _)| condition.is_none_or(|c| k.condition == c))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if panes.is_empty() {
            return Err(AppError::invalid_input(format!(
                "No pane matches supergroup={} condition={}.",
                supergroup.unwrap_or("*"),
                condition.unwrap_or("*")
            )));
        }
        let excluded: Vec<ExcludedGroup> = self
            .excluded
            .iter()
            .filter(|e| panes.contains_key(&e.key))
            .cloned()
            .collect();
        let (supergroups, conditions) = grid_axes(panes.keys());
        Ok(Self {
            groups_seen: panes.values().map(Vec::len).sum::<usize>() + excluded.len(),
            panes,
            supergroups,
            conditions,
            excluded,
        })
    }

    /// Union of the given panes' points, in key order. Each point keeps its origin.
    pub fn combined_points(&self, keys: &[PaneKey]) -> Vec<DataPoint> {
        keys.iter()
            .filter_map(|k| self.panes.get(k))
            .flat_map(|pts| pts.iter().cloned())
            .collect()
    }
}

/// Distinct supergroups (sorted) and conditions (`Control` first) of the keys.
pub fn grid_axes<'a>(keys: impl Iterator<Item = &'a PaneKey>) -> (Vec<String>, Vec<String>) {
    let mut supergroups = BTreeSet::new();
    let mut conditions = BTreeSet::new();
    for k in keys {
        supergroups.insert(k.supergroup.clone());
        conditions.insert(k.condition.clone());
    }
    (
        supergroups.into_iter().collect(),
        order_conditions(conditions),
    )
}

/// Order condition labels: literally `Control` first, the rest alphabetically.
pub fn order_conditions(conditions: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = conditions.into_iter().collect();
    out.sort_by(|a, b| {
        (a != CONTROL_CONDITION)
            .cmp(&(b != CONTROL_CONDITION))
            .then_with(|| a.cmp(b))
    });
    out.dedup();
    out
}
