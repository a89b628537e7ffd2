//! The presentation-ready grid: supergroup rows x condition columns.
//!
//! This is the structure handed to renderers and exporters. It is serializable
//! so a chart can be written out and later reloaded for a re-fit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chart::dataset::Dataset;
use crate::data::aggregate::ExcludedGroup;
use crate::domain::{Pane, Thresholds};
use crate::fit::cache::FitParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub thresholds: Thresholds,
    pub fit_enabled: bool,
    pub supergroups: Vec<String>,
    pub conditions: Vec<String>,
    /// `cells[row][col]` for `supergroups[row]` x `conditions[col]`; `None` for
    /// combinations with no points.
    pub cells: Vec<Vec<Option<Pane>>>,
    /// Union fit over all grid panes, when requested.
    #[serde(default)]
    pub combined: Option<Pane>,
    #[serde(default)]
    pub excluded: Vec<ExcludedGroup>,
}

impl ChartDataset {
    /// Place fitted panes into the dataset's grid.
    pub fn assemble(
        dataset: &Dataset,
        panes: Vec<Pane>,
        combined: Option<Pane>,
        params: FitParams,
    ) -> Self {
        let mut cells: Vec<Vec<Option<Pane>>> =
            vec![vec![None; dataset.conditions.len()]; dataset.supergroups.len()];
        for pane in panes {
            let row = dataset.supergroups.iter().position(|s| *s == pane.key.supergroup);
            let col = dataset.conditions.iter().position(|c| *c == pane.key.condition);
            if let (Some(row), Some(col)) = (row, col) {
                cells[row][col] = Some(pane);
            }
        }

        Self {
            tool: "cv".to_string(),
            generated_at: Utc::now(),
            thresholds: params.thresholds,
            fit_enabled: params.fit_enabled,
            supergroups: dataset.supergroups.clone(),
            conditions: dataset.conditions.clone(),
            cells,
            combined,
            excluded: dataset.excluded.clone(),
        }
    }

    pub fn params(&self) -> FitParams {
        FitParams {
            thresholds: self.thresholds,
            fit_enabled: self.fit_enabled,
        }
    }

    pub fn cell(&self, supergroup: &str, condition: &str) -> Option<&Pane> {
        let row = self.supergroups.iter().position(|s| s == supergroup)?;
        let col = self.conditions.iter().position(|c| c == condition)?;
        self.cells.get(row)?.get(col)?.as_ref()
    }

    /// Grid panes in row-major order (empty cells skipped).
    pub fn panes(&self) -> impl Iterator<Item = &Pane> {
        self.cells.iter().flatten().flatten()
    }

    /// Grid panes followed by the combined pane, if any.
    pub fn all_panes(&self) -> impl Iterator<Item = &Pane> {
        self.panes().chain(self.combined.iter())
    }
}
