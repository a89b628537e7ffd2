//! Narrow input interface: anything that can hand over `MeasurementRecord`s.
//!
//! The pipeline only ever calls `records()`. A source must report fetch/parse
//! failures as `Err`, and "nothing there" as `Ok(vec![])`; the pipeline turns
//! the latter into a distinct "no data" error.

use crate::data::sample::generate_records;
use crate::domain::{DEFAULT_SUPERGROUP, MeasurementRecord, SampleConfig};
use crate::error::AppError;

pub trait DataSource {
    /// Short human-readable description for logs and report headers.
    fn describe(&self) -> String;

    fn records(&self) -> Result<Vec<MeasurementRecord>, AppError>;
}

/// Column-oriented records (one vector per field), as produced by tabular hosts.
///
/// All supplied columns must have the same length. A missing supergroup column
/// puts every record into `DEFAULT_SUPERGROUP`.
#[derive(Debug, Clone, Default)]
pub struct ColumnSource {
    pub supergroups: Option<Vec<String>>,
    pub conditions: Vec<String>,
    pub entities: Vec<String>,
    pub values: Vec<f64>,
}

impl DataSource for ColumnSource {
    fn describe(&self) -> String {
        format!("columns ({} rows)", self.values.len())
    }

    fn records(&self) -> Result<Vec<MeasurementRecord>, AppError> {
        let n = self.values.len();
        let mut lengths = vec![
            ("condition", self.conditions.len()),
            ("entity", self.entities.len()),
        ];
        if let Some(sg) = &self.supergroups {
            lengths.push(("supergroup", sg.len()));
        }
        for (name, len) in lengths {
            if len != n {
                return Err(AppError::invalid_input(format!(
                    "Column length mismatch: `{name}` has {len} rows but `value` has {n}."
                )));
            }
        }

        Ok((0..n)
            .map(|i| MeasurementRecord {
                supergroup: self
                    .supergroups
                    .as_ref()
                    .map(|sg| sg[i].clone())
                    .unwrap_or_else(|| DEFAULT_SUPERGROUP.to_string()),
                condition: self.conditions[i].clone(),
                entity: self.entities[i].clone(),
                value: self.values[i],
            })
            .collect())
    }
}

/// The bundled example dataset (used when no input is supplied).
#[derive(Debug, Clone, Default)]
pub struct SampleSource {
    pub config: SampleConfig,
}

impl DataSource for SampleSource {
    fn describe(&self) -> String {
        format!(
            "bundled sample (seed={}, ssq0={}, ssq1={})",
            self.config.seed, self.config.ssq0, self.config.ssq1
        )
    }

    fn records(&self) -> Result<Vec<MeasurementRecord>, AppError> {
        generate_records(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_source_builds_records() {
        let src = ColumnSource {
            supergroups: None,
            conditions: vec!["Control".into(), "Treat".into()],
            entities: vec!["g1".into(), "g1".into()],
            values: vec![1.5, 2.5],
        };
        let records = src.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].supergroup, DEFAULT_SUPERGROUP);
        assert_eq!(records[1].condition, "Treat");
        assert_eq!(records[1].value, 2.5);
    }

    #[test]
    fn column_source_rejects_length_mismatch() {
        let src = ColumnSource {
            supergroups: Some(vec!["A".into()]),
            conditions: vec!["Control".into(), "Control".into()],
            entities: vec!["g1".into(), "g2".into()],
            values: vec![1.0, 2.0],
        };
        let err = src.records().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_INPUT);
        assert!(err.message().contains("supergroup"));
    }

    #[test]
    fn empty_column_source_is_ok_and_empty() {
        let src = ColumnSource::default();
        assert!(src.records().unwrap().is_empty());
    }
}
