//! CSV ingest: one row per replicate measurement.
//!
//! Header names are matched case-insensitively (after trimming and stripping a
//! UTF-8 BOM). Rows that cannot be parsed are collected as `RowError`s and
//! skipped; only schema problems (missing columns, unreadable file) are fatal.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::{info, warn};

use crate::data::source::DataSource;
use crate::domain::{ColumnNames, DEFAULT_SUPERGROUP, MeasurementRecord};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub entity: Option<String>,
    pub message: String,
}

/// Ingest output: parsed records + row errors.
#[derive(Debug, Clone, Default)]
pub struct CsvIngest {
    pub records: Vec<MeasurementRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load records from a CSV file.
pub fn load_records(path: &Path, columns: &ColumnNames) -> Result<CsvIngest, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_records(file, columns)
}

/// Parse records from any CSV reader.
pub fn read_records<R: Read>(input: R, columns: &ColumnNames) -> Result<CsvIngest, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::invalid_input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let layout = ColumnLayout::resolve(columns, &header_map)?;

    let mut out = CsvIngest::default();
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.row_errors.push(RowError {
                    line,
                    entity: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match layout.parse_row(&record) {
            Ok(r) => out.records.push(r),
            Err((entity, message)) => out.row_errors.push(RowError {
                line,
                entity,
                message,
            }),
        }
    }

    Ok(out)
}

/// Column indexes resolved against a file's header.
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    supergroup: Option<usize>,
    condition: usize,
    entity: usize,
    value: usize,
}

impl ColumnLayout {
    fn resolve(columns: &ColumnNames, header_map: &HashMap<String, usize>) -> Result<Self, AppError> {
        let required = |name: &str| {
            header_map
                .get(&normalize_header_name(name))
                .copied()
                .ok_or_else(|| AppError::invalid_input(format!("Missing required column: `{name}`")))
        };
        Ok(Self {
            supergroup: header_map.get(&normalize_header_name(&columns.supergroup)).copied(),
            condition: required(&columns.condition)?,
            entity: required(&columns.entity)?,
            value: required(&columns.value)?,
        })
    }

    fn parse_row(&self, record: &StringRecord) -> Result<MeasurementRecord, (Option<String>, String)> {
        let entity = get_field(record, self.entity)
            .ok_or_else(|| (None, "Missing required value: `entity`".to_string()))?
            .to_string();
        let fail = |message: String| (Some(entity.clone()), message);

        let condition = get_field(record, self.condition)
            .ok_or_else(|| fail("Missing required value: `condition`".to_string()))?;
        let supergroup = self
            .supergroup
            .and_then(|idx| get_field(record, idx))
            .unwrap_or(DEFAULT_SUPERGROUP);
        let raw = get_field(record, self.value)
            .ok_or_else(|| fail("Missing required value: `value`".to_string()))?;
        let value = raw
            .parse::<f64>()
            .map_err(|_| fail(format!("Invalid value '{raw}'")))?;
        if !value.is_finite() {
            return Err(fail(format!("Non-finite value '{raw}'")));
        }

        Ok(MeasurementRecord::new(supergroup, condition, entity.as_str(), value))
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_field(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// A CSV file as a `DataSource`. Row errors are logged and skipped.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub columns: ColumnNames,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, columns: ColumnNames) -> Self {
        Self {
            path: path.into(),
            columns,
        }
    }
}

impl DataSource for CsvSource {
    fn describe(&self) -> String {
        format!("csv '{}'", self.path.display())
    }

    fn records(&self) -> Result<Vec<MeasurementRecord>, AppError> {
        let ingest = load_records(&self.path, &self.columns)?;
        for e in &ingest.row_errors {
            warn!(
                "line {}{}: {}",
                e.line,
                e.entity.as_deref().map(|id| format!(" ({id})")).unwrap_or_default(),
                e.message
            );
        }
        info!(
            "read {} row(s) from {}, {} skipped",
            ingest.rows_read,
            self.describe(),
            ingest.row_errors.len()
        );
        if ingest.records.is_empty() && !ingest.row_errors.is_empty() {
            return Err(AppError::invalid_input(format!(
                "All {} row(s) in {} failed to parse.",
                ingest.rows_read,
                self.describe()
            )));
        }
        Ok(ingest.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<CsvIngest, AppError> {
        read_records(text.as_bytes(), &ColumnNames::default())
    }

    #[test]
    fn reads_rows_with_bom_and_mixed_case_headers() {
        let text = "\u{feff}Supergroup, CONDITION ,Entity,Value\nA,Control,g1,1.5\nA,Control,g1,2.5\nB,Treat,g2,3\n";
        let out = parse(text).unwrap();
        assert_eq!(out.rows_read, 3);
        assert!(out.row_errors.is_empty());
        assert_eq!(out.records[0], MeasurementRecord::new("A", "Control", "g1", 1.5));
        assert_eq!(out.records[2], MeasurementRecord::new("B", "Treat", "g2", 3.0));
    }

    #[test]
    fn supergroup_column_is_optional() {
        let out = parse("condition,entity,value\nControl,g1,1\n").unwrap();
        assert_eq!(out.records[0].supergroup, DEFAULT_SUPERGROUP);

        // Present column, blank cell.
        let out = parse("supergroup,condition,entity,value\n,Control,g1,1\n").unwrap();
        assert_eq!(out.records[0].supergroup, DEFAULT_SUPERGROUP);
    }

    #[test]
    fn bad_rows_become_row_errors() {
        let text = "condition,entity,value\nControl,g1,1\nControl,g2,abc\nControl,,2\nControl,g3,NaN\nControl,g4\n";
        let out = parse(text).unwrap();
        assert_eq!(out.rows_read, 5);
        assert_eq!(out.records.len(), 1);
        let lines: Vec<usize> = out.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
        assert_eq!(out.row_errors[0].entity.as_deref(), Some("g2"));
        assert_eq!(out.row_errors[1].entity, None);
        assert!(out.row_errors[2].message.contains("Non-finite"));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let err = parse("condition,entity\nControl,g1\n").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_INPUT);
        assert!(err.message().contains("`value`"));
    }

    #[test]
    fn column_names_can_be_overridden() {
        let columns = ColumnNames {
            supergroup: "batch".to_string(),
            condition: "Group".to_string(),
            entity: "gene".to_string(),
            value: "intensity".to_string(),
        };
        let text = "gene,group,batch,intensity\nTP53,Treat,b1,10\n";
        let out = read_records(text.as_bytes(), &columns).unwrap();
        assert_eq!(out.records, vec![MeasurementRecord::new("b1", "Treat", "TP53", 10.0)]);
    }

    #[test]
    fn header_only_file_has_no_records() {
        let out = parse("condition,entity,value\n").unwrap();
        assert_eq!(out.rows_read, 0);
        assert!(out.records.is_empty());
    }

    #[test]
    fn csv_source_reads_file() {
        let path = std::env::temp_dir().join(format!("cv_ingest_{}.csv", std::process::id()));
        std::fs::write(&path, "condition,entity,value\nControl,g1,1\nControl,g1,x\n").unwrap();
        let source = CsvSource::new(&path, ColumnNames::default());
        let records = source.records().unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(records.len(), 1);

        let missing = CsvSource::new(std::env::temp_dir().join("cv_ingest_missing.csv"), ColumnNames::default());
        assert_eq!(missing.records().unwrap_err().exit_code(), crate::error::EXIT_INVALID_INPUT);
    }

    #[test]
    fn unparseable_file_is_invalid_input_but_header_only_is_empty() {
        let dir = std::env::temp_dir();
        let tag = std::process::id();

        let bad = dir.join(format!("cv_ingest_bad_{tag}.csv"));
        std::fs::write(&bad, "condition,entity,value\nControl,g1,x\nControl,,1\n").unwrap();
        let err = CsvSource::new(&bad, ColumnNames::default()).records().unwrap_err();
        let _ = std::fs::remove_file(&bad);
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_INPUT);
        assert!(err.message().contains("All 2 row(s)"));

        let empty = dir.join(format!("cv_ingest_empty_{tag}.csv"));
        std::fs::write(&empty, "condition,entity,value\n").unwrap();
        let records = CsvSource::new(&empty, ColumnNames::default()).records().unwrap();
        let _ = std::fs::remove_file(&empty);
        assert!(records.is_empty());
    }
}
