//! Export per-point and per-pane results to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts. Absent values (no fit, no usable log-variance) are empty cells.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{MeasurementRecord, Pane};
use crate::error::AppError;

const POINT_HEADER: [&str; 9] = [
    "supergroup",
    "condition",
    "entity",
    "n",
    "mean",
    "sd",
    "lvar",
    "is_low_signal",
    "is_high_signal",
];

const PANE_HEADER: [&str; 14] = [
    "supergroup",
    "condition",
    "n_points",
    "n_low",
    "n_high",
    "converged",
    "iterations",
    "failure",
    "ssq0",
    "ssq1",
    "sigma0",
    "cv1",
    "snr",
    "snr_db",
];

/// Write one row per point. Points keep their origin pane, so a combined pane
/// exports with the supergroup/condition each point came from.
pub fn write_points_csv<W: Write>(out: W, panes: &[&Pane]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(POINT_HEADER).map_err(write_err)?;
    for pane in panes {
        for p in &pane.points {
            w.write_record([
                p.origin.supergroup.clone(),
                p.origin.condition.clone(),
                p.entity.clone(),
                p.n.to_string(),
                fmt_f64(p.mean),
                fmt_f64(p.sd),
                p.lvar.map(fmt_f64).unwrap_or_default(),
                p.is_low_signal().to_string(),
                p.is_high_signal().to_string(),
            ])
            .map_err(write_err)?;
        }
    }
    w.flush().map_err(|e| AppError::invalid_input(format!("Failed to write export CSV: {e}")))
}

/// Write one summary row per pane.
pub fn write_panes_csv<W: Write>(out: W, panes: &[&Pane]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(PANE_HEADER).map_err(write_err)?;
    for pane in panes {
        let fit = pane.fit.as_ref();
        let c = fit.and_then(|f| f.components);
        w.write_record([
            pane.key.supergroup.clone(),
            pane.key.condition.clone(),
            pane.points.len().to_string(),
            pane.low_count().to_string(),
            pane.high_count().to_string(),
            fit.map(|f| f.converged.to_string()).unwrap_or_default(),
            fit.map(|f| f.iterations.to_string()).unwrap_or_default(),
            fit.and_then(|f| f.failure).map(|f| f.describe().to_string()).unwrap_or_default(),
            c.map(|c| fmt_f64(c.ssq0)).unwrap_or_default(),
            c.map(|c| fmt_f64(c.ssq1)).unwrap_or_default(),
            c.map(|c| fmt_f64(c.sigma0)).unwrap_or_default(),
            c.map(|c| fmt_f64(c.cv1)).unwrap_or_default(),
            c.map(|c| fmt_f64(c.snr)).unwrap_or_default(),
            c.and_then(|c| c.snr_db()).map(fmt_f64).unwrap_or_default(),
        ])
        .map_err(write_err)?;
    }
    w.flush().map_err(|e| AppError::invalid_input(format!("Failed to write export CSV: {e}")))
}

/// Write raw records in the layout `io::ingest` reads back.
pub fn write_records_csv<W: Write>(out: W, records: &[MeasurementRecord]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(["supergroup", "condition", "entity", "value"])
        .map_err(write_err)?;
    for r in records {
        w.write_record([
            r.supergroup.as_str(),
            r.condition.as_str(),
            r.entity.as_str(),
            fmt_f64(r.value).as_str(),
        ])
        .map_err(write_err)?;
    }
    w.flush().map_err(|e| AppError::invalid_input(format!("Failed to write CSV: {e}")))
}

pub fn export_points(path: &Path, panes: &[&Pane]) -> Result<(), AppError> {
    write_points_csv(create(path)?, panes)
}

pub fn export_panes(path: &Path, panes: &[&Pane]) -> Result<(), AppError> {
    write_panes_csv(create(path)?, panes)
}

pub fn export_records(path: &Path, records: &[MeasurementRecord]) -> Result<(), AppError> {
    write_records_csv(create(path)?, records)
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to create CSV '{}': {e}", path.display())))
}

fn write_err(e: csv::Error) -> AppError {
    AppError::invalid_input(format!("Failed to write CSV row: {e}"))
}

fn fmt_f64(v: f64) -> String {
    // Shortest representation that parses back to the same value.
    format!("{v}")
}
