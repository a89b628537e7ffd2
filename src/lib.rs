//! `cv-curves` library crate.
//!
//! The binary (`cv`) is a thin wrapper around this library so that:
//!
//! - the aggregation and fitting core is testable without spawning processes
//! - hosts other than the CLI can feed records through `data::DataSource`
//!   and consume `chart::ChartDataset`
//!
//! Pipeline: records -> `data::aggregate` -> `chart::Dataset` ->
//! `fit::FitSession` (per-pane two-component fits) -> `chart::ChartDataset`.

pub mod app;
pub mod chart;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
