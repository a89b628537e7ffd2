//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw inputs (`MeasurementRecord`)
//! - aggregated points and panes (`DataPoint`, `Pane`, `PaneKey`, `Regime`)
//! - fit outputs (`FitResult`, `VarianceComponents`, `CurvePoint`, `FitFailure`)
//! - run configuration (`RunConfig`, `Thresholds`, `SampleConfig`)

pub mod types;

pub use types::*;
