//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - point/pane/record CSV exports (`export`)
//! - chart JSON read/write (`chart_json`)

pub mod chart_json;
pub mod export;
pub mod ingest;

pub use chart_json::*;
pub use export::*;
pub use ingest::*;
