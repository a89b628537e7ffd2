//! Dataset assembly for presentation.
//!
//! - `dataset`: aggregated panes with grid ordering, filtering, and unions
//! - `grid`: the serializable supergroup x condition chart consumed by renderers

pub mod dataset;
pub mod grid;

pub use dataset::*;
pub use grid::*;
