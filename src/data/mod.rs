//! Input side of the pipeline.
//!
//! - `source`: the `DataSource` interface (`records()`) and in-memory sources
//! - `aggregate`: replicate grouping into per-pane points
//! - `sample`: bundled example dataset drawn from a known error model

pub mod aggregate;
pub mod sample;
pub mod source;

pub use aggregate::*;
pub use sample::*;
pub use source::*;
