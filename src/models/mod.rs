//! Two-component variance model.
//!
//! Models are implemented as small, pure functions so that fitting/curve code can
//! stay generic.

pub mod model;

pub use model::*;
