//! Error model fitting.
//!
//! Responsibilities:
//!
//! - classify points into low/mid/high signal regimes (`classifier`)
//! - iterate the two-component fit to a stable classification (`fitter`)
//! - sample the fitted SD curve (`curve`)
//! - memoize pane fits per parameter set and fit panes in parallel (`cache`, `session`)

pub mod cache;
pub mod classifier;
pub mod curve;
pub mod fitter;
pub mod session;

pub use cache::*;
pub use classifier::*;
pub use curve::*;
pub use fitter::*;
pub use session::*;
