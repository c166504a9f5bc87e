//! Compute module - Graph capability and the generation engine.

mod graph;
mod labeled;

pub mod evolution;

pub use graph::*;
pub use labeled::*;
