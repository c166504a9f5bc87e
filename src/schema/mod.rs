//! Schema module - Run configuration, molecule records and reporting types.

mod config;
mod evolution;
mod molecule;

pub use config::*;
pub use evolution::*;
pub use molecule::*;
