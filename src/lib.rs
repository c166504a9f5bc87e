//! chem-evolve - Evolutionary search over molecular graphs.
//!
//! This crate evolves a population of molecular graphs toward maximal
//! structural diversity or an optimized scalar objective. Each generation
//! mutates and recombines a working library, filters the candidates,
//! optionally scores them, and resamples the library from an ever-growing
//! deduplicated pool.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Run configuration, molecule properties and statistics
//! - `compute`: Graph capability, reference graph backend and the engine
//!
//! # Example
//!
//! ```rust,no_run
//! use chem_evolve::{
//!     compute::evolution::{EvolutionEngine, MaxAtoms, NoObjective},
//!     LabeledGraph, RunConfig,
//! };
//!
//! let mut config = RunConfig::default();
//! config.random_seed = Some(42);
//! config.population.max_generations = 10;
//!
//! let mut engine =
//!     EvolutionEngine::<LabeledGraph, _, _>::new(config, MaxAtoms(12), NoObjective).unwrap();
//! let result = engine.run().unwrap();
//!
//! println!("Pool after {} generations: {}", result.generations, result.pool_size);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{LabeledGraph, MolGraph};
pub use schema::{Molecule, MoleculeProps, RunConfig};
