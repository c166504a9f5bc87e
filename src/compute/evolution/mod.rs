//! Generation engine for evolving molecular graphs.
//!
//! The engine evolves a library of molecules toward structural diversity or
//! an optimized objective. Every generation runs the same linear pipeline
//! over an exclusive working set.
//!
//! # Overview
//!
//! - **Operator Cascade** (`cascade`): at most one structural edit per call
//! - **Crossover** (`crossover`): recombine two parents into one candidate
//! - **Finalizer** (`finalize`): sanitize and refresh canonical identity
//! - **Deduplicator** (`dedup`): merge molecules sharing an identity
//! - **Population Manager** (`population`): pool extension and library sampling
//! - **Adapters** (`adapters`): filter and objective seams
//! - **Orchestrator** (`search`): the generation loop
//! - **Checkpoint** (`archive`): restart files
//!
//! # Example
//!
//! ```rust,no_run
//! use chem_evolve::compute::LabeledGraph;
//! use chem_evolve::compute::evolution::{AcceptAll, EvolutionEngine, NoObjective};
//! use chem_evolve::schema::RunConfig;
//!
//! let config = RunConfig::default();
//! let mut engine =
//!     EvolutionEngine::<LabeledGraph, _, _>::new(config, AcceptAll, NoObjective).unwrap();
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!("Generation {}: pool {}", progress.generation, progress.pool_size);
//!     })
//!     .unwrap();
//!
//! println!("Stopped: {:?}", result.stop_reason);
//! ```

mod adapters;
mod archive;
mod cascade;
mod context;
mod crossover;
mod dedup;
mod error;
mod finalize;
mod population;
mod search;

pub use adapters::{
    AcceptAll, CachedObjective, CandidateFilter, FilterOutcome, FilterVerdict, MaxAtoms,
    NoObjective, ObjectiveEvaluator, Predictor,
};
pub use archive::{CHECKPOINT_FILE, Checkpoint, MoleculeRecord};
pub use cascade::{CascadeOutcome, Gate, mutate};
pub use context::RunContext;
pub use crossover::crossover;
pub use dedup::remove_duplicates;
pub use error::{EvolutionError, MutateFail, ObjectiveError};
pub use finalize::{finalize, is_sane};
pub use population::{best_objective, extend_pool, rank_by_objective, select_library};
pub use search::EvolutionEngine;
