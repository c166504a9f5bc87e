//! Error types of the generation engine.

use crate::compute::{ExchangeError, RecombineError, ValidationError};
use crate::schema::ConfigError;

/// A single mutation or crossover attempt failed. Always recovered by the
/// orchestrator and counted; never aborts a generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutateFail {
    #[error("Edit produced an invalid graph: {0}")]
    Invalid(#[from] ValidationError),
    #[error("Recombination failed: {0}")]
    Recombine(#[from] RecombineError),
    #[error("No operator committed an edit")]
    NoMutation,
}

/// The objective adapter could not evaluate a batch.
#[derive(Debug, thiserror::Error)]
#[error("Objective evaluation failed: {0}")]
pub struct ObjectiveError(pub String);

/// Engine-level errors. Only configuration problems and broken invariants
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid seed molecule: {0}")]
    Seed(#[from] ExchangeError),
    #[error("Molecule at position {0} has no canonical identity")]
    MissingCanonicalId(usize),
    #[error(transparent)]
    Objective(#[from] ObjectiveError),
    #[error("Checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checkpoint format error: {0}")]
    Format(#[from] serde_json::Error),
}
