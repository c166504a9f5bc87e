//! Run configuration for the evolutionary search.
//!
//! Every component reads its settings from an explicit section of
//! [`RunConfig`]; the whole structure is loaded once from JSON and validated
//! before the first generation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Trial probabilities of the six mutation gates.
    #[serde(default)]
    pub operators: OperatorRates,
    /// Library size, crossover/mutation counts and edge window.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Objective optimization settings.
    #[serde(default)]
    pub objective: ObjectiveConfig,
    /// Starting library and pool.
    #[serde(default)]
    pub seeds: SeedConfig,
    /// Stock filter settings.
    #[serde(default)]
    pub filters: FilterConfig,
    /// Checkpoint directory and restart flag.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Trial probabilities for the operator cascade, tested in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRates {
    /// Re-type an existing bond.
    #[serde(default = "default_bond_flip")]
    pub bond_flip: f64,
    /// Re-type an atom in place.
    #[serde(default = "default_atom_flip")]
    pub atom_flip: f64,
    /// Add a bond, closing a ring or adding connectivity.
    #[serde(default = "default_ring_add")]
    pub ring_add: f64,
    /// Remove a bond shared by every ring.
    #[serde(default = "default_ring_remove")]
    pub ring_remove: f64,
    /// Attach or insert a new atom.
    #[serde(default = "default_atom_add")]
    pub atom_add: f64,
    /// Remove a removable atom.
    #[serde(default = "default_atom_remove")]
    pub atom_remove: f64,
    /// Treat "no gate fired" as a failed mutation instead of passing the
    /// candidate through unchanged.
    #[serde(default)]
    pub fail_on_no_mutation: bool,
}

impl Default for OperatorRates {
    fn default() -> Self {
        Self {
            bond_flip: default_bond_flip(),
            atom_flip: default_atom_flip(),
            ring_add: default_ring_add(),
            ring_remove: default_ring_remove(),
            atom_add: default_atom_add(),
            atom_remove: default_atom_remove(),
            fail_on_no_mutation: false,
        }
    }
}

impl OperatorRates {
    /// All gates closed. Useful for pinning down a single operator.
    pub fn closed() -> Self {
        Self {
            bond_flip: 0.0,
            atom_flip: 0.0,
            ring_add: 0.0,
            ring_remove: 0.0,
            atom_add: 0.0,
            atom_remove: 0.0,
            fail_on_no_mutation: false,
        }
    }

    fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("bond_flip", self.bond_flip),
            ("atom_flip", self.atom_flip),
            ("ring_add", self.ring_add),
            ("ring_remove", self.ring_remove),
            ("atom_add", self.atom_add),
            ("atom_remove", self.atom_remove),
        ]
    }
}

fn default_bond_flip() -> f64 {
    0.8
}
fn default_atom_flip() -> f64 {
    0.8
}
fn default_ring_add() -> f64 {
    0.1
}
fn default_ring_remove() -> f64 {
    0.2
}
fn default_atom_add() -> f64 {
    0.5
}
fn default_atom_remove() -> f64 {
    0.8
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Maximum library size after selection.
    #[serde(default = "default_subset_size")]
    pub subset_size: usize,
    /// Crossover attempts per generation.
    #[serde(default = "default_n_cross")]
    pub n_cross: usize,
    /// Cascade mutation attempts per generation.
    #[serde(default = "default_n_mut")]
    pub n_mut: usize,
    /// Fraction of attempts that draw a parent from the edge window.
    #[serde(default = "default_edge_ratio")]
    pub edge_ratio: f64,
    /// Length of the leading library slice used as the edge window.
    #[serde(default)]
    pub edge_len: usize,
    /// Number of generations to run.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            subset_size: default_subset_size(),
            n_cross: default_n_cross(),
            n_mut: default_n_mut(),
            edge_ratio: default_edge_ratio(),
            edge_len: 0,
            max_generations: default_max_generations(),
        }
    }
}

fn default_subset_size() -> usize {
    50
}
fn default_n_cross() -> usize {
    10
}
fn default_n_mut() -> usize {
    40
}
fn default_edge_ratio() -> f64 {
    0.1
}
fn default_max_generations() -> usize {
    20
}

/// Objective optimization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveConfig {
    /// Run the objective stage. Without it the search is pure diversity.
    #[serde(default)]
    pub optimize: bool,
    /// Minimize instead of maximize.
    #[serde(default)]
    pub minimize: bool,
    /// Drop molecules whose evaluation fails.
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
    /// Stop once the best objective reaches this value.
    #[serde(default)]
    pub target: Option<f64>,
    /// Fraction of unseen molecules physically evaluated after the
    /// prediction pre-pass. `None` evaluates everything.
    #[serde(default)]
    pub predict_fraction: Option<f64>,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            optimize: false,
            minimize: false,
            mandatory: default_mandatory(),
            target: None,
            predict_fraction: None,
        }
    }
}

impl ObjectiveConfig {
    /// True when `a` is a better objective value than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if self.minimize { a < b } else { a > b }
    }
}

fn default_mandatory() -> bool {
    true
}

/// Starting library and pool, as exchange strings understood by the graph
/// backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Library seeds. Empty selects the built-in presets.
    #[serde(default)]
    pub library: Vec<String>,
    /// Extra molecules added to the starting pool.
    #[serde(default)]
    pub pool: Vec<String>,
    /// Keep only the first `n_seed` library seeds.
    #[serde(default)]
    pub n_seed: Option<usize>,
}

/// Stock filter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Reject molecules with more atoms than this.
    #[serde(default)]
    pub max_atoms: Option<usize>,
}

/// Checkpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory receiving the checkpoint after every generation.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Resume from the checkpoint in `dir`.
    #[serde(default)]
    pub restart: bool,
}

/// Fatal configuration errors, reported before the first generation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Operator probability {name} = {value} is outside [0, 1]")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Edge ratio {0} is outside [0, 1]")]
    InvalidEdgeRatio(f64),
    #[error("Subset size must be positive")]
    EmptySubset,
    #[error("Predict fraction {0} is outside (0, 1]")]
    InvalidPredictFraction(f64),
    #[error("Seed library is empty")]
    EmptySeedLibrary,
    #[error("Starting library has {len} molecules, more than subset size {subset_size} + edge length {edge_len}")]
    LibraryTooLarge {
        len: usize,
        subset_size: usize,
        edge_len: usize,
    },
    #[error("Restart requested but no checkpoint directory is configured")]
    RestartWithoutCheckpoint,
}

impl RunConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.operators.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }

        if self.population.subset_size == 0 {
            return Err(ConfigError::EmptySubset);
        }

        let ratio = self.population.edge_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::InvalidEdgeRatio(ratio));
        }

        if let Some(fraction) = self.objective.predict_fraction
            && !(fraction > 0.0 && fraction <= 1.0)
        {
            return Err(ConfigError::InvalidPredictFraction(fraction));
        }

        if self.checkpoint.restart && self.checkpoint.dir.is_none() {
            return Err(ConfigError::RestartWithoutCheckpoint);
        }

        Ok(())
    }

    /// Check the starting library size against the subset bound.
    pub fn check_library_len(&self, len: usize) -> Result<(), ConfigError> {
        if len == 0 {
            return Err(ConfigError::EmptySeedLibrary);
        }
        let subset_size = self.population.subset_size;
        let edge_len = self.population.edge_len;
        if len > subset_size + edge_len {
            return Err(ConfigError::LibraryTooLarge {
                len,
                subset_size,
                edge_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.operators.bond_flip, 0.8);
        assert_eq!(config.population.edge_len, 0);
    }

    #[test]
    fn test_probability_out_of_range() {
        let mut config = RunConfig::default();
        config.operators.ring_remove = 1.5;
        match config.validate() {
            Err(ConfigError::InvalidProbability { name, .. }) => assert_eq!(name, "ring_remove"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_library_bound() {
        let mut config = RunConfig::default();
        config.population.subset_size = 4;
        config.population.edge_len = 1;
        assert!(config.check_library_len(5).is_ok());
        assert!(matches!(
            config.check_library_len(6),
            Err(ConfigError::LibraryTooLarge { len: 6, .. })
        ));
        assert!(matches!(
            config.check_library_len(0),
            Err(ConfigError::EmptySeedLibrary)
        ));
    }

    #[test]
    fn test_restart_needs_dir() {
        let mut config = RunConfig::default();
        config.checkpoint.restart = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RestartWithoutCheckpoint)
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "population": { "subset_size": 5 }, "random_seed": 42 }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.population.subset_size, 5);
        assert_eq!(config.population.n_mut, 40);
        assert_eq!(config.operators.atom_remove, 0.8);
        assert_eq!(config.random_seed, Some(42));
        assert!(config.objective.mandatory);
    }

    #[test]
    fn test_is_better() {
        let mut objective = ObjectiveConfig::default();
        assert!(objective.is_better(2.0, 1.0));
        objective.minimize = true;
        assert!(objective.is_better(1.0, 2.0));
    }
}
