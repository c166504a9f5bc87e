//! Run checkpoints for restarting an interrupted search.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use super::error::EvolutionError;
use super::finalize::finalize;
use crate::compute::MolGraph;
use crate::schema::{EvolutionHistory, Molecule, MoleculeProps};

/// File name of the checkpoint inside the checkpoint directory.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// A molecule in exchange form plus its properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeRecord {
    /// Exchange string produced by the graph backend.
    pub graph: String,
    pub props: MoleculeProps,
}

impl MoleculeRecord {
    pub fn from_molecule<G: MolGraph>(molecule: &Molecule<G>) -> Self {
        Self {
            graph: molecule.graph.to_exchange(),
            props: molecule.props.clone(),
        }
    }
}

/// Library and pool after a completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Number of completed generations.
    pub generation: usize,
    /// Seed the run was started with.
    pub seed: u64,
    pub library: Vec<MoleculeRecord>,
    pub pool: Vec<MoleculeRecord>,
    #[serde(default)]
    pub history: EvolutionHistory,
}

impl Checkpoint {
    /// Capture the current library and pool.
    pub fn capture<G: MolGraph>(
        generation: usize,
        seed: u64,
        library: &[Molecule<G>],
        pool: &[Molecule<G>],
        history: &EvolutionHistory,
    ) -> Self {
        Self {
            generation,
            seed,
            library: library.iter().map(MoleculeRecord::from_molecule).collect(),
            pool: pool.iter().map(MoleculeRecord::from_molecule).collect(),
            history: history.clone(),
        }
    }

    /// Path of the checkpoint file in `dir`.
    pub fn path_in<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(CHECKPOINT_FILE)
    }

    /// Write to `dir`, creating it if needed. The file is replaced atomically.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf, EvolutionError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = Self::path_in(dir);
        let tmp = dir.join(format!("{CHECKPOINT_FILE}.tmp"));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Read the checkpoint stored in `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, EvolutionError> {
        let content = fs::read_to_string(Self::path_in(dir))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Rebuild library and pool. Every molecule is re-finalized; records
    /// that no longer parse or sanitize are dropped with a warning.
    pub fn restore<G: MolGraph>(&self) -> (Vec<Molecule<G>>, Vec<Molecule<G>>) {
        (restore_records(&self.library), restore_records(&self.pool))
    }
}

fn restore_records<G: MolGraph>(records: &[MoleculeRecord]) -> Vec<Molecule<G>> {
    records
        .iter()
        .filter_map(|record| {
            let graph = match G::from_exchange(&record.graph) {
                Ok(graph) => graph,
                Err(e) => {
                    warn!("Dropping checkpoint record: {}", e);
                    return None;
                }
            };
            let mut molecule = Molecule {
                graph,
                props: record.props.clone(),
            };
            match finalize(&mut molecule) {
                Ok(()) => Some(molecule),
                Err(e) => {
                    warn!("Dropping insane checkpoint record {}: {}", record.graph, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Element, LabeledGraph};
    use crate::schema::GenerationStats;

    fn finalized(graph: LabeledGraph) -> Molecule<LabeledGraph> {
        let mut molecule = Molecule::new(graph);
        finalize(&mut molecule).unwrap();
        molecule
    }

    #[test]
    fn test_save_and_restore() {
        let dir = tempfile::tempdir().unwrap();

        let mut benzene = finalized(LabeledGraph::benzene());
        benzene.props.selected_count = 3;
        benzene.props.objective = Some(1.5);
        let library = vec![benzene.clone()];
        let pool = vec![
            benzene,
            finalized(LabeledGraph::cyclohexane()),
            finalized(LabeledGraph::chain(&[Element::C, Element::N])),
        ];
        let mut history = EvolutionHistory::default();
        history.push(GenerationStats {
            generation: 0,
            n_new: 2,
            ..Default::default()
        });

        let checkpoint = Checkpoint::capture(1, 42, &library, &pool, &history);
        let path = checkpoint.save(dir.path()).unwrap();
        assert!(path.ends_with(CHECKPOINT_FILE));

        let loaded = Checkpoint::load(dir.path()).unwrap();
        assert_eq!(loaded.generation, 1);
        assert_eq!(loaded.seed, 42);
        assert_eq!(loaded.history.generations.len(), 1);

        let (library2, pool2) = loaded.restore::<LabeledGraph>();
        assert_eq!(library2.len(), 1);
        assert_eq!(pool2.len(), 3);
        assert_eq!(library2[0].canonical_id(), library[0].canonical_id());
        assert_eq!(library2[0].props.selected_count, 3);
        assert_eq!(library2[0].props.objective, Some(1.5));
    }

    #[test]
    fn test_restore_drops_bad_records() {
        let checkpoint = Checkpoint {
            generation: 0,
            seed: 0,
            library: vec![
                MoleculeRecord::from_molecule(&finalized(LabeledGraph::benzene())),
                MoleculeRecord {
                    graph: "not a graph".to_string(),
                    props: MoleculeProps::default(),
                },
                // Two fragments fail sanitize.
                MoleculeRecord {
                    graph: "C.C|".to_string(),
                    props: MoleculeProps::default(),
                },
            ],
            pool: Vec::new(),
            history: EvolutionHistory::default(),
        };

        let (library, pool) = checkpoint.restore::<LabeledGraph>();
        assert_eq!(library.len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Checkpoint::load(dir.path()),
            Err(EvolutionError::Io(_))
        ));
    }
}
