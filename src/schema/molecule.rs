//! Molecule values carried through the generation pipeline.

use serde::{Deserialize, Serialize};

/// Property bag attached to every molecule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoleculeProps {
    /// Canonical identity of the current graph. `None` between a committed
    /// edit and the next finalize.
    pub canonical_id: Option<String>,
    /// Canonical identity before the last successful mutation.
    pub parent_id: Option<String>,
    /// Rejected by the filter stage.
    pub failed: bool,
    /// Has passed through the filter stage at least once.
    pub filtered: bool,
    /// Reason reported by the filter for a rejection.
    #[serde(default)]
    pub failed_filter: Option<String>,
    /// A structure has been generated externally.
    pub has_structure: bool,
    /// Tautomer handling has run.
    pub tautomerized: bool,
    /// Objective value.
    pub objective: Option<f64>,
    /// Number of historical duplicate instances this molecule stands for.
    pub selected_count: u32,
}

impl MoleculeProps {
    /// Count of informative flags, used to break ties between duplicates.
    pub fn information_score(&self) -> u32 {
        [
            self.filtered,
            self.has_structure,
            self.objective.is_some(),
            self.tautomerized,
        ]
        .into_iter()
        .filter(|&flag| flag)
        .count() as u32
    }

    /// Clear everything computed by downstream stages.
    pub fn reset_transient(&mut self) {
        self.failed = false;
        self.filtered = false;
        self.failed_filter = None;
        self.has_structure = false;
        self.tautomerized = false;
        self.objective = None;
    }
}

/// A molecular graph plus its pipeline properties.
#[derive(Debug, Clone)]
pub struct Molecule<G> {
    pub graph: G,
    pub props: MoleculeProps,
}

impl<G> Molecule<G> {
    /// Wrap a graph with fresh properties. Identity is unset until finalize.
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            props: MoleculeProps::default(),
        }
    }

    /// Canonical identity, if computed.
    pub fn canonical_id(&self) -> Option<&str> {
        self.props.canonical_id.as_deref()
    }

    pub fn information_score(&self) -> u32 {
        self.props.information_score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_information_score() {
        let mut props = MoleculeProps::default();
        assert_eq!(props.information_score(), 0);

        props.filtered = true;
        props.objective = Some(-1.0);
        assert_eq!(props.information_score(), 2);

        props.has_structure = true;
        props.tautomerized = true;
        assert_eq!(props.information_score(), 4);
    }

    #[test]
    fn test_reset_keeps_identity_and_count() {
        let mut props = MoleculeProps {
            canonical_id: Some("C".to_string()),
            failed: true,
            filtered: true,
            failed_filter: Some("too-big".to_string()),
            objective: Some(3.0),
            selected_count: 7,
            ..Default::default()
        };
        props.reset_transient();

        assert_eq!(props.canonical_id.as_deref(), Some("C"));
        assert_eq!(props.selected_count, 7);
        assert!(!props.failed && !props.filtered);
        assert!(props.failed_filter.is_none());
        assert!(props.objective.is_none());
    }
}
