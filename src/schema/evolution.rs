//! Reporting types for the generation loop.
//!
//! Per-attempt failures never abort a generation; they are absorbed into the
//! counters below so the operator can see where candidates were lost.

use serde::{Deserialize, Serialize};

/// Attempt and failure counts for one mutation gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCounter {
    pub attempts: u32,
    pub failures: u32,
}

impl GateCounter {
    pub fn successes(&self) -> u32 {
        self.attempts - self.failures
    }
}

/// Per-gate counters of the operator cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorCounters {
    pub bond_flip: GateCounter,
    pub atom_flip: GateCounter,
    pub ring_add: GateCounter,
    pub ring_remove: GateCounter,
    pub atom_add: GateCounter,
    pub atom_remove: GateCounter,
    /// Cascade calls where no gate committed an edit.
    pub no_mutation: u32,
}

impl OperatorCounters {
    /// Total committed edits across all gates.
    pub fn committed(&self) -> u32 {
        self.gates().iter().map(|g| g.successes()).sum()
    }

    /// Gates in cascade order.
    pub fn gates(&self) -> [GateCounter; 6] {
        [
            self.bond_flip,
            self.atom_flip,
            self.ring_add,
            self.ring_remove,
            self.atom_add,
            self.atom_remove,
        ]
    }

    pub fn merge(&mut self, other: &OperatorCounters) {
        let pairs = [
            (&mut self.bond_flip, other.bond_flip),
            (&mut self.atom_flip, other.atom_flip),
            (&mut self.ring_add, other.ring_add),
            (&mut self.ring_remove, other.ring_remove),
            (&mut self.atom_add, other.atom_add),
            (&mut self.atom_remove, other.atom_remove),
        ];
        for (mine, theirs) in pairs {
            mine.attempts += theirs.attempts;
            mine.failures += theirs.failures;
        }
        self.no_mutation += other.no_mutation;
    }
}

/// Statistics for one completed generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation index.
    pub generation: usize,
    /// Candidates that survived their attempt (crossover or cascade).
    pub n_cand: usize,
    /// Attempts discarded by a typed failure.
    pub n_excp: usize,
    /// Duplicates merged away during the mutate stage.
    pub n_dup: usize,
    /// Candidates dropped because they no longer sanitize.
    pub n_insane: usize,
    /// Cascade calls that committed no edit.
    pub n_no_mutation: usize,
    /// Candidates rejected by the filter stage.
    pub n_filtered: usize,
    /// Candidates dropped by the objective stage.
    pub n_unfit: usize,
    /// Candidates entering the pool this generation.
    pub n_new: usize,
    /// Pool size after extension and deduplication.
    pub pool_size: usize,
    /// Library size after selection.
    pub library_size: usize,
    /// Best objective in the pool, when optimizing.
    pub best_objective: Option<f64>,
    /// Cascade gate counters.
    pub operators: OperatorCounters,
}

/// Accumulated per-generation statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionHistory {
    pub generations: Vec<GenerationStats>,
}

impl EvolutionHistory {
    pub fn push(&mut self, stats: GenerationStats) {
        self.generations.push(stats);
    }

    pub fn last(&self) -> Option<&GenerationStats> {
        self.generations.last()
    }

    /// Sum of the cascade counters over all generations.
    pub fn operator_totals(&self) -> OperatorCounters {
        let mut totals = OperatorCounters::default();
        for stats in &self.generations {
            totals.merge(&stats.operators);
        }
        totals
    }
}

/// Progress snapshot reported after every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generations completed so far.
    pub generation: usize,
    /// Configured number of generations.
    pub total_generations: usize,
    pub library_size: usize,
    pub pool_size: usize,
    pub best_objective: Option<f64>,
    /// Statistics of the generation just completed.
    pub last: Option<GenerationStats>,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Generations completed.
    pub generations: usize,
    pub pool_size: usize,
    pub library_size: usize,
    pub best_objective: Option<f64>,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
    pub history: EvolutionHistory,
}

/// Reason the run stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the configured number of generations.
    MaxGenerations,
    /// Reached the target objective.
    TargetReached,
    /// The library became empty.
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_merge() {
        let mut a = OperatorCounters::default();
        a.bond_flip = GateCounter {
            attempts: 3,
            failures: 1,
        };
        let mut b = OperatorCounters::default();
        b.bond_flip = GateCounter {
            attempts: 2,
            failures: 2,
        };
        b.atom_add = GateCounter {
            attempts: 1,
            failures: 0,
        };
        b.no_mutation = 4;

        a.merge(&b);
        assert_eq!(a.bond_flip.attempts, 5);
        assert_eq!(a.bond_flip.failures, 3);
        assert_eq!(a.committed(), 3);
        assert_eq!(a.no_mutation, 4);
    }

    #[test]
    fn test_stats_serialization() {
        let stats = GenerationStats {
            generation: 3,
            n_dup: 2,
            best_objective: Some(1.5),
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        let parsed: GenerationStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }
}
