//! Filter and objective seams of the generation loop.
//!
//! Filters classify candidates and may run concurrently. Objective
//! evaluation is a batch call that returns the survivors with their values
//! attached.

use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;

use super::error::ObjectiveError;
use crate::compute::MolGraph;
use crate::schema::{Molecule, ObjectiveConfig};

/// Three-way filter outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Pass,
    Fail,
    /// The filter could not decide. Treated as a failure.
    Unknown,
}

/// Filter classification plus the reason for a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    pub outcome: FilterOutcome,
    pub reason: Option<String>,
}

impl FilterVerdict {
    pub fn pass() -> Self {
        Self {
            outcome: FilterOutcome::Pass,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            outcome: FilterOutcome::Fail,
            reason: Some(reason.into()),
        }
    }

    pub fn unknown() -> Self {
        Self {
            outcome: FilterOutcome::Unknown,
            reason: None,
        }
    }
}

/// Candidate classifier run on every new molecule.
pub trait CandidateFilter<G>: Sync {
    fn classify(&self, molecule: &Molecule<G>) -> FilterVerdict;
}

impl<G, F> CandidateFilter<G> for F
where
    F: Fn(&Molecule<G>) -> FilterVerdict + Sync,
{
    fn classify(&self, molecule: &Molecule<G>) -> FilterVerdict {
        self(molecule)
    }
}

/// Passes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<G> CandidateFilter<G> for AcceptAll {
    fn classify(&self, _molecule: &Molecule<G>) -> FilterVerdict {
        FilterVerdict::pass()
    }
}

/// Rejects molecules with more than the given number of atoms.
#[derive(Debug, Clone, Copy)]
pub struct MaxAtoms(pub usize);

impl<G: MolGraph> CandidateFilter<G> for MaxAtoms {
    fn classify(&self, molecule: &Molecule<G>) -> FilterVerdict {
        if molecule.graph.atom_count() > self.0 {
            FilterVerdict::fail("too-big")
        } else {
            FilterVerdict::pass()
        }
    }
}

/// Batch objective evaluation.
pub trait ObjectiveEvaluator<G> {
    /// Attach objective values to `molecules` and return the survivors.
    fn evaluate(
        &mut self,
        molecules: Vec<Molecule<G>>,
        config: &ObjectiveConfig,
        generation: usize,
    ) -> Result<Vec<Molecule<G>>, ObjectiveError>;
}

/// Leaves molecules untouched. Used for pure diversity runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObjective;

impl<G> ObjectiveEvaluator<G> for NoObjective {
    fn evaluate(
        &mut self,
        molecules: Vec<Molecule<G>>,
        _config: &ObjectiveConfig,
        _generation: usize,
    ) -> Result<Vec<Molecule<G>>, ObjectiveError> {
        Ok(molecules)
    }
}

/// Cheap surrogate consulted before the physical evaluation.
pub trait Predictor<G> {
    fn predict(&mut self, molecule: &Molecule<G>) -> f64;
}

/// Objective adapter with a result table keyed by canonical identity.
///
/// Known molecules reuse their tabled value. Unseen molecules go through the
/// optional predictor, which keeps the most promising `predict_fraction` for
/// the scoring function and assigns its prediction to the rest. A scoring
/// failure drops the molecule when the objective is mandatory.
pub struct CachedObjective<G, F> {
    score: F,
    predictor: Option<Box<dyn Predictor<G> + Send>>,
    table: HashMap<String, f64>,
}

impl<G, F> CachedObjective<G, F>
where
    F: FnMut(&G) -> Option<f64>,
{
    pub fn new(score: F) -> Self {
        Self {
            score,
            predictor: None,
            table: HashMap::new(),
        }
    }

    pub fn with_predictor(mut self, predictor: impl Predictor<G> + Send + 'static) -> Self {
        self.predictor = Some(Box::new(predictor));
        self
    }

    /// Number of tabled evaluations.
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// Tabled value for a canonical identity.
    pub fn lookup(&self, canonical_id: &str) -> Option<f64> {
        self.table.get(canonical_id).copied()
    }

    /// Split unseen molecules into those to score and those left with a
    /// prediction.
    fn prescreen(
        &mut self,
        unseen: Vec<Molecule<G>>,
        config: &ObjectiveConfig,
    ) -> (Vec<Molecule<G>>, Vec<Molecule<G>>) {
        let (Some(predictor), Some(fraction)) = (self.predictor.as_mut(), config.predict_fraction)
        else {
            return (unseen, Vec::new());
        };

        let mut predicted: Vec<(f64, Molecule<G>)> = unseen
            .into_iter()
            .map(|m| (predictor.predict(&m), m))
            .collect();
        predicted.sort_by(|(a, _), (b, _)| {
            if config.is_better(*a, *b) {
                Ordering::Less
            } else if config.is_better(*b, *a) {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        });

        let n_score = ((predicted.len() as f64) * fraction).ceil() as usize;
        let rest = predicted.split_off(n_score.min(predicted.len()));
        let to_score = predicted.into_iter().map(|(_, m)| m).collect();
        let predicted_only = rest
            .into_iter()
            .map(|(value, mut m)| {
                m.props.objective = Some(value);
                m
            })
            .collect();
        (to_score, predicted_only)
    }
}

impl<G, F> ObjectiveEvaluator<G> for CachedObjective<G, F>
where
    F: FnMut(&G) -> Option<f64>,
{
    fn evaluate(
        &mut self,
        molecules: Vec<Molecule<G>>,
        config: &ObjectiveConfig,
        generation: usize,
    ) -> Result<Vec<Molecule<G>>, ObjectiveError> {
        let mut done = Vec::with_capacity(molecules.len());
        let mut unseen = Vec::new();
        for mut molecule in molecules {
            let id = molecule.canonical_id().ok_or_else(|| {
                ObjectiveError("molecule reached the objective stage without identity".into())
            })?;
            match self.table.get(id) {
                Some(&value) => {
                    molecule.props.objective = Some(value);
                    done.push(molecule);
                }
                None => unseen.push(molecule),
            }
        }
        let n_cached = done.len();

        let (to_score, predicted_only) = self.prescreen(unseen, config);
        let n_scored = to_score.len();
        let mut n_failed = 0;

        for mut molecule in to_score {
            match (self.score)(&molecule.graph) {
                Some(value) => {
                    molecule.props.objective = Some(value);
                    if let Some(id) = molecule.props.canonical_id.clone() {
                        self.table.insert(id, value);
                    }
                    done.push(molecule);
                }
                None => {
                    n_failed += 1;
                    if !config.mandatory {
                        molecule.props.objective = None;
                        done.push(molecule);
                    }
                }
            }
        }

        debug!(
            "Objective gen {}: {} cached, {} scored, {} predicted, {} failed (table {})",
            generation,
            n_cached,
            n_scored,
            predicted_only.len(),
            n_failed,
            self.table.len()
        );

        done.extend(predicted_only);
        Ok(done)
    }
}
