//! Generation orchestrator.
//!
//! One generation runs `MUTATE -> FILTER -> OBJECTIVE -> POOL-EXTEND ->
//! LIBRARY-SELECT` strictly in order. Per-attempt failures are counted in
//! [`GenerationStats`]; only configuration problems, objective failures and
//! checkpoint I/O abort a run.

use log::{debug, info, warn};
use rayon::prelude::*;

use super::adapters::{CandidateFilter, FilterOutcome, FilterVerdict, ObjectiveEvaluator};
use super::archive::Checkpoint;
use super::cascade::{CascadeOutcome, mutate};
use super::context::RunContext;
use super::crossover::{crossover, draw_parent};
use super::dedup::remove_duplicates;
use super::error::{EvolutionError, MutateFail};
use super::finalize::{finalize, is_sane};
use super::population::{best_objective, extend_pool, rank_by_objective, select_library};
use crate::compute::MolGraph;
use crate::schema::{
    ConfigError, EvolutionHistory, EvolutionProgress, EvolutionResult, GenerationStats, Molecule,
    OperatorCounters, RunConfig, StopReason,
};

/// Evolution engine that owns the library and pool of a run.
pub struct EvolutionEngine<G, F, O> {
    config: RunConfig,
    ctx: RunContext,
    seed: u64,
    filter: F,
    objective: O,
    library: Vec<Molecule<G>>,
    pool: Vec<Molecule<G>>,
    history: EvolutionHistory,
    generation: usize,
}

impl<G, F, O> EvolutionEngine<G, F, O>
where
    G: MolGraph,
    F: CandidateFilter<G>,
    O: ObjectiveEvaluator<G>,
{
    /// Create an engine from configuration.
    ///
    /// Resumes from the checkpoint directory when `checkpoint.restart` is
    /// set, otherwise seeds the library from `seeds.library` or the graph
    /// backend's presets.
    pub fn new(config: RunConfig, filter: F, objective: O) -> Result<Self, EvolutionError> {
        config.validate()?;

        if config.checkpoint.restart {
            let dir = config
                .checkpoint
                .dir
                .as_ref()
                .ok_or(ConfigError::RestartWithoutCheckpoint)?;
            let checkpoint = Checkpoint::load(dir)?;
            info!(
                "Restarting from {} after generation {}",
                dir.display(),
                checkpoint.generation
            );
            return Self::from_checkpoint(config, filter, objective, checkpoint);
        }

        let seed = config.random_seed.unwrap_or_else(rand::random);
        info!("Random seed: {}", seed);

        let mut library = if config.seeds.library.is_empty() {
            info!("Seeding library with presets");
            G::presets().into_iter().map(Molecule::new).collect()
        } else {
            parse_seeds::<G>(&config.seeds.library)?
        };
        if let Some(n_seed) = config.seeds.n_seed {
            library.truncate(n_seed);
        }
        let library = remove_duplicates(finalize_seeds(library))?;
        config.check_library_len(library.len())?;

        let extra = finalize_seeds(parse_seeds::<G>(&config.seeds.pool)?);
        let pool = remove_duplicates(extend_pool(extra, &library, Vec::new()))?;
        info!(
            "Starting with {} library and {} pool molecules",
            library.len(),
            pool.len()
        );

        Ok(Self {
            ctx: RunContext::new(seed, config.operators.clone()),
            config,
            seed,
            filter,
            objective,
            library,
            pool,
            history: EvolutionHistory::default(),
            generation: 0,
        })
    }

    /// Resume a run from a checkpoint.
    ///
    /// The random stream is re-derived from the run seed and the number of
    /// completed generations, so a resumed run is reproducible but does not
    /// continue the interrupted stream draw for draw.
    pub fn from_checkpoint(
        config: RunConfig,
        filter: F,
        objective: O,
        checkpoint: Checkpoint,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;

        let (mut library, pool) = checkpoint.restore::<G>();
        if library.is_empty() {
            return Err(ConfigError::EmptySeedLibrary.into());
        }
        let pool = remove_duplicates(extend_pool(pool, &library, Vec::new()))?;
        if config.objective.optimize {
            rank_by_objective(&mut library, &config.objective);
        }

        let stream = checkpoint.seed.wrapping_add(checkpoint.generation as u64);
        Ok(Self {
            ctx: RunContext::new(stream, config.operators.clone()),
            config,
            seed: checkpoint.seed,
            filter,
            objective,
            library,
            pool,
            history: checkpoint.history,
            generation: checkpoint.generation,
        })
    }

    /// Seed the run was started with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Current working library.
    pub fn library(&self) -> &[Molecule<G>] {
        &self.library
    }

    /// Deduplicated pool of every accepted molecule.
    pub fn pool(&self) -> &[Molecule<G>] {
        &self.pool
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Number of completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Best objective in the pool, when optimizing.
    pub fn best_objective(&self) -> Option<f64> {
        if self.config.objective.optimize {
            best_objective(&self.pool, &self.config.objective)
        } else {
            None
        }
    }

    /// Snapshot of library and pool for restarting.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::capture(
            self.generation,
            self.seed,
            &self.library,
            &self.pool,
            &self.history,
        )
    }

    /// Run one generation.
    pub fn step(&mut self) -> Result<GenerationStats, EvolutionError> {
        let mut stats = GenerationStats {
            generation: self.generation,
            ..Default::default()
        };

        // 1. Mutate
        let candidates = self.mutate_stage(&mut stats)?;

        // 2. Filter
        let mut new_molecules = self.filter_stage(candidates, &mut stats);

        // 3. Objective
        if self.config.objective.optimize {
            let before = new_molecules.len();
            new_molecules =
                self.objective
                    .evaluate(new_molecules, &self.config.objective, self.generation)?;
            stats.n_unfit = before.saturating_sub(new_molecules.len());
        }
        stats.n_new = new_molecules.len();

        // 4. Extend pool
        let pool = std::mem::take(&mut self.pool);
        self.pool = remove_duplicates(extend_pool(pool, &self.library, new_molecules))?;

        // 5. Select library
        self.library = select_library(
            &mut self.ctx,
            &self.pool,
            self.config.population.subset_size,
        );
        if self.config.objective.optimize {
            rank_by_objective(&mut self.library, &self.config.objective);
        }

        stats.pool_size = self.pool.len();
        stats.library_size = self.library.len();
        stats.best_objective = self.best_objective();

        info!(
            "Gen {}: {} new, pool {}, library {} (cand {}, excp {}, dup {}, filtered {})",
            stats.generation,
            stats.n_new,
            stats.pool_size,
            stats.library_size,
            stats.n_cand,
            stats.n_excp,
            stats.n_dup,
            stats.n_filtered
        );
        if let Some(best) = stats.best_objective {
            info!("Gen {}: best objective {:.4}", stats.generation, best);
        }

        self.generation += 1;
        self.history.push(stats.clone());

        if let Some(dir) = &self.config.checkpoint.dir {
            let path = self.checkpoint().save(dir)?;
            debug!("Checkpoint written to {}", path.display());
        }

        Ok(stats)
    }

    /// Crossovers then cascade mutations over `library ++ generated`.
    fn mutate_stage(
        &mut self,
        stats: &mut GenerationStats,
    ) -> Result<Vec<Molecule<G>>, EvolutionError> {
        let population = &self.config.population;
        let library = &self.library;
        let ctx = &mut self.ctx;
        let mut generated: Vec<Molecule<G>> = Vec::new();

        let n_cross = population.n_cross.min(library.len().saturating_sub(1));
        for i in 0..n_cross {
            let use_edge = uses_edge(i, population.n_cross, population.edge_ratio)
                && population.edge_len > 0;
            let first = draw_parent(
                ctx,
                library.len(),
                generated.len(),
                population.edge_len,
                use_edge,
            );
            let second = draw_parent(ctx, library.len(), generated.len(), 0, false);
            let (Some(first), Some(second)) = (first, second) else {
                break;
            };

            let primary = nth(library, &generated, first);
            let secondary = nth(library, &generated, second);
            match crossover(ctx, primary, secondary) {
                Ok(child) => {
                    generated.push(child);
                    stats.n_cand += 1;
                }
                Err(e) => {
                    debug!("Crossover discarded: {}", e);
                    stats.n_excp += 1;
                }
            }
        }
        let mut generated = sane_and_unique(generated, stats)?;
        debug!("After crossover: {} candidates, {} dups", generated.len(), stats.n_dup);

        let mut counters = OperatorCounters::default();
        for i in 0..population.n_mut {
            let use_edge =
                uses_edge(i, population.n_mut, population.edge_ratio) && population.edge_len > 0;
            let Some(index) = draw_parent(
                ctx,
                library.len(),
                generated.len(),
                population.edge_len,
                use_edge,
            ) else {
                break;
            };

            let mut candidate = nth(library, &generated, index).clone();
            match mutate(ctx, &mut candidate, &mut counters) {
                Ok(outcome) => {
                    if outcome == CascadeOutcome::Unchanged {
                        stats.n_no_mutation += 1;
                    }
                    generated.push(candidate);
                    stats.n_cand += 1;
                }
                Err(MutateFail::NoMutation) => {
                    stats.n_no_mutation += 1;
                    stats.n_excp += 1;
                }
                Err(e) => {
                    debug!("Mutation discarded: {}", e);
                    stats.n_excp += 1;
                }
            }
        }
        stats.operators = counters;

        let generated = sane_and_unique(generated, stats)?;
        debug!("After mutation: {} candidates, {} dups", generated.len(), stats.n_dup);
        Ok(generated)
    }

    /// Classify candidates in parallel and drop the failures.
    fn filter_stage(
        &self,
        candidates: Vec<Molecule<G>>,
        stats: &mut GenerationStats,
    ) -> Vec<Molecule<G>> {
        let filter = &self.filter;
        let verdicts: Vec<FilterVerdict> =
            candidates.par_iter().map(|m| filter.classify(m)).collect();

        let mut passed = Vec::with_capacity(candidates.len());
        for (mut molecule, verdict) in candidates.into_iter().zip(verdicts) {
            molecule.props.filtered = true;
            let reason = match verdict.outcome {
                FilterOutcome::Pass => None,
                FilterOutcome::Fail => Some(verdict.reason.unwrap_or_else(|| "failed".into())),
                FilterOutcome::Unknown => {
                    warn!(
                        "Filter could not classify {}",
                        molecule.canonical_id().unwrap_or("?")
                    );
                    Some("unknown".to_string())
                }
            };

            molecule.props.failed = reason.is_some();
            match reason {
                Some(reason) => {
                    debug!(
                        "Filtered {}: {}",
                        molecule.canonical_id().unwrap_or("?"),
                        reason
                    );
                    molecule.props.failed_filter = Some(reason);
                    stats.n_filtered += 1;
                }
                None => passed.push(molecule),
            }
        }
        passed
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            library_size: self.library.len(),
            pool_size: self.pool.len(),
            best_objective: self.best_objective(),
            last: self.history.last().cloned(),
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.library.is_empty() {
            return Some(StopReason::Exhausted);
        }

        if self.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        let objective = &self.config.objective;
        if let (Some(target), Some(best)) = (objective.target, self.best_objective())
            && !objective.is_better(target, best)
        {
            return Some(StopReason::TargetReached);
        }

        None
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<C>(&mut self, callback: C) -> Result<EvolutionResult, EvolutionError>
    where
        C: Fn(&EvolutionProgress),
    {
        let start_time = std::time::Instant::now();
        callback(&self.progress());

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }
            self.step()?;
            callback(&self.progress());
        };

        let elapsed = start_time.elapsed().as_secs_f64();
        info!(
            "Stopped after {} generations ({:?}) in {:.2}s",
            self.generation, stop_reason, elapsed
        );

        Ok(EvolutionResult {
            generations: self.generation,
            pool_size: self.pool.len(),
            library_size: self.library.len(),
            best_objective: self.best_objective(),
            elapsed_seconds: elapsed,
            stop_reason,
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

/// The first `count * ratio` attempts of a stage draw from the edge window.
fn uses_edge(attempt: usize, count: usize, ratio: f64) -> bool {
    (attempt as f64) < count as f64 * ratio
}

/// Element `index` of `library ++ generated`.
fn nth<'a, G>(
    library: &'a [Molecule<G>],
    generated: &'a [Molecule<G>],
    index: usize,
) -> &'a Molecule<G> {
    match index.checked_sub(library.len()) {
        Some(offset) => &generated[offset],
        None => &library[index],
    }
}

/// Drop candidates that no longer sanitize, then deduplicate.
fn sane_and_unique<G: MolGraph>(
    candidates: Vec<Molecule<G>>,
    stats: &mut GenerationStats,
) -> Result<Vec<Molecule<G>>, EvolutionError> {
    let before = candidates.len();
    let sane: Vec<Molecule<G>> = candidates.into_iter().filter(is_sane).collect();
    stats.n_insane += before - sane.len();

    let before = sane.len();
    let unique = remove_duplicates(sane)?;
    stats.n_dup += before - unique.len();
    Ok(unique)
}

fn parse_seeds<G: MolGraph>(seeds: &[String]) -> Result<Vec<Molecule<G>>, EvolutionError> {
    seeds
        .iter()
        .map(|text| {
            G::from_exchange(text)
                .map(Molecule::new)
                .map_err(EvolutionError::from)
        })
        .collect()
}

/// Finalize seed molecules, dropping the ones that do not sanitize.
fn finalize_seeds<G: MolGraph>(seeds: Vec<Molecule<G>>) -> Vec<Molecule<G>> {
    seeds
        .into_iter()
        .filter_map(|mut molecule| match finalize(&mut molecule) {
            Ok(()) => Some(molecule),
            Err(e) => {
                warn!("Dropping seed {}: {}", molecule.graph.to_exchange(), e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::compute::evolution::adapters::{AcceptAll, CachedObjective, MaxAtoms, NoObjective};
    use crate::compute::{LabeledGraph, MolGraph};

    type Engine = EvolutionEngine<LabeledGraph, AcceptAll, NoObjective>;

    fn config(seed: u64) -> RunConfig {
        let mut config = RunConfig::default();
        config.random_seed = Some(seed);
        config.population.subset_size = 6;
        config.population.n_cross = 4;
        config.population.n_mut = 12;
        config.population.edge_len = 2;
        config.population.edge_ratio = 0.25;
        config.population.max_generations = 4;
        config
    }

    fn ids(molecules: &[Molecule<LabeledGraph>]) -> Vec<String> {
        molecules
            .iter()
            .filter_map(|m| m.canonical_id().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_engine_seeds_presets() {
        let engine = Engine::new(config(1), AcceptAll, NoObjective).unwrap();
        assert_eq!(engine.library().len(), 2);
        assert_eq!(engine.pool().len(), 2);
        assert_eq!(engine.generation(), 0);
        assert_eq!(engine.seed(), 1);
    }

    #[test]
    fn test_seed_errors() {
        let mut empty = config(1);
        empty.seeds.n_seed = Some(0);
        assert!(matches!(
            Engine::new(empty, AcceptAll, NoObjective),
            Err(EvolutionError::Config(ConfigError::EmptySeedLibrary))
        ));

        let mut bad = config(1);
        bad.seeds.library = vec!["Xx|".to_string()];
        assert!(matches!(
            Engine::new(bad, AcceptAll, NoObjective),
            Err(EvolutionError::Seed(_))
        ));

        let mut too_large = config(1);
        too_large.population.subset_size = 1;
        too_large.population.edge_len = 0;
        assert!(matches!(
            Engine::new(too_large, AcceptAll, NoObjective),
            Err(EvolutionError::Config(ConfigError::LibraryTooLarge { len: 2, .. }))
        ));
    }

    #[test]
    fn test_insane_seed_dropped() {
        let mut config = config(1);
        config.seeds.library = vec![
            LabeledGraph::benzene().to_exchange(),
            // Carbon with five bonds.
            "C.C.C.C.C.C|0-1:1,0-2:1,0-3:1,0-4:1,0-5:1".to_string(),
        ];
        let engine = Engine::new(config, AcceptAll, NoObjective).unwrap();
        assert_eq!(engine.library().len(), 1);
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = Engine::new(config(42), AcceptAll, NoObjective).unwrap();
        let mut b = Engine::new(config(42), AcceptAll, NoObjective).unwrap();
        a.run().unwrap();
        b.run().unwrap();

        assert_eq!(ids(a.library()), ids(b.library()));
        assert_eq!(ids(a.pool()), ids(b.pool()));
        assert_eq!(a.history().generations, b.history().generations);
    }

    #[test]
    fn test_library_bound_and_pool_growth() {
        let mut engine = Engine::new(config(3), AcceptAll, NoObjective).unwrap();
        let mut pool_size = engine.pool().len();

        for _ in 0..4 {
            let stats = engine.step().unwrap();
            assert!(engine.library().len() <= 6);
            assert_eq!(stats.library_size, engine.library().len());

            let pool_ids: BTreeSet<String> = ids(engine.pool()).into_iter().collect();
            assert_eq!(pool_ids.len(), engine.pool().len());
            assert!(pool_ids.len() >= pool_size);
            pool_size = pool_ids.len();

            for id in ids(engine.library()) {
                assert!(pool_ids.contains(&id));
            }
            assert!(engine.pool().iter().all(|m| m.graph.clone().sanitize().is_ok()));
        }
        assert_eq!(engine.history().generations.len(), 4);
    }

    #[test]
    fn test_reject_all_filter_keeps_pool() {
        let reject = |_: &Molecule<LabeledGraph>| FilterVerdict::fail("nope");
        let mut engine = EvolutionEngine::<LabeledGraph, _, _>::new(config(5), reject, NoObjective).unwrap();
        let stats = engine.step().unwrap();

        assert_eq!(stats.n_new, 0);
        assert_eq!(stats.n_filtered, stats.n_cand - stats.n_dup - stats.n_insane);
        assert_eq!(engine.pool().len(), 2);
    }

    #[test]
    fn test_library_fold_keeps_pool_counts() {
        let reject = |_: &Molecule<LabeledGraph>| FilterVerdict::fail("nope");
        let mut engine =
            EvolutionEngine::<LabeledGraph, _, _>::new(config(5), reject, NoObjective).unwrap();
        for (i, molecule) in engine.pool.iter_mut().enumerate() {
            molecule.props.selected_count = i as u32 + 3;
        }
        let total = |pool: &[Molecule<LabeledGraph>]| -> u32 {
            pool.iter().map(|m| m.props.selected_count).sum()
        };
        let before = total(engine.pool());
        assert_eq!(before, 7);

        for _ in 0..40 {
            engine.step().unwrap();
            assert_eq!(total(engine.pool()), before);
        }
        assert_eq!(engine.pool().len(), 2);
    }

    #[test]
    fn test_new_molecules_start_unselected() {
        let engine = Engine::new(config(1), AcceptAll, NoObjective).unwrap();
        assert!(engine.pool().iter().all(|m| m.props.selected_count == 0));
        assert!(engine.library().iter().all(|m| m.props.selected_count == 0));
    }

    #[test]
    fn test_unknown_counts_as_failed() {
        let unsure = |_: &Molecule<LabeledGraph>| FilterVerdict::unknown();
        let mut engine = EvolutionEngine::<LabeledGraph, _, _>::new(config(5), unsure, NoObjective).unwrap();
        let stats = engine.step().unwrap();
        assert_eq!(stats.n_new, 0);
    }

    #[test]
    fn test_max_atoms_filter_bounds_pool() {
        let mut engine = EvolutionEngine::<LabeledGraph, _, _>::new(config(9), MaxAtoms(6), NoObjective).unwrap();
        engine.run().unwrap();
        assert!(engine.pool().iter().all(|m| m.graph.atom_count() <= 6));
    }

    #[test]
    fn test_optimize_reaches_target() {
        let mut config = config(11);
        config.objective.optimize = true;
        config.objective.target = Some(6.0);
        config.population.max_generations = 10;
        let objective = CachedObjective::new(|g: &LabeledGraph| Some(g.atom_count() as f64));

        let mut engine = EvolutionEngine::<LabeledGraph, _, _>::new(config, AcceptAll, objective).unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.stop_reason, StopReason::TargetReached);
        assert!(result.best_objective.is_some_and(|best| best >= 6.0));

        // Library is ordered best-first.
        let values: Vec<f64> = engine
            .library()
            .iter()
            .map(|m| m.props.objective.unwrap_or(f64::NEG_INFINITY))
            .collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_checkpoint_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = config(21);
        first.population.max_generations = 2;
        first.checkpoint.dir = Some(dir.path().to_path_buf());

        let mut engine = Engine::new(first.clone(), AcceptAll, NoObjective).unwrap();
        engine.run().unwrap();

        let mut resumed = first;
        resumed.checkpoint.restart = true;
        resumed.population.max_generations = 3;
        let mut restarted = Engine::new(resumed, AcceptAll, NoObjective).unwrap();

        assert_eq!(restarted.generation(), 2);
        assert_eq!(restarted.seed(), 21);
        assert_eq!(ids(restarted.library()), ids(engine.library()));
        assert_eq!(restarted.history().generations.len(), 2);

        let result = restarted.run().unwrap();
        assert_eq!(result.generations, 3);
        assert_eq!(result.stop_reason, StopReason::MaxGenerations);
    }

    #[test]
    fn test_progress_callback() {
        let mut engine = Engine::new(config(2), AcceptAll, NoObjective).unwrap();
        let seen = std::cell::Cell::new(0);
        let result = engine
            .run_with_callback(|progress| {
                assert_eq!(progress.total_generations, 4);
                seen.set(seen.get() + 1);
            })
            .unwrap();

        assert_eq!(result.generations, 4);
        assert_eq!(result.stop_reason, StopReason::MaxGenerations);
        assert_eq!(seen.get(), 5);
    }
}
