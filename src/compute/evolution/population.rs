//! Pool extension and library resampling.

use std::cmp::Ordering;
use std::collections::HashSet;

use rand::seq::index;

use super::context::RunContext;
use crate::schema::{Molecule, ObjectiveConfig};

/// Union of the pool, the current library and this generation's survivors.
///
/// Library members are sampled from the pool, so only those whose identity
/// the pool lacks are added; folding a member back onto its own pool entry
/// would count it twice. New molecules are not deduplicated here.
pub fn extend_pool<G: Clone>(
    mut pool: Vec<Molecule<G>>,
    library: &[Molecule<G>],
    new_molecules: Vec<Molecule<G>>,
) -> Vec<Molecule<G>> {
    let known: HashSet<&str> = pool.iter().filter_map(|m| m.canonical_id()).collect();
    let missing: Vec<Molecule<G>> = library
        .iter()
        .filter(|m| m.canonical_id().is_none_or(|id| !known.contains(id)))
        .cloned()
        .collect();

    pool.reserve(missing.len() + new_molecules.len());
    pool.extend(missing);
    pool.extend(new_molecules);
    pool
}

/// Next working library: a uniform sample of `subset_size` pool members
/// without replacement, or the whole pool when it is not larger than that.
pub fn select_library<G: Clone>(
    ctx: &mut RunContext,
    pool: &[Molecule<G>],
    subset_size: usize,
) -> Vec<Molecule<G>> {
    if pool.len() <= subset_size {
        return pool.to_vec();
    }
    index::sample(ctx.rng(), pool.len(), subset_size)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}

/// Order a library best-first by objective so the edge window holds the
/// elites. Molecules without an objective go last; ties keep their order.
pub fn rank_by_objective<G>(library: &mut [Molecule<G>], objective: &ObjectiveConfig) {
    library.sort_by(|a, b| match (a.props.objective, b.props.objective) {
        (Some(x), Some(y)) => {
            if objective.is_better(x, y) {
                Ordering::Less
            } else if objective.is_better(y, x) {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Best objective among `molecules`.
pub fn best_objective<G>(molecules: &[Molecule<G>], objective: &ObjectiveConfig) -> Option<f64> {
    molecules
        .iter()
        .filter_map(|m| m.props.objective)
        .reduce(|best, x| if objective.is_better(x, best) { x } else { best })
}
