//! Property tests for deduplication and library selection.

use std::collections::BTreeSet;

use chem_evolve::compute::evolution::{RunContext, remove_duplicates, select_library};
use chem_evolve::schema::{Molecule, OperatorRates};
use proptest::collection::vec;
use proptest::prelude::*;

/// (identity, filtered, has_structure, counted) tuples.
fn molecules(entries: &[(u8, bool, bool, u32)]) -> Vec<Molecule<usize>> {
    entries
        .iter()
        .enumerate()
        .map(|(i, &(id, filtered, has_structure, count))| {
            let mut m = Molecule::new(i);
            m.props.canonical_id = Some(format!("M{id}"));
            m.props.filtered = filtered;
            m.props.has_structure = has_structure;
            m.props.selected_count = count;
            m
        })
        .collect()
}

fn entry() -> impl Strategy<Value = (u8, bool, bool, u32)> {
    (0u8..12, any::<bool>(), any::<bool>(), 0u32..100)
}

proptest! {
    /// One molecule per identity, and the same set of identities.
    #[test]
    fn dedup_keeps_one_per_identity(entries in vec(entry(), 0..60)) {
        let input = molecules(&entries);
        let expected: BTreeSet<String> =
            input.iter().filter_map(|m| m.props.canonical_id.clone()).collect();

        let out = remove_duplicates(input).unwrap();
        let ids: Vec<String> = out.iter().filter_map(|m| m.props.canonical_id.clone()).collect();
        let unique: BTreeSet<String> = ids.iter().cloned().collect();

        prop_assert_eq!(ids.len(), unique.len());
        prop_assert_eq!(unique, expected);
    }

    /// Merging conserves the total selected count.
    #[test]
    fn dedup_conserves_selected_count(entries in vec(entry(), 0..60)) {
        let input = molecules(&entries);
        let total: u32 = input.iter().map(|m| m.props.selected_count).sum();

        let out = remove_duplicates(input).unwrap();
        prop_assert_eq!(out.iter().map(|m| m.props.selected_count).sum::<u32>(), total);
    }

    /// Deduplicating twice changes nothing.
    #[test]
    fn dedup_idempotent(entries in vec(entry(), 0..60)) {
        let once = remove_duplicates(molecules(&entries)).unwrap();
        let snapshot: Vec<(usize, u32)> =
            once.iter().map(|m| (m.graph, m.props.selected_count)).collect();

        let twice = remove_duplicates(once).unwrap();
        let again: Vec<(usize, u32)> =
            twice.iter().map(|m| (m.graph, m.props.selected_count)).collect();
        prop_assert_eq!(snapshot, again);
    }

    /// The survivor of each identity has the highest information score.
    #[test]
    fn dedup_keeps_best_score(entries in vec(entry(), 1..60)) {
        let input = molecules(&entries);
        let out = remove_duplicates(input.clone()).unwrap();

        for kept in &out {
            let best = input
                .iter()
                .filter(|m| m.props.canonical_id == kept.props.canonical_id)
                .map(|m| m.information_score())
                .max()
                .unwrap_or(0);
            prop_assert_eq!(kept.information_score(), best);
        }
    }

    /// Library never exceeds the subset size and is drawn from the pool.
    #[test]
    fn library_bounded_subset_of_pool(n_pool in 0usize..40, subset in 1usize..20, seed in any::<u64>()) {
        let pool: Vec<Molecule<usize>> = (0..n_pool)
            .map(|i| {
                let mut m = Molecule::new(i);
                m.props.canonical_id = Some(format!("M{i}"));
                m
            })
            .collect();
        let mut ctx = RunContext::new(seed, OperatorRates::default());

        let library = select_library(&mut ctx, &pool, subset);
        prop_assert_eq!(library.len(), n_pool.min(subset));

        let drawn: BTreeSet<usize> = library.iter().map(|m| m.graph).collect();
        prop_assert_eq!(drawn.len(), library.len());
        prop_assert!(drawn.iter().all(|&i| i < n_pool));
    }
}
