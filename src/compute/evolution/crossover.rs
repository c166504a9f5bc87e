//! Crossover: recombine two parents into one candidate.

use super::context::RunContext;
use super::error::MutateFail;
use super::finalize::finalize;
use crate::compute::MolGraph;
use crate::schema::Molecule;

/// Recombine `primary` with `secondary`.
///
/// The child starts with fresh properties and records the primary parent's
/// identity. Nothing is returned on failure.
pub fn crossover<G: MolGraph>(
    ctx: &mut RunContext,
    primary: &Molecule<G>,
    secondary: &Molecule<G>,
) -> Result<Molecule<G>, MutateFail> {
    let graph = primary.graph.recombine(&secondary.graph, ctx.rng())?;

    let mut child = Molecule::new(graph);
    child.props.parent_id = primary.props.canonical_id.clone();
    finalize(&mut child)?;
    Ok(child)
}

/// Index of a parent drawn from `library ++ generated`, or from the leading
/// `edge_len` library entries when `use_edge` is set.
pub(crate) fn draw_parent(
    ctx: &mut RunContext,
    library_len: usize,
    generated_len: usize,
    edge_len: usize,
    use_edge: bool,
) -> Option<usize> {
    let edge = edge_len.min(library_len);
    let span = if use_edge && edge > 0 {
        edge
    } else {
        library_len + generated_len
    };
    ctx.index(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Element, LabeledGraph, RecombineError};
    use crate::schema::OperatorRates;

    fn finalized(graph: LabeledGraph) -> Molecule<LabeledGraph> {
        let mut molecule = Molecule::new(graph);
        finalize(&mut molecule).unwrap();
        molecule
    }

    #[test]
    fn test_crossover_child_is_finalized() {
        let mut ctx = RunContext::new(4, OperatorRates::default());
        let a = finalized(LabeledGraph::chain(&[Element::C, Element::N, Element::C]));
        let mut b = finalized(LabeledGraph::chain(&[Element::O, Element::C, Element::C]));
        b.props.objective = Some(2.0);
        b.props.selected_count = 3;

        let child = crossover(&mut ctx, &a, &b).unwrap();
        assert!(child.canonical_id().is_some());
        assert_eq!(child.props.parent_id.as_deref(), a.canonical_id());
        assert!(child.props.objective.is_none());
        assert_eq!(child.props.selected_count, 0);
    }

    #[test]
    fn test_crossover_without_cut_point_fails() {
        let mut ctx = RunContext::new(4, OperatorRates::default());
        let ring = finalized(LabeledGraph::cyclohexane());
        let chain = finalized(LabeledGraph::chain(&[Element::C; 3]));

        assert_eq!(
            crossover(&mut ctx, &ring, &chain).unwrap_err(),
            MutateFail::Recombine(RecombineError::NoCutPoint)
        );
    }

    #[test]
    fn test_draw_parent_edge_window() {
        let mut ctx = RunContext::new(8, OperatorRates::default());
        for _ in 0..100 {
            let idx = draw_parent(&mut ctx, 10, 5, 2, true).unwrap();
            assert!(idx < 2);
        }
        let drawn: Vec<usize> = (0..200)
            .filter_map(|_| draw_parent(&mut ctx, 10, 5, 2, false))
            .collect();
        assert!(drawn.iter().all(|&i| i < 15));
        assert!(drawn.iter().any(|&i| i >= 10));

        // Edge window disabled when edge_len is zero.
        assert!((0..50).any(|_| draw_parent(&mut ctx, 4, 0, 0, true).unwrap() >= 2));
        assert!(draw_parent(&mut ctx, 0, 0, 3, true).is_none());
    }
}
