//! Operator cascade: at most one structural edit per call.
//!
//! Six gates are tested in a fixed order, each with an independent trial
//! against its configured probability:
//!
//! 1. bond flip, 2. atom flip, 3. ring/bond addition,
//! 4. ring-bond removal, 5. atom addition, 6. atom removal.
//!
//! The first gate whose trial succeeds and whose edit commits and finalizes
//! ends the cascade. Gates 1-3 snapshot the graph and roll back on failure.
//! Gates 4-6 edit in place: a failed attempt counts against its gate and the
//! cascade moves on with the graph as the attempt left it. If no later gate
//! repairs such a graph, the call fails with [`MutateFail::Invalid`].

use log::trace;

use super::context::RunContext;
use super::error::MutateFail;
use super::finalize::finalize;
use crate::compute::{
    AtomClass, BondClass, Edit, MolGraph, Site, ValidationError, common_ring_bonds,
};
use crate::schema::{GateCounter, Molecule, OperatorCounters};

/// The six mutation gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    BondFlip,
    AtomFlip,
    RingAdd,
    RingRemove,
    AtomAdd,
    AtomRemove,
}

impl Gate {
    fn counter(self, counters: &mut OperatorCounters) -> &mut GateCounter {
        match self {
            Gate::BondFlip => &mut counters.bond_flip,
            Gate::AtomFlip => &mut counters.atom_flip,
            Gate::RingAdd => &mut counters.ring_add,
            Gate::RingRemove => &mut counters.ring_remove,
            Gate::AtomAdd => &mut counters.atom_add,
            Gate::AtomRemove => &mut counters.atom_remove,
        }
    }
}

/// Result of one cascade call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// The named gate committed an edit; the candidate is finalized.
    Edited(Gate),
    /// No gate committed; the candidate is returned as it came in.
    Unchanged,
}

/// Apply at most one mutation to `candidate`, which must be an exclusive
/// copy with a valid canonical identity.
pub fn mutate<G: MolGraph>(
    ctx: &mut RunContext,
    candidate: &mut Molecule<G>,
    counters: &mut OperatorCounters,
) -> Result<CascadeOutcome, MutateFail> {
    let parent = candidate.props.canonical_id.clone();
    candidate.props.reset_transient();
    candidate.props.parent_id = parent;

    let rates = ctx.rates().clone();
    let mut invalid: Option<ValidationError> = None;

    // 1. Bond flip
    let bonds = candidate.graph.bonds(BondClass::Ungrouped);
    if ctx.trial(rates.bond_flip) && !bonds.is_empty() {
        let edit = ctx.pick(&bonds).map(|&b| Edit::FlipBond(b));
        if attempt_restorable(ctx, candidate, counters, Gate::BondFlip, edit) {
            return Ok(CascadeOutcome::Edited(Gate::BondFlip));
        }
    }

    // 2. Atom identity flip
    let atoms = candidate.graph.atoms(AtomClass::Changeable);
    if ctx.trial(rates.atom_flip) && !atoms.is_empty() {
        let edit = ctx.pick(&atoms).map(|&a| Edit::SwitchAtom(a));
        if attempt_restorable(ctx, candidate, counters, Gate::AtomFlip, edit) {
            return Ok(CascadeOutcome::Edited(Gate::AtomFlip));
        }
    }

    // 3. Ring or bond addition
    if ctx.trial(rates.ring_add)
        && attempt_restorable(ctx, candidate, counters, Gate::RingAdd, Some(Edit::AddBond))
    {
        return Ok(CascadeOutcome::Edited(Gate::RingAdd));
    }

    // 4. Remove a bond shared by every ring
    if ctx.trial(rates.ring_remove) {
        let bonds = common_ring_bonds(&candidate.graph);
        let edit = ctx.pick(&bonds).map(|&b| Edit::RemoveBond(b));
        if attempt_in_place(ctx, candidate, counters, Gate::RingRemove, edit, &mut invalid) {
            return Ok(CascadeOutcome::Edited(Gate::RingRemove));
        }
    }

    // 5. Atom addition at an atom or inside a bond
    let mut sites: Vec<Site> = candidate
        .graph
        .atoms(AtomClass::Unprotected)
        .into_iter()
        .map(Site::Atom)
        .collect();
    sites.extend(
        candidate
            .graph
            .bonds(BondClass::Ungrouped)
            .into_iter()
            .map(Site::Bond),
    );
    if ctx.trial(rates.atom_add) && !sites.is_empty() {
        let edit = ctx.pick(&sites).map(|&s| Edit::AddAtom(s));
        if attempt_in_place(ctx, candidate, counters, Gate::AtomAdd, edit, &mut invalid) {
            return Ok(CascadeOutcome::Edited(Gate::AtomAdd));
        }
    }

    // 6. Atom removal
    let removable = candidate.graph.atoms(AtomClass::Removable);
    if removable.len() > 1 && ctx.trial(rates.atom_remove) {
        let edit = ctx.pick(&removable).map(|&a| Edit::RemoveAtom(a));
        if attempt_in_place(ctx, candidate, counters, Gate::AtomRemove, edit, &mut invalid) {
            return Ok(CascadeOutcome::Edited(Gate::AtomRemove));
        }
    }

    if let Some(e) = invalid {
        return Err(MutateFail::Invalid(e));
    }

    counters.no_mutation += 1;
    if rates.fail_on_no_mutation {
        Err(MutateFail::NoMutation)
    } else {
        Ok(CascadeOutcome::Unchanged)
    }
}

/// Try an edit, rolling the candidate back if it does not commit or does
/// not finalize. Returns true when the edit stuck.
fn attempt_restorable<G: MolGraph>(
    ctx: &mut RunContext,
    candidate: &mut Molecule<G>,
    counters: &mut OperatorCounters,
    gate: Gate,
    edit: Option<Edit>,
) -> bool {
    gate.counter(counters).attempts += 1;

    if let Some(edit) = edit {
        let snapshot = candidate.graph.clone();
        let identity = candidate.props.canonical_id.clone();

        if candidate.graph.apply_edit(edit, ctx.rng()).is_ok() {
            candidate.props.canonical_id = None;
            match finalize(candidate) {
                Ok(()) => {
                    trace!("{gate:?} committed {edit:?}");
                    return true;
                }
                Err(e) => trace!("{gate:?} rolled back: {e}"),
            }
        }

        candidate.graph = snapshot;
        candidate.props.canonical_id = identity;
    }

    gate.counter(counters).failures += 1;
    false
}

/// Try an edit without a snapshot. A refused edit is a no-op. A committed
/// edit that fails to finalize stays in the graph and is recorded in
/// `invalid`; a later successful finalize clears it.
fn attempt_in_place<G: MolGraph>(
    ctx: &mut RunContext,
    candidate: &mut Molecule<G>,
    counters: &mut OperatorCounters,
    gate: Gate,
    edit: Option<Edit>,
    invalid: &mut Option<ValidationError>,
) -> bool {
    gate.counter(counters).attempts += 1;

    let Some(edit) = edit else {
        gate.counter(counters).failures += 1;
        return false;
    };

    if candidate.graph.apply_edit(edit, ctx.rng()).is_err() {
        gate.counter(counters).failures += 1;
        return false;
    }

    match finalize(candidate) {
        Ok(()) => {
            *invalid = None;
            trace!("{gate:?} committed {edit:?}");
            true
        }
        Err(e) => {
            gate.counter(counters).failures += 1;
            trace!("{gate:?} left an invalid graph: {e}");
            *invalid = Some(e);
            false
        }
    }
}
