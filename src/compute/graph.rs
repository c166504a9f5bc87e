//! Graph capability consumed by the generation engine.
//!
//! The engine never inspects chemistry directly. Everything it needs from a
//! molecular graph (validity, identity, eligible edit targets, ring bonds,
//! edit primitives, recombination) goes through [`MolGraph`].

use std::collections::BTreeSet;

use rand::Rng;

/// Index of an atom, valid until the next edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomRef(pub usize);

/// Index of a bond, valid until the next edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BondRef(pub usize);

/// Atom eligibility classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomClass {
    /// Every atom.
    Any,
    /// Atoms without the protected tag; valid attachment points.
    Unprotected,
    /// Atoms whose element may be switched.
    Changeable,
    /// Atoms that may be deleted.
    Removable,
}

/// Bond eligibility classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondClass {
    /// Every bond.
    Any,
    /// Bonds outside protected groups.
    Ungrouped,
}

/// Where a new atom is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// Attach a new atom to this atom.
    Atom(AtomRef),
    /// Split this bond with a new atom.
    Bond(BondRef),
}

/// Structural edit primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    FlipBond(BondRef),
    SwitchAtom(AtomRef),
    /// Add a bond between two atoms chosen by the editor.
    AddBond,
    RemoveBond(BondRef),
    AddAtom(Site),
    RemoveAtom(AtomRef),
}

/// The graph is structurally or chemically invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Graph has no atoms")]
    Empty,
    #[error("Graph is disconnected ({0} fragments)")]
    Disconnected(usize),
    #[error("Atom {atom} exceeds its valence ({used} > {max})")]
    Valence { atom: usize, used: u32, max: u32 },
    #[error("Bond {0} is malformed")]
    MalformedBond(usize),
}

/// An edit primitive refused to commit. The graph is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("No valid target for edit")]
    NoTarget,
    #[error("Reference {0} is out of range")]
    OutOfRange(usize),
}

/// Recombination of two parents failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecombineError {
    #[error("Parent has no valid cut point")]
    NoCutPoint,
    #[error("Recombined graph is invalid: {0}")]
    Invalid(#[from] ValidationError),
}

/// A textual exchange string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot parse {input:?}: {reason}")]
pub struct ExchangeError {
    pub input: String,
    pub reason: String,
}

/// Capability a molecular graph backend provides to the engine.
///
/// Edit primitives must be atomic on error: an `Err` leaves the graph exactly
/// as it was. A committed edit may still produce an invalid graph; that is
/// detected by [`MolGraph::sanitize`].
pub trait MolGraph: Clone + Send + Sync {
    /// Validate the graph and refresh derived state (ring caches, tags).
    fn sanitize(&mut self) -> Result<(), ValidationError>;

    /// Structure-derived identity, equal for isomorphic graphs.
    fn canonical_id(&self) -> String;

    fn atoms(&self, class: AtomClass) -> Vec<AtomRef>;

    fn bonds(&self, class: BondClass) -> Vec<BondRef>;

    /// Bond sets of the rings in the graph. Empty for acyclic graphs.
    fn ring_bond_sets(&self) -> Vec<BTreeSet<BondRef>>;

    fn apply_edit<R: Rng + ?Sized>(&mut self, edit: Edit, rng: &mut R) -> Result<(), EditError>;

    /// Combine `self` with `other` into a new graph.
    fn recombine<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R)
    -> Result<Self, RecombineError>;

    fn atom_count(&self) -> usize {
        self.atoms(AtomClass::Any).len()
    }

    /// Textual form used for seeds and checkpoints.
    fn to_exchange(&self) -> String;

    fn from_exchange(text: &str) -> Result<Self, ExchangeError>;

    /// Founders used when no seed library is configured.
    fn presets() -> Vec<Self> {
        Vec::new()
    }
}

/// Bonds shared by every ring, excluding grouped bonds.
///
/// Breaking one of these opens all rings at once. Empty when the graph has
/// no rings.
pub fn common_ring_bonds<G: MolGraph>(graph: &G) -> Vec<BondRef> {
    let rings = graph.ring_bond_sets();
    let mut iter = rings.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let common = iter.fold(first, |acc, ring| &acc & &ring);

    let eligible: BTreeSet<BondRef> = graph.bonds(BondClass::Ungrouped).into_iter().collect();
    common.intersection(&eligible).copied().collect()
}
