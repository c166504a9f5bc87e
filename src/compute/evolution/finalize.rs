//! Candidate finalizer: validate a freshly edited graph and refresh its
//! identity.

use crate::compute::{MolGraph, ValidationError};
use crate::schema::Molecule;

/// Sanitize the graph and recompute the canonical identity in place.
///
/// On error the identity stays unset; callers discard the attempt.
pub fn finalize<G: MolGraph>(molecule: &mut Molecule<G>) -> Result<(), ValidationError> {
    molecule.props.canonical_id = None;
    molecule.graph.sanitize()?;
    molecule.props.canonical_id = Some(molecule.graph.canonical_id());
    Ok(())
}

/// True when the molecule still sanitizes. Does not touch its properties.
pub fn is_sane<G: MolGraph>(molecule: &Molecule<G>) -> bool {
    molecule.graph.clone().sanitize().is_ok()
}
