//! Deduplication by canonical identity.

use super::error::EvolutionError;
use crate::schema::Molecule;

/// Collapse molecules sharing a canonical identity.
///
/// Molecules are sorted by identity and merged in one pass. Of two
/// duplicates the one with the higher information score survives; on a tie
/// the later one in the scan wins. The survivor absorbs the other's
/// `selected_count`, so the total count is conserved.
pub fn remove_duplicates<G>(
    mut molecules: Vec<Molecule<G>>,
) -> Result<Vec<Molecule<G>>, EvolutionError> {
    if let Some(pos) = molecules.iter().position(|m| m.props.canonical_id.is_none()) {
        return Err(EvolutionError::MissingCanonicalId(pos));
    }

    molecules.sort_by(|a, b| a.props.canonical_id.cmp(&b.props.canonical_id));

    let mut kept: Vec<Molecule<G>> = Vec::with_capacity(molecules.len());
    for mut current in molecules {
        match kept.last_mut() {
            Some(last) if last.props.canonical_id == current.props.canonical_id => {
                let total = last
                    .props
                    .selected_count
                    .saturating_add(current.props.selected_count);
                if current.information_score() >= last.information_score() {
                    current.props.selected_count = total;
                    *last = current;
                } else {
                    last.props.selected_count = total;
                }
            }
            _ => kept.push(current),
        }
    }
    Ok(kept)
}
