//! Dead-state predicates over the open-cell mask.
//!
//! Each check looks at the cells still open after a tentative placement and
//! answers whether the state may still be completable. None of them ever
//! fail; a `false` is only a pruning decision.

use crate::bitboard::Bitboard;
use crate::config::Pruning;
use crate::pieces::CELLS_PER_PIECE;
use crate::precompute::Precomputed;

/// Which rule rejected a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prune {
    NeighborTouch,
    ColorResidue,
    MultipleOf4,
    Connectivity,
    ComponentResidue,
}

#[inline]
pub fn multiple_of_four(open: &Bitboard) -> bool {
    open.count() as usize % CELLS_PER_PIECE == 0
}

/// Both parity classes hold an even number of open cells and the total is
/// divisible by four.
#[inline]
pub fn color_residue(open: &Bitboard, parity: &[Bitboard; 2]) -> bool {
    let even = (*open & parity[0]).count();
    let odd = (*open & parity[1]).count();
    even % 2 == 0 && odd % 2 == 0 && (even + odd) as usize % CELLS_PER_PIECE == 0
}

/// Flood-fills the open region containing `seed`.
#[inline]
pub fn component(open: &Bitboard, seed: usize, pre: &Precomputed) -> Bitboard {
    let mut reached = Bitboard::from_indices([seed]);
    let mut frontier = reached;
    while !frontier.is_empty() {
        let mut grown = Bitboard::EMPTY;
        for cell in frontier.ones() {
            grown |= pre.neighbor_mask(cell);
        }
        frontier = (grown & *open).and_not(&reached);
        reached |= frontier;
    }
    reached
}

/// The open cells form a single connected region (or none).
pub fn connected(open: &Bitboard, pre: &Precomputed) -> bool {
    match open.first() {
        None => true,
        Some(seed) => component(open, seed, pre) == *open,
    }
}

/// Every connected open region has a size divisible by four.
pub fn component_residue(open: &Bitboard, pre: &Precomputed) -> bool {
    let mut rest = *open;
    while let Some(seed) = rest.first() {
        let region = component(&rest, seed, pre);
        if region.count() as usize % CELLS_PER_PIECE != 0 {
            return false;
        }
        rest = rest.and_not(&region);
    }
    true
}

/// Runs the enabled rules against the open set left by a placement, cheapest
/// first. `touch` reports whether the placement's halo meets an earlier
/// piece; it is only consulted when neighbor-touch pruning applies.
pub fn check(
    rules: &Pruning,
    open: &Bitboard,
    touch: Option<bool>,
    pre: &Precomputed,
) -> Result<(), Prune> {
    if rules.neighbor_touch && touch == Some(false) {
        return Err(Prune::NeighborTouch);
    }
    if rules.color_residue && !color_residue(open, pre.parity()) {
        return Err(Prune::ColorResidue);
    }
    if rules.multiple_of_4 && !multiple_of_four(open) {
        return Err(Prune::MultipleOf4);
    }
    if rules.connectivity && !connected(open, pre) {
        return Err(Prune::Connectivity);
    }
    if rules.component_residue && !component_residue(open, pre) {
        return Err(Prune::ComponentResidue);
    }
    Ok(())
}
