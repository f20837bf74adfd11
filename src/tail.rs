//! Exact-cover backtracking for small residual problems.
//!
//! The tail solver works on a private copy of the open mask and inventory,
//! always branching on the open cell with the fewest fitting placements.
//! The search engine hands it the last few cells of a branch; it is also a
//! standalone solvability oracle.

use std::time::Instant;

use crate::bitboard::Bitboard;
use crate::inventory::Inventory;
use crate::precompute::{CandidateId, Precomputed};
use crate::prune::color_residue;

/// Result of a tail solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailOutcome {
    /// One completion, in placement order.
    Solved(Vec<CandidateId>),
    /// Exhaustively proven to have no completion.
    Unsolvable,
    /// The caller's deadline passed before the search finished.
    TimedOut,
}

/// Feasibility record returned by [`TailSolver::solve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailResult {
    pub outcome: TailOutcome,
    pub nodes: u64,
}

impl TailResult {
    pub fn feasible(&self) -> bool {
        matches!(self.outcome, TailOutcome::Solved(_))
    }
}

pub struct TailSolver<'a> {
    pre: &'a Precomputed,
    color_residue: bool,
    deadline: Option<Instant>,
    nodes: u64,
    timed_out: bool,
}

impl<'a> TailSolver<'a> {
    pub fn new(pre: &'a Precomputed) -> Self {
        Self {
            pre,
            color_residue: false,
            deadline: None,
            nodes: 0,
            timed_out: false,
        }
    }

    /// Applies the parity residue rule to every tentative placement.
    pub fn with_color_residue(mut self, enabled: bool) -> Self {
        self.color_residue = enabled;
        self
    }

    /// Abandons the search once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Searches for one way to cover every cell of `open` using `inventory`.
    pub fn solve(mut self, open: Bitboard, inventory: &Inventory) -> TailResult {
        let mut inventory = inventory.clone();
        let mut placed = Vec::with_capacity(open.count() as usize / 4);
        let outcome = if self.search(open, &mut inventory, &mut placed) {
            TailOutcome::Solved(placed)
        } else if self.timed_out {
            TailOutcome::TimedOut
        } else {
            TailOutcome::Unsolvable
        };
        TailResult {
            outcome,
            nodes: self.nodes,
        }
    }

    fn search(
        &mut self,
        open: Bitboard,
        inventory: &mut Inventory,
        placed: &mut Vec<CandidateId>,
    ) -> bool {
        if open.is_empty() {
            return true;
        }
        self.nodes += 1;
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            self.timed_out = true;
        }
        if self.timed_out {
            return false;
        }

        let Some(cell) = self.most_constrained(&open, inventory) else {
            return false;
        };

        for &id in self.pre.candidates_for(cell) {
            let candidate = self.pre.candidate(id);
            if !inventory.available(candidate.piece) || !candidate.mask.is_subset(&open) {
                continue;
            }
            let rest = open.and_not(&candidate.mask);
            if self.color_residue && !color_residue(&rest, self.pre.parity()) {
                continue;
            }

            if inventory
                .take(candidate.piece, self.pre.piece_ids()[candidate.piece])
                .is_err()
            {
                continue;
            }
            placed.push(id);
            if self.search(rest, inventory, placed) {
                return true;
            }
            placed.pop();
            inventory.give_back(candidate.piece);
            if self.timed_out {
                return false;
            }
        }
        false
    }

    /// Open cell with the fewest fitting candidates; `None` if some open cell
    /// has none at all.
    fn most_constrained(&self, open: &Bitboard, inventory: &Inventory) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for cell in open.ones() {
            let fitting = fitting_count(self.pre, cell, open, inventory, best.map(|b| b.1));
            if fitting == 0 {
                return None;
            }
            if best.map_or(true, |(_, count)| fitting < count) {
                best = Some((cell, fitting));
                if fitting == 1 {
                    break;
                }
            }
        }
        best.map(|(cell, _)| cell)
    }
}

/// Counts candidates at `cell` that fit `open` with stock left, stopping
/// early once `cap` is reached.
#[inline]
pub(crate) fn fitting_count(
    pre: &Precomputed,
    cell: usize,
    open: &Bitboard,
    inventory: &Inventory,
    cap: Option<usize>,
) -> usize {
    let cap = cap.unwrap_or(usize::MAX);
    let mut count = 0;
    for &id in pre.candidates_for(cell) {
        let candidate = pre.candidate(id);
        if inventory.available(candidate.piece) && candidate.mask.is_subset(open) {
            count += 1;
            if count >= cap {
                break;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{Container, Lattice};
    use crate::pieces::PieceCatalog;

    fn line_puzzle(len: i32) -> Precomputed {
        let container = Container::new(Lattice::Fcc, (0..len).map(|i| (i, 0, 0))).unwrap();
        Precomputed::build(&container, &PieceCatalog::demo(Lattice::Fcc).unwrap()).unwrap()
    }

    fn counts(pre: &Precomputed, pairs: &[(char, u8)]) -> Inventory {
        let mut inventory = Inventory::uniform(pre.piece_ids().len(), 0);
        for &(id, n) in pairs {
            let piece = pre.piece_index(id).unwrap();
            for _ in 0..n {
                inventory.give_back(piece);
            }
        }
        inventory
    }

    #[test]
    fn test_two_lines_fill_a_line_of_eight() {
        let pre = line_puzzle(8);
        let result = TailSolver::new(&pre).solve(pre.full(), &counts(&pre, &[('I', 2)]));
        let TailOutcome::Solved(placed) = &result.outcome else {
            panic!("expected a solution, got {:?}", result.outcome);
        };
        assert_eq!(placed.len(), 2);
        let union = placed
            .iter()
            .fold(Bitboard::EMPTY, |acc, &id| acc | pre.candidate(id).mask);
        assert_eq!(union, pre.full());
    }

    #[test]
    fn test_bent_pieces_cannot_fill_a_line() {
        let pre = line_puzzle(8);
        let result = TailSolver::new(&pre).solve(pre.full(), &counts(&pre, &[('T', 2), ('L', 2)]));
        assert_eq!(result.outcome, TailOutcome::Unsolvable);
    }

    #[test]
    fn test_inventory_bounds_are_respected() {
        let pre = line_puzzle(8);
        let result = TailSolver::new(&pre).solve(pre.full(), &counts(&pre, &[('I', 1)]));
        assert_eq!(result.outcome, TailOutcome::Unsolvable);
    }

    #[test]
    fn test_empty_residual_is_trivially_solved() {
        let pre = line_puzzle(4);
        let result = TailSolver::new(&pre).solve(Bitboard::EMPTY, &counts(&pre, &[]));
        assert_eq!(result.outcome, TailOutcome::Solved(vec![]));
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let pre = line_puzzle(8);
        let past = Instant::now();
        let solver = TailSolver::new(&pre).with_deadline(Some(past));
        let result = solver.solve(pre.full(), &counts(&pre, &[('T', 2)]));
        assert_eq!(result.outcome, TailOutcome::TimedOut);
        // the deadline is consulted on entry, before any branching
        assert_eq!(result.nodes, 1);
    }
}
