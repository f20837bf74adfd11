//! Search-space estimates for a container and inventory.
//!
//! Read-only diagnostics: how many placements each piece has, how densely
//! the cells are covered, and two upper bounds on the number of solutions.
//! Nothing here feeds back into solving.

use std::fmt;

use serde::Serialize;

use crate::bitboard::Bitboard;
use crate::inventory::Inventory;
use crate::pieces::{Coord, PieceId, CELLS_PER_PIECE};
use crate::precompute::Precomputed;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceEstimate {
    pub piece: PieceId,
    pub count: u8,
    /// Placements of this piece inside the open cells.
    pub placements: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSpaceEstimate {
    pub cells: usize,
    pub open_cells: usize,
    pub pieces_needed: usize,
    pub pieces_available: usize,
    /// Placements usable with the current inventory.
    pub placements: usize,
    pub per_piece: Vec<PieceEstimate>,
    pub min_per_cell: usize,
    pub max_per_cell: usize,
    pub mean_per_cell: f64,
    /// Open cell with the fewest usable placements, and that count.
    pub most_constrained: Option<(Coord, usize)>,
    /// Open cells no usable placement covers.
    pub uncoverable: Vec<Coord>,
    /// log10 of C(placements, pieces needed).
    pub log10_choose_bound: Option<f64>,
    /// log10 of the product of the largest per-cell counts, one per piece
    /// needed.
    pub log10_branching_bound: Option<f64>,
}

impl SearchSpaceEstimate {
    /// True when some open cell can never be covered.
    pub fn trivially_infeasible(&self) -> bool {
        !self.uncoverable.is_empty()
            || self.open_cells % CELLS_PER_PIECE != 0
            || self.pieces_available < self.pieces_needed
    }
}

/// Gathers placement statistics for `open` with the pieces in `inventory`.
pub fn estimate(pre: &Precomputed, open: Bitboard, inventory: &Inventory) -> SearchSpaceEstimate {
    let usable = |piece: usize, mask: &Bitboard| inventory.available(piece) && mask.is_subset(&open);

    let mut per_piece: Vec<PieceEstimate> = pre
        .piece_ids()
        .iter()
        .enumerate()
        .map(|(piece, &id)| PieceEstimate {
            piece: id,
            count: inventory.get(piece),
            placements: 0,
        })
        .collect();
    let mut placements = 0;
    for candidate in pre.candidates() {
        if usable(candidate.piece, &candidate.mask) {
            per_piece[candidate.piece].placements += 1;
            placements += 1;
        }
    }

    let per_cell: Vec<(usize, usize)> = open
        .ones()
        .map(|cell| {
            let fitting = pre
                .candidates_for(cell)
                .iter()
                .filter(|&&id| {
                    let c = pre.candidate(id);
                    usable(c.piece, &c.mask)
                })
                .count();
            (cell, fitting)
        })
        .collect();

    let open_cells = per_cell.len();
    let pieces_needed = open_cells / CELLS_PER_PIECE;
    let min_per_cell = per_cell.iter().map(|&(_, n)| n).min().unwrap_or(0);
    let max_per_cell = per_cell.iter().map(|&(_, n)| n).max().unwrap_or(0);
    let mean_per_cell = if open_cells == 0 {
        0.0
    } else {
        per_cell.iter().map(|&(_, n)| n).sum::<usize>() as f64 / open_cells as f64
    };
    let most_constrained = per_cell
        .iter()
        .min_by_key(|&&(_, n)| n)
        .map(|&(cell, n)| (pre.coord(cell), n));
    let uncoverable = per_cell
        .iter()
        .filter(|&&(_, n)| n == 0)
        .map(|&(cell, _)| pre.coord(cell))
        .collect();

    let mut counts: Vec<usize> = per_cell.iter().map(|&(_, n)| n).collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    let log10_branching_bound = if counts.iter().take(pieces_needed).any(|&n| n == 0) {
        None
    } else {
        Some(counts.iter().take(pieces_needed).map(|&n| (n as f64).log10()).sum())
    };

    SearchSpaceEstimate {
        cells: pre.cell_count(),
        open_cells,
        pieces_needed,
        pieces_available: inventory.total(),
        placements,
        per_piece,
        min_per_cell,
        max_per_cell,
        mean_per_cell,
        most_constrained,
        uncoverable,
        log10_choose_bound: log10_choose(placements, pieces_needed),
        log10_branching_bound,
    }
}

/// log10 of the binomial coefficient, or `None` when it is zero.
fn log10_choose(n: usize, k: usize) -> Option<f64> {
    if k > n {
        return None;
    }
    let k = k.min(n - k);
    Some(
        (0..k)
            .map(|i| ((n - i) as f64).log10() - ((i + 1) as f64).log10())
            .sum(),
    )
}

impl fmt::Display for SearchSpaceEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "cells: {} ({} open, {} pieces needed, {} available)",
            self.cells, self.open_cells, self.pieces_needed, self.pieces_available
        )?;
        writeln!(f, "placements: {}", self.placements)?;
        for p in &self.per_piece {
            writeln!(f, "  {} x{}: {} placements", p.piece, p.count, p.placements)?;
        }
        writeln!(
            f,
            "per cell: min {} / mean {:.2} / max {}",
            self.min_per_cell, self.mean_per_cell, self.max_per_cell
        )?;
        if let Some((coord, n)) = self.most_constrained {
            writeln!(f, "most constrained: {coord:?} with {n}")?;
        }
        if !self.uncoverable.is_empty() {
            writeln!(f, "uncoverable: {:?}", self.uncoverable)?;
        }
        let bound = |b: Option<f64>| b.map_or("0".to_string(), |v| format!("10^{v:.2}"));
        writeln!(f, "choose bound: {}", bound(self.log10_choose_bound))?;
        write!(f, "branching bound: {}", bound(self.log10_branching_bound))
    }
}
