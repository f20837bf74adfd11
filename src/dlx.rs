//! Dancing-links exact cover.
//!
//! The matrix is rebuilt for every call from the current open cells and
//! inventory:
//!
//! - one primary column per open cell, to be covered exactly once;
//! - one secondary column per available piece copy, covered at most once;
//! - one row per placement inside the open cells, repeated for every copy
//!   of its piece.
//!
//! Nodes live in side tables indexed by node number instead of heap links.
//! Node 0 is the root header, nodes `1..=columns` are the column headers.
//!
//! Repeated rows make every placement set appear once per assignment of
//! copies to placements. Only the canonical assignment is counted: for each
//! piece, copy slots `0..k` go to its placements in increasing candidate
//! order.

use std::time::Instant;

use serde::Serialize;

use crate::bitboard::Bitboard;
use crate::inventory::Inventory;
use crate::precompute::{CandidateId, Precomputed};

/// Nodes between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

const ROOT: usize = 0;

/// Limits for a DLX run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DlxOptions {
    /// Stop after this many solutions; 0 means count them all.
    pub max_solutions: u64,
    pub deadline: Option<Instant>,
    /// Keep the first completion found.
    pub want_witness: bool,
}

impl DlxOptions {
    /// Stops at the first completion and keeps it.
    pub fn first_witness() -> Self {
        Self {
            max_solutions: 1,
            deadline: None,
            want_witness: true,
        }
    }
}

/// Why a DLX run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DlxReason {
    Complete,
    Limit,
    Timeout,
}

/// Feasibility, count and optional witness of a DLX run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlxResult {
    pub feasible: bool,
    pub reason: DlxReason,
    pub solutions: u64,
    pub witness: Option<Vec<CandidateId>>,
    pub nodes: u64,
}

#[derive(Debug, Clone, Copy)]
struct RowMeta {
    candidate: CandidateId,
    piece: usize,
    slot: u8,
}

/// Sparse toroidal matrix in side-table form.
struct Matrix {
    left: Vec<usize>,
    right: Vec<usize>,
    up: Vec<usize>,
    down: Vec<usize>,
    column: Vec<usize>,
    /// Row index per node; unused for headers.
    row: Vec<usize>,
    /// Live node count per column header.
    size: Vec<usize>,
    rows: Vec<RowMeta>,
}

impl Matrix {
    fn build(pre: &Precomputed, open: &Bitboard, inventory: &Inventory) -> Self {
        let mut cell_column = vec![usize::MAX; pre.cell_count()];
        let mut primary = 0;
        for cell in open.ones() {
            primary += 1;
            cell_column[cell] = primary;
        }

        // secondary columns follow the primaries, one per piece copy
        let mut slot_base = vec![0usize; inventory.len()];
        let mut next = primary + 1;
        for (piece, base) in slot_base.iter_mut().enumerate() {
            *base = next;
            next += inventory.get(piece) as usize;
        }
        let headers = next;

        let mut m = Matrix {
            left: (0..headers).map(|i| i.wrapping_sub(1)).collect(),
            right: (0..headers).map(|i| i + 1).collect(),
            up: (0..headers).collect(),
            down: (0..headers).collect(),
            column: (0..headers).collect(),
            row: vec![usize::MAX; headers],
            size: vec![0; headers],
            rows: Vec::new(),
        };
        // only primaries are linked into the root ring
        m.left[ROOT] = primary;
        m.right[primary] = ROOT;
        for h in primary + 1..headers {
            m.left[h] = h;
            m.right[h] = h;
        }

        for (id, candidate) in pre.candidates().iter().enumerate() {
            let copies = inventory.get(candidate.piece);
            if copies == 0 || !candidate.mask.is_subset(open) {
                continue;
            }
            for slot in 0..copies {
                let mut columns = candidate.cells.map(|c| cell_column[c as usize]).to_vec();
                columns.push(slot_base[candidate.piece] + slot as usize);
                m.add_row(
                    &columns,
                    RowMeta {
                        candidate: id as CandidateId,
                        piece: candidate.piece,
                        slot,
                    },
                );
            }
        }
        m
    }

    fn add_row(&mut self, columns: &[usize], meta: RowMeta) {
        let row = self.rows.len();
        self.rows.push(meta);
        let first = self.left.len();
        for (offset, &col) in columns.iter().enumerate() {
            let node = first + offset;
            let last = self.up[col];
            self.up.push(last);
            self.down.push(col);
            self.down[last] = node;
            self.up[col] = node;
            self.column.push(col);
            self.row.push(row);
            self.size[col] += 1;
            // circular row links
            let prev = if offset == 0 { first + columns.len() - 1 } else { node - 1 };
            let succ = if offset + 1 == columns.len() { first } else { node + 1 };
            self.left.push(prev);
            self.right.push(succ);
        }
    }

    fn cover(&mut self, c: usize) {
        let (l, r) = (self.left[c], self.right[c]);
        self.right[l] = r;
        self.left[r] = l;
        let mut i = self.down[c];
        while i != c {
            let mut j = self.right[i];
            while j != i {
                let (u, d) = (self.up[j], self.down[j]);
                self.down[u] = d;
                self.up[d] = u;
                self.size[self.column[j]] -= 1;
                j = self.right[j];
            }
            i = self.down[i];
        }
    }

    fn uncover(&mut self, c: usize) {
        let mut i = self.up[c];
        while i != c {
            let mut j = self.left[i];
            while j != i {
                self.size[self.column[j]] += 1;
                let (u, d) = (self.up[j], self.down[j]);
                self.down[u] = j;
                self.up[d] = j;
                j = self.left[j];
            }
            i = self.up[i];
        }
        let (l, r) = (self.left[c], self.right[c]);
        self.right[l] = c;
        self.left[r] = c;
    }

    /// Uncovered primary column with the fewest rows.
    fn smallest_column(&self) -> usize {
        let mut best = self.right[ROOT];
        let mut c = self.right[best];
        while c != ROOT {
            if self.size[c] < self.size[best] {
                best = c;
            }
            c = self.right[c];
        }
        best
    }
}

struct Search {
    m: Matrix,
    options: DlxOptions,
    chosen: Vec<usize>,
    solutions: u64,
    nodes: u64,
    witness: Option<Vec<CandidateId>>,
    stop: Option<DlxReason>,
}

impl Search {
    fn run(&mut self) {
        if self.m.right[ROOT] == ROOT {
            self.record();
            return;
        }
        self.nodes += 1;
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.options.deadline {
                if Instant::now() >= deadline {
                    self.stop = Some(DlxReason::Timeout);
                    return;
                }
            }
        }

        let c = self.m.smallest_column();
        if self.m.size[c] == 0 {
            return;
        }
        self.m.cover(c);
        let mut r = self.m.down[c];
        while r != c {
            self.chosen.push(r);
            let mut j = self.m.right[r];
            while j != r {
                self.m.cover(self.m.column[j]);
                j = self.m.right[j];
            }

            self.run();

            let mut j = self.m.left[r];
            while j != r {
                self.m.uncover(self.m.column[j]);
                j = self.m.left[j];
            }
            self.chosen.pop();
            if self.stop.is_some() {
                break;
            }
            r = self.m.down[r];
        }
        self.m.uncover(c);
    }

    fn record(&mut self) {
        let mut rows: Vec<RowMeta> = self
            .chosen
            .iter()
            .map(|&node| self.m.rows[self.m.row[node]])
            .collect();
        rows.sort_by_key(|r| (r.piece, r.candidate));
        let canonical = rows.chunk_by(|a, b| a.piece == b.piece).all(|group| {
            group
                .iter()
                .enumerate()
                .all(|(i, r)| r.slot as usize == i)
        });
        if !canonical {
            return;
        }

        self.solutions += 1;
        if self.options.want_witness && self.witness.is_none() {
            self.witness = Some(
                self.chosen
                    .iter()
                    .map(|&node| self.m.rows[self.m.row[node]].candidate)
                    .collect(),
            );
        }
        if self.options.max_solutions > 0 && self.solutions >= self.options.max_solutions {
            self.stop = Some(DlxReason::Limit);
        }
    }
}

/// Solves the exact cover of `open` with the pieces left in `inventory`.
pub fn solve(
    pre: &Precomputed,
    open: Bitboard,
    inventory: &Inventory,
    options: DlxOptions,
) -> DlxResult {
    let mut search = Search {
        m: Matrix::build(pre, &open, inventory),
        options,
        chosen: Vec::new(),
        solutions: 0,
        nodes: 0,
        witness: None,
        stop: None,
    };
    search.run();
    DlxResult {
        feasible: search.solutions > 0,
        reason: search.stop.unwrap_or(DlxReason::Complete),
        solutions: search.solutions,
        witness: search.witness,
        nodes: search.nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{Container, Lattice};
    use crate::pieces::PieceCatalog;

    fn puzzle(container: Container) -> Precomputed {
        let catalog = PieceCatalog::demo(container.lattice()).unwrap();
        Precomputed::build(&container, &catalog).unwrap()
    }

    /// Plain lowest-open-cell enumeration, for cross-checking.
    fn brute_force(pre: &Precomputed, open: Bitboard, inventory: &mut Inventory) -> u64 {
        let Some(cell) = open.first() else {
            return 1;
        };
        let mut total = 0;
        for &id in pre.candidates_for(cell) {
            let c = pre.candidate(id);
            if inventory.available(c.piece) && c.mask.is_subset(&open) {
                inventory.take(c.piece, '?').unwrap();
                total += brute_force(pre, open.and_not(&c.mask), inventory);
                inventory.give_back(c.piece);
            }
        }
        total
    }

    #[test]
    fn test_counts_match_brute_force() {
        for (container, copies) in [
            (Container::block(Lattice::Fcc, (2, 2, 2)).unwrap(), 2),
            (Container::block(Lattice::Fcc, (2, 2, 3)).unwrap(), 1),
            (Container::block(Lattice::Cubic, (2, 2, 3)).unwrap(), 2),
        ] {
            let pre = puzzle(container);
            let mut inventory = Inventory::uniform(pre.piece_ids().len(), copies);
            let expected = brute_force(&pre, pre.full(), &mut inventory);
            let result = solve(&pre, pre.full(), &inventory, DlxOptions::default());
            assert_eq!(result.reason, DlxReason::Complete);
            assert_eq!(result.solutions, expected, "copies={copies}");
            assert_eq!(result.feasible, expected > 0);
        }
    }

    #[test]
    fn test_witness_is_an_exact_cover() {
        let pre = puzzle(Container::block(Lattice::Cubic, (2, 2, 2)).unwrap());
        let inventory = Inventory::uniform(pre.piece_ids().len(), 2);
        let result = solve(&pre, pre.full(), &inventory, DlxOptions::first_witness());
        assert!(result.feasible);
        assert_eq!(result.reason, DlxReason::Limit);
        let witness = result.witness.unwrap();
        let mut covered = Bitboard::EMPTY;
        for id in witness {
            let mask = pre.candidate(id).mask;
            assert!(!covered.intersects(&mask));
            covered |= mask;
        }
        assert_eq!(covered, pre.full());
    }

    #[test]
    fn test_infeasible_line_reports_complete() {
        let container = Container::new(Lattice::Fcc, (0..8).map(|i| (i, 0, 0))).unwrap();
        let pre = puzzle(container);
        let mut inventory = Inventory::uniform(pre.piece_ids().len(), 0);
        inventory.give_back(pre.piece_index('T').unwrap());
        inventory.give_back(pre.piece_index('T').unwrap());
        let result = solve(&pre, pre.full(), &inventory, DlxOptions::default());
        assert!(!result.feasible);
        assert_eq!(result.reason, DlxReason::Complete);
        assert_eq!(result.solutions, 0);
    }

    #[test]
    fn test_spare_copies_do_not_inflate_counts() {
        let container = Container::new(Lattice::Fcc, (0..8).map(|i| (i, 0, 0))).unwrap();
        let pre = puzzle(container);
        let mut inventory = Inventory::uniform(pre.piece_ids().len(), 0);
        for _ in 0..3 {
            inventory.give_back(pre.piece_index('I').unwrap());
        }
        let result = solve(&pre, pre.full(), &inventory, DlxOptions::default());
        assert_eq!(result.solutions, 1);
    }

    #[test]
    fn test_partial_open_set() {
        let pre = puzzle(Container::new(Lattice::Fcc, (0..8).map(|i| (i, 0, 0))).unwrap());
        let inventory = Inventory::uniform(pre.piece_ids().len(), 1);
        let open = Bitboard::from_indices(4..8);
        let result = solve(&pre, open, &inventory, DlxOptions::first_witness());
        assert!(result.feasible);
        assert_eq!(result.witness.map(|w| w.len()), Some(1));
        assert!(solve(&pre, Bitboard::EMPTY, &inventory, DlxOptions::default()).feasible);
    }
}
