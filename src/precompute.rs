//! Bitboard precompute.
//!
//! Enumerates every legal placement of every piece orientation inside the
//! container once, up front. Each placement is stored both as a bit-mask
//! (for collision checks) and as an explicit list of cell indices (for
//! hashing and rendering). Alongside the placements this module builds the
//! per-cell neighbor masks, the parity 2-coloring and the Zobrist keys the
//! solvers share.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::bitboard::Bitboard;
use crate::error::{Result, SolverError};
use crate::inventory::Inventory;
use crate::lattice::Container;
use crate::pieces::{Coord, PieceCatalog, PieceId, PlacedPiece, CELLS_PER_PIECE};

/// Highest inventory count that has its own Zobrist key.
pub const MAX_TRACKED_COUNT: usize = 10;

/// Fixed seed for Zobrist keys so hashes are reproducible across runs.
const ZOBRIST_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Index of a candidate in [`Precomputed::candidates`].
pub type CandidateId = u32;

/// One concrete placement of a piece orientation inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Index into [`Precomputed::piece_ids`].
    pub piece: usize,
    pub orientation: u16,
    pub translation: Coord,
    pub mask: Bitboard,
    pub cells: [u16; CELLS_PER_PIECE],
    /// Container cells touching the placement, excluding its own cells.
    pub halo: Bitboard,
}

/// Everything the solvers need about a container and catalog pair.
#[derive(Debug, Clone)]
pub struct Precomputed {
    coords: Vec<Coord>,
    piece_ids: Vec<PieceId>,
    candidates: Vec<Candidate>,
    by_cell: Vec<Vec<CandidateId>>,
    full: Bitboard,
    neighbor_masks: Vec<Bitboard>,
    parity: [Bitboard; 2],
    cell_keys: Vec<u64>,
    count_keys: Vec<[u64; MAX_TRACKED_COUNT + 1]>,
}

impl Precomputed {
    /// Builds the tables with every in-bounds placement.
    pub fn build(container: &Container, catalog: &PieceCatalog) -> Result<Self> {
        Self::build_filtered(container, catalog, |_| true)
    }

    /// Builds the tables, keeping only placements accepted by `admit`.
    pub fn build_filtered<F>(container: &Container, catalog: &PieceCatalog, mut admit: F) -> Result<Self>
    where
        F: FnMut(&Candidate) -> bool,
    {
        if container.lattice() != catalog.lattice() {
            return Err(SolverError::LatticeMismatch {
                container: container.lattice(),
                catalog: catalog.lattice(),
            });
        }

        let n = container.len();
        let neighbor_masks: Vec<Bitboard> = (0..n)
            .map(|idx| Bitboard::from_indices(container.neighbors(idx).iter().copied()))
            .collect();

        let piece_ids: Vec<PieceId> = catalog.ids().collect();
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_signature: FxHashMap<(usize, u16, Bitboard), CandidateId> = FxHashMap::default();
        let mut by_cell: Vec<Vec<CandidateId>> = vec![Vec::new(); n];

        for (target, &target_coord) in container.cells().iter().enumerate() {
            let mut seen: FxHashSet<(usize, u16, Bitboard)> = FxHashSet::default();
            for (piece, (_, orientations)) in catalog.iter().enumerate() {
                for orientation in orientations {
                    for &anchor in &orientation.cells {
                        let translation = (
                            target_coord.0 - anchor.0,
                            target_coord.1 - anchor.1,
                            target_coord.2 - anchor.2,
                        );
                        let Some(cells) = resolve(container, &orientation.cells, translation) else {
                            continue;
                        };
                        let mask = Bitboard::from_indices(cells.iter().map(|&c| c as usize));
                        let signature = (piece, orientation.id, mask);
                        // distinct anchors can land the same absolute placement
                        if !seen.insert(signature) {
                            continue;
                        }

                        let id = match by_signature.get(&signature) {
                            Some(&id) => id,
                            None => {
                                let halo = cells
                                    .iter()
                                    .fold(Bitboard::EMPTY, |acc, &c| acc | neighbor_masks[c as usize])
                                    .and_not(&mask);
                                let candidate = Candidate {
                                    piece,
                                    orientation: orientation.id,
                                    translation,
                                    mask,
                                    cells,
                                    halo,
                                };
                                if !admit(&candidate) {
                                    continue;
                                }
                                let id = candidates.len() as CandidateId;
                                candidates.push(candidate);
                                by_signature.insert(signature, id);
                                id
                            }
                        };
                        by_cell[target].push(id);
                    }
                }
            }
        }

        let mut parity = [Bitboard::EMPTY; 2];
        for (idx, &(x, y, z)) in container.cells().iter().enumerate() {
            parity[(x + y + z).rem_euclid(2) as usize].insert(idx);
        }

        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
        let cell_keys = (0..n).map(|_| rng.gen()).collect();
        let count_keys = piece_ids
            .iter()
            .map(|_| {
                let mut keys = [0u64; MAX_TRACKED_COUNT + 1];
                for key in &mut keys {
                    *key = rng.gen();
                }
                keys
            })
            .collect();

        debug!(
            cells = n,
            pieces = piece_ids.len(),
            candidates = candidates.len(),
            "precomputed placements"
        );

        Ok(Self {
            coords: container.cells().to_vec(),
            piece_ids,
            candidates,
            by_cell,
            full: Bitboard::full(n),
            neighbor_masks,
            parity,
            cell_keys,
            count_keys,
        })
    }

    /// Number of container cells.
    pub fn cell_count(&self) -> usize {
        self.coords.len()
    }

    pub fn piece_ids(&self) -> &[PieceId] {
        &self.piece_ids
    }

    /// Index of a piece id in [`Precomputed::piece_ids`].
    pub fn piece_index(&self, id: PieceId) -> Option<usize> {
        self.piece_ids.iter().position(|&p| p == id)
    }

    /// All unique placements.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    #[inline(always)]
    pub fn candidate(&self, id: CandidateId) -> &Candidate {
        &self.candidates[id as usize]
    }

    /// Placements covering `cell`, in generation order.
    #[inline(always)]
    pub fn candidates_for(&self, cell: usize) -> &[CandidateId] {
        &self.by_cell[cell]
    }

    /// Mask with every container cell set.
    #[inline(always)]
    pub fn full(&self) -> Bitboard {
        self.full
    }

    #[inline(always)]
    pub fn neighbor_mask(&self, cell: usize) -> Bitboard {
        self.neighbor_masks[cell]
    }

    /// The two coordinate-sum parity classes.
    #[inline(always)]
    pub fn parity(&self) -> &[Bitboard; 2] {
        &self.parity
    }

    #[inline(always)]
    pub fn cell_key(&self, cell: usize) -> u64 {
        self.cell_keys[cell]
    }

    /// Zobrist key for a piece holding `count` copies, clamped to the table.
    #[inline(always)]
    pub fn count_key(&self, piece: usize, count: u8) -> u64 {
        self.count_keys[piece][(count as usize).min(MAX_TRACKED_COUNT)]
    }

    /// Hash of a state computed from scratch: open-cell keys XOR the
    /// per-piece count keys. The search keeps this value incrementally.
    pub fn hash_state(&self, open: &Bitboard, inventory: &Inventory) -> u64 {
        let cells = open.ones().fold(0u64, |h, c| h ^ self.cell_keys[c]);
        (0..self.piece_ids.len()).fold(cells, |h, p| h ^ self.count_key(p, inventory.get(p)))
    }

    pub fn coord(&self, cell: usize) -> Coord {
        self.coords[cell]
    }

    /// Converts a candidate into its absolute placement.
    pub fn placed(&self, id: CandidateId) -> PlacedPiece {
        let candidate = self.candidate(id);
        PlacedPiece {
            piece: self.piece_ids[candidate.piece],
            orientation: candidate.orientation,
            translation: candidate.translation,
            cells: candidate.cells.map(|c| self.coords[c as usize]),
        }
    }
}

/// Maps orientation cells translated by `offset` to container indices.
///
/// Returns `None` if any cell falls outside the container.
fn resolve(
    container: &Container,
    orientation: &[Coord; CELLS_PER_PIECE],
    offset: Coord,
) -> Option<[u16; CELLS_PER_PIECE]> {
    let mut cells = [0u16; CELLS_PER_PIECE];
    for (slot, &(x, y, z)) in cells.iter_mut().zip(orientation) {
        *slot = container.index_of((x + offset.0, y + offset.1, z + offset.2))? as u16;
    }
    Some(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;
    use std::collections::BTreeSet;

    fn demo() -> (Container, PieceCatalog) {
        (
            Container::pyramid(4).unwrap(),
            PieceCatalog::demo(Lattice::Fcc).unwrap(),
        )
    }

    #[test]
    fn test_candidates_cover_their_target() {
        let (container, catalog) = demo();
        let pre = Precomputed::build(&container, &catalog).unwrap();
        for cell in 0..container.len() {
            for &id in pre.candidates_for(cell) {
                let candidate = pre.candidate(id);
                assert!(candidate.mask.contains(cell), "candidate {id} does not cover {cell}");
                assert_eq!(candidate.mask.count(), 4);
                assert!(!candidate.halo.intersects(&candidate.mask));
            }
        }
    }

    #[test]
    fn test_every_placement_is_listed_under_each_of_its_cells() {
        let (container, catalog) = demo();
        let pre = Precomputed::build(&container, &catalog).unwrap();
        let listed: usize = (0..container.len()).map(|c| pre.candidates_for(c).len()).sum();
        assert_eq!(listed, pre.candidates().len() * CELLS_PER_PIECE);
    }

    #[test]
    fn test_precompute_is_idempotent() {
        let (container, catalog) = demo();
        let signature = |pre: &Precomputed, cell: usize| -> BTreeSet<(usize, u16, String)> {
            pre.candidates_for(cell)
                .iter()
                .map(|&id| {
                    let c = pre.candidate(id);
                    (c.piece, c.orientation, c.mask.to_hex())
                })
                .collect()
        };
        let first = Precomputed::build(&container, &catalog).unwrap();
        let second = Precomputed::build(&container, &catalog).unwrap();
        for cell in 0..container.len() {
            assert_eq!(signature(&first, cell), signature(&second, cell), "cell {cell}");
        }
        assert_eq!(first.cell_key(0), second.cell_key(0));
    }

    #[test]
    fn test_single_placement_container() {
        let line = [(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0)];
        let container = Container::new(Lattice::Fcc, line).unwrap();
        let catalog = PieceCatalog::from_shapes(Lattice::Fcc, [('I', line)], false).unwrap();
        let pre = Precomputed::build(&container, &catalog).unwrap();
        assert_eq!(pre.candidates().len(), 1);
        assert_eq!(pre.candidates_for(2).len(), 1);
        let placed = pre.placed(0);
        assert_eq!(placed.piece, 'I');
        let mut cells = placed.cells.to_vec();
        cells.sort();
        assert_eq!(cells, line.to_vec());
    }

    #[test]
    fn test_parity_partitions_cells() {
        let (container, catalog) = demo();
        let pre = Precomputed::build(&container, &catalog).unwrap();
        let [even, odd] = *pre.parity();
        assert!(!even.intersects(&odd));
        assert_eq!(even | odd, pre.full());
    }

    #[test]
    fn test_lattice_mismatch_is_rejected() {
        let container = Container::block(Lattice::Cubic, (2, 2, 2)).unwrap();
        let catalog = PieceCatalog::demo(Lattice::Fcc).unwrap();
        assert!(matches!(
            Precomputed::build(&container, &catalog),
            Err(SolverError::LatticeMismatch { .. })
        ));
    }
}
