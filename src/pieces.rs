//! Piece catalog and placement output types.
//!
//! Every piece is made of exactly four lattice cells. The catalog maps a
//! single-letter piece id to its ordered list of rigid orientations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};
use crate::geometry::{all_orientations, is_connected, normalize};
use crate::lattice::Lattice;

/// A 3D lattice coordinate.
pub type Coord = (i32, i32, i32);

/// Single-letter piece identifier.
pub type PieceId = char;

/// Number of cells in every piece.
pub const CELLS_PER_PIECE: usize = 4;

/// One rigid orientation of a piece as relative cell offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Orientation {
    /// Position in the piece's orientation list.
    pub id: u16,
    pub cells: [Coord; CELLS_PER_PIECE],
}

/// Read-only mapping from piece id to orientations.
///
/// Iteration order is sorted by piece id, which keeps candidate generation
/// reproducible.
#[derive(Debug, Clone, Default)]
pub struct PieceCatalog {
    lattice: Lattice,
    pieces: BTreeMap<PieceId, Vec<Orientation>>,
}

/// On-disk catalog: orientation lists per piece, or base shapes to expand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub lattice: Lattice,
    /// Explicit orientation lists.
    #[serde(default)]
    pub orientations: BTreeMap<PieceId, Vec<[Coord; CELLS_PER_PIECE]>>,
    /// Base shapes whose orientations are generated.
    #[serde(default)]
    pub shapes: BTreeMap<PieceId, [Coord; CELLS_PER_PIECE]>,
    /// Include mirror images when expanding `shapes`.
    #[serde(default)]
    pub mirror: bool,
}

impl PieceCatalog {
    /// Builds a catalog from explicit orientation lists.
    ///
    /// Orientations are validated, normalized and deduplicated, so no two
    /// orientation ids of a piece can ever yield the same placement.
    pub fn new<I>(lattice: Lattice, pieces: I) -> Result<Self>
    where
        I: IntoIterator<Item = (PieceId, Vec<[Coord; CELLS_PER_PIECE]>)>,
    {
        let mut catalog = BTreeMap::new();
        for (piece, raw) in pieces {
            if raw.is_empty() {
                return Err(SolverError::NoOrientations(piece));
            }
            let mut normalized: Vec<[Coord; CELLS_PER_PIECE]> = Vec::with_capacity(raw.len());
            for (orientation, cells) in raw.into_iter().enumerate() {
                let mut distinct = cells.to_vec();
                distinct.sort();
                distinct.dedup();
                if distinct.len() != CELLS_PER_PIECE {
                    return Err(SolverError::BadOrientation {
                        piece,
                        orientation,
                        cells: distinct.len(),
                    });
                }
                if !is_connected(lattice, &cells) {
                    return Err(SolverError::DisconnectedOrientation { piece, orientation });
                }
                let cells = normalize(cells);
                if !normalized.contains(&cells) {
                    normalized.push(cells);
                }
            }
            let orientations = normalized
                .into_iter()
                .enumerate()
                .map(|(id, cells)| Orientation {
                    id: id as u16,
                    cells,
                })
                .collect();
            catalog.insert(piece, orientations);
        }
        Ok(Self {
            lattice,
            pieces: catalog,
        })
    }

    /// Builds a catalog by generating every orientation of each base shape.
    pub fn from_shapes<I>(lattice: Lattice, shapes: I, mirror: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (PieceId, [Coord; CELLS_PER_PIECE])>,
    {
        Self::new(
            lattice,
            shapes
                .into_iter()
                .map(|(piece, shape)| (piece, all_orientations(lattice, &shape, mirror))),
        )
    }

    /// Builds a catalog from its serialized description. Explicit
    /// orientation lists win over generated ones for the same id.
    pub fn from_spec(spec: CatalogSpec) -> Result<Self> {
        let mut merged: BTreeMap<PieceId, Vec<[Coord; CELLS_PER_PIECE]>> = spec
            .shapes
            .iter()
            .map(|(&piece, shape)| (piece, all_orientations(spec.lattice, shape, spec.mirror)))
            .collect();
        merged.extend(spec.orientations);
        Self::new(spec.lattice, merged)
    }

    /// The built-in demo set of six 4-cell shapes.
    pub fn demo(lattice: Lattice) -> Result<Self> {
        Self::from_shapes(lattice, DEMO_SHAPES.iter().copied(), false)
    }

    pub fn lattice(&self) -> Lattice {
        self.lattice
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Piece ids in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = PieceId> + '_ {
        self.pieces.keys().copied()
    }

    pub fn orientations(&self, piece: PieceId) -> Option<&[Orientation]> {
        self.pieces.get(&piece).map(Vec::as_slice)
    }

    /// Pieces with their orientations, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (PieceId, &[Orientation])> + '_ {
        self.pieces.iter().map(|(&id, o)| (id, o.as_slice()))
    }
}

/// Demo shapes in lattice coordinates.
pub const DEMO_SHAPES: &[(PieceId, [Coord; CELLS_PER_PIECE])] = &[
    // straight line
    ('I', [(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0)]),
    // line with a foot at one end
    ('L', [(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0)]),
    // flat square (a rhombus on FCC)
    ('O', [(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 1, 0)]),
    // offset zig-zag
    ('S', [(0, 0, 0), (1, 0, 0), (1, 1, 0), (2, 1, 0)]),
    // line with a foot in the middle
    ('T', [(0, 0, 0), (1, 0, 0), (2, 0, 0), (1, 1, 0)]),
    // tripod; a regular tetrahedron on FCC
    ('Y', [(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 0, 1)]),
];

/// A piece placed at absolute container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacedPiece {
    pub piece: PieceId,
    pub orientation: u16,
    /// Offset added to the orientation's relative cells.
    pub translation: Coord,
    pub cells: [Coord; CELLS_PER_PIECE],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalog_is_sorted_and_complete() {
        let catalog = PieceCatalog::demo(Lattice::Fcc).unwrap();
        assert_eq!(catalog.ids().collect::<String>(), "ILOSTY");
        for (piece, orientations) in catalog.iter() {
            assert!(!orientations.is_empty(), "piece {piece} has no orientations");
            for (i, o) in orientations.iter().enumerate() {
                assert_eq!(o.id as usize, i);
            }
        }
    }

    #[test]
    fn test_duplicate_orientations_collapse() {
        // the same line, once translated
        let catalog = PieceCatalog::new(
            Lattice::Cubic,
            [(
                'I',
                vec![
                    [(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0)],
                    [(5, 1, 1), (6, 1, 1), (7, 1, 1), (8, 1, 1)],
                ],
            )],
        )
        .unwrap();
        assert_eq!(catalog.orientations('I').unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_orientations_fail_fast() {
        let repeated = PieceCatalog::new(
            Lattice::Cubic,
            [('X', vec![[(0, 0, 0), (0, 0, 0), (1, 0, 0), (2, 0, 0)]])],
        );
        assert!(matches!(
            repeated,
            Err(SolverError::BadOrientation { piece: 'X', cells: 3, .. })
        ));

        let split = PieceCatalog::new(
            Lattice::Cubic,
            [('X', vec![[(0, 0, 0), (1, 0, 0), (5, 0, 0), (6, 0, 0)]])],
        );
        assert!(matches!(split, Err(SolverError::DisconnectedOrientation { .. })));

        let empty = PieceCatalog::new(Lattice::Cubic, [('X', vec![])]);
        assert!(matches!(empty, Err(SolverError::NoOrientations('X'))));
    }

    #[test]
    fn test_spec_merges_shapes_and_explicit_lists() {
        let json = r#"{
            "lattice": "cubic",
            "shapes": { "O": [[0,0,0],[1,0,0],[0,1,0],[1,1,0]] },
            "orientations": { "I": [[[0,0,0],[1,0,0],[2,0,0],[3,0,0]]] }
        }"#;
        let spec: CatalogSpec = serde_json::from_str(json).unwrap();
        let catalog = PieceCatalog::from_spec(spec).unwrap();
        assert_eq!(catalog.orientations('O').unwrap().len(), 3);
        assert_eq!(catalog.orientations('I').unwrap().len(), 1);
    }
}
