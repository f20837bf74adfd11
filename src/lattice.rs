//! Lattice geometry and the indexed container.
//!
//! A [`Container`] turns an ordered list of lattice cells into the indexed
//! form the solvers work on: a cell-to-index map and a neighbor list per
//! cell. Two lattices are supported:
//!
//! - `Fcc`: face-centred cubic sphere packing in the (i, j, k) rhombohedral
//!   basis. Every cell touches 12 neighbors.
//! - `Cubic`: the simple cubic grid with 6 face neighbors.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bitboard::MAX_CELLS;
use crate::error::{Result, SolverError};
use crate::pieces::Coord;

/// FCC contact directions in the (i, j, k) basis.
///
/// Entries `2a` and `2a + 1` are opposite, so `direction / 2` names the axis.
const FCC_DIRECTIONS: [Coord; 12] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
    (1, -1, 0),
    (-1, 1, 0),
    (1, 0, -1),
    (-1, 0, 1),
    (0, 1, -1),
    (0, -1, 1),
];

/// Cubic face directions, paired the same way as [`FCC_DIRECTIONS`].
const CUBIC_DIRECTIONS: [Coord; 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// The lattice a container and its pieces live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lattice {
    #[default]
    Fcc,
    Cubic,
}

impl Lattice {
    /// Neighbor offsets, opposite directions adjacent.
    pub fn directions(self) -> &'static [Coord] {
        match self {
            Lattice::Fcc => &FCC_DIRECTIONS,
            Lattice::Cubic => &CUBIC_DIRECTIONS,
        }
    }

    /// Number of distinct non-parallel contact axes.
    pub fn axis_count(self) -> usize {
        self.directions().len() / 2
    }

    /// True if two cells are in contact on this lattice.
    pub fn adjacent(self, a: Coord, b: Coord) -> bool {
        let delta = (b.0 - a.0, b.1 - a.1, b.2 - a.2);
        self.directions().contains(&delta)
    }
}

/// An indexed, immutable set of lattice cells to be filled.
#[derive(Debug, Clone)]
pub struct Container {
    id: Option<String>,
    lattice: Lattice,
    cells: Vec<Coord>,
    index: FxHashMap<Coord, usize>,
    neighbors: Vec<Vec<usize>>,
    /// Per cell, bit `d` is set when direction `d` leads outside the container.
    exposed: Vec<u16>,
}

/// On-disk description of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub lattice: Lattice,
    pub cells: Vec<Coord>,
}

impl Container {
    /// Indexes `cells` in first-occurrence order, dropping duplicates.
    pub fn new<I: IntoIterator<Item = Coord>>(lattice: Lattice, cells: I) -> Result<Self> {
        let mut ordered = Vec::new();
        let mut index = FxHashMap::default();
        for cell in cells {
            if !index.contains_key(&cell) {
                index.insert(cell, ordered.len());
                ordered.push(cell);
            }
        }
        if ordered.len() > MAX_CELLS {
            return Err(SolverError::ContainerTooLarge {
                cells: ordered.len(),
                max: MAX_CELLS,
            });
        }

        let directions = lattice.directions();
        let mut neighbors = Vec::with_capacity(ordered.len());
        let mut exposed = Vec::with_capacity(ordered.len());
        for &(x, y, z) in &ordered {
            let mut adjacent = Vec::with_capacity(directions.len());
            let mut open_faces = 0u16;
            for (dir, &(dx, dy, dz)) in directions.iter().enumerate() {
                match index.get(&(x + dx, y + dy, z + dz)) {
                    Some(&n) => adjacent.push(n),
                    None => open_faces |= 1 << dir,
                }
            }
            neighbors.push(adjacent);
            exposed.push(open_faces);
        }

        debug!(cells = ordered.len(), ?lattice, "indexed container");
        Ok(Self {
            id: None,
            lattice,
            cells: ordered,
            index,
            neighbors,
            exposed,
        })
    }

    /// Builds a container from its serialized description.
    pub fn from_spec(spec: ContainerSpec) -> Result<Self> {
        let container = Self::new(spec.lattice, spec.cells)?;
        Ok(match spec.id {
            Some(id) => container.with_id(id),
            None => container,
        })
    }

    /// Serializable description of this container.
    pub fn to_spec(&self) -> ContainerSpec {
        ContainerSpec {
            id: self.id.clone(),
            lattice: self.lattice,
            cells: self.cells.clone(),
        }
    }

    /// Every cell `(i, j, k)` with `0 <= i < a`, `0 <= j < b`, `0 <= k < c`.
    pub fn block(lattice: Lattice, (a, b, c): (i32, i32, i32)) -> Result<Self> {
        let mut cells = Vec::new();
        for k in 0..c {
            for j in 0..b {
                for i in 0..a {
                    cells.push((i, j, k));
                }
            }
        }
        Self::new(lattice, cells)
    }

    /// FCC tetrahedral stack: cells with non-negative coordinates summing to
    /// less than `layers`.
    pub fn pyramid(layers: i32) -> Result<Self> {
        let mut cells = Vec::new();
        for k in 0..layers {
            for j in 0..layers - k {
                for i in 0..layers - k - j {
                    cells.push((i, j, k));
                }
            }
        }
        Self::new(Lattice::Fcc, cells)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn lattice(&self) -> Lattice {
        self.lattice
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    #[inline]
    pub fn index_of(&self, cell: Coord) -> Option<usize> {
        self.index.get(&cell).copied()
    }

    #[inline]
    pub fn coord(&self, idx: usize) -> Coord {
        self.cells[idx]
    }

    /// Indices of the cells touching `idx`.
    #[inline]
    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.neighbors[idx]
    }

    /// Direction bits of `idx` that lead outside the container.
    #[inline]
    pub fn exposed_directions(&self, idx: usize) -> u16 {
        self.exposed[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions_pair_opposites() {
        for lattice in [Lattice::Fcc, Lattice::Cubic] {
            let dirs = lattice.directions();
            for axis in 0..lattice.axis_count() {
                let (a, b) = (dirs[2 * axis], dirs[2 * axis + 1]);
                assert_eq!((a.0 + b.0, a.1 + b.1, a.2 + b.2), (0, 0, 0), "{lattice:?} axis {axis}");
            }
        }
    }

    #[test]
    fn test_index_is_bijection_and_deduplicates() {
        let container =
            Container::new(Lattice::Cubic, [(0, 0, 0), (1, 0, 0), (0, 0, 0), (2, 0, 0)]).unwrap();
        assert_eq!(container.len(), 3);
        for (idx, &cell) in container.cells().iter().enumerate() {
            assert_eq!(container.index_of(cell), Some(idx));
        }
        assert_eq!(container.index_of((5, 5, 5)), None);
    }

    #[test]
    fn test_fcc_interior_cell_has_twelve_neighbors() {
        let container = Container::block(Lattice::Fcc, (3, 3, 3)).unwrap();
        let center = container.index_of((1, 1, 1)).unwrap();
        // (1,1,1) + (1,-1,0) etc. all stay inside a 3x3x3 block
        assert_eq!(container.neighbors(center).len(), 12);
        assert_eq!(container.exposed_directions(center), 0);
        let corner = container.index_of((0, 0, 0)).unwrap();
        assert!(container.neighbors(corner).len() < 12);
    }

    #[test]
    fn test_pyramid_size_is_tetrahedral_number() {
        assert_eq!(Container::pyramid(4).unwrap().len(), 20);
        assert_eq!(Container::pyramid(5).unwrap().len(), 35);
    }

    #[test]
    fn test_too_large_container_is_rejected() {
        let err = Container::block(Lattice::Cubic, (10, 10, 3)).unwrap_err();
        assert!(matches!(err, SolverError::ContainerTooLarge { cells: 300, .. }));
    }
}
