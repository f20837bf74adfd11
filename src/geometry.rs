//! Rigid orientations of pieces.
//!
//! Both supported lattices share the octahedral symmetry of a cube: 24
//! proper rotations, 48 with mirror images. Rotations are applied in
//! cartesian space, so FCC cells are mapped out of the (i, j, k) basis
//! first and back again afterwards.

use crate::lattice::Lattice;
use crate::pieces::{Coord, CELLS_PER_PIECE};

/// All 24 proper rotations of a cube.
///
/// Organized as 6 face-up choices x 4 rotations around vertical:
/// - Rotations 0-3: +Z face up
/// - Rotations 4-7: +Y face up
/// - Rotations 8-11: -Z face up
/// - Rotations 12-15: -Y face up
/// - Rotations 16-19: +X face up
/// - Rotations 20-23: -X face up
pub const ROTATIONS: [fn(Coord) -> Coord; 24] = [
    |(x, y, z)| (x, y, z),
    |(x, y, z)| (-y, x, z),
    |(x, y, z)| (-x, -y, z),
    |(x, y, z)| (y, -x, z),
    |(x, y, z)| (x, -z, y),
    |(x, y, z)| (z, x, y),
    |(x, y, z)| (-x, z, y),
    |(x, y, z)| (-z, -x, y),
    |(x, y, z)| (x, -y, -z),
    |(x, y, z)| (y, x, -z),
    |(x, y, z)| (-x, y, -z),
    |(x, y, z)| (-y, -x, -z),
    |(x, y, z)| (x, z, -y),
    |(x, y, z)| (-z, x, -y),
    |(x, y, z)| (-x, -z, -y),
    |(x, y, z)| (z, -x, -y),
    |(x, y, z)| (z, y, -x),
    |(x, y, z)| (-y, z, -x),
    |(x, y, z)| (-z, -y, -x),
    |(x, y, z)| (y, -z, -x),
    |(x, y, z)| (-z, y, x),
    |(x, y, z)| (-y, -z, x),
    |(x, y, z)| (z, -y, x),
    |(x, y, z)| (y, z, x),
];

/// Maps a lattice cell into cartesian coordinates.
///
/// FCC basis vectors are (1,1,0), (1,0,1) and (0,1,1).
#[inline]
pub fn to_cartesian(lattice: Lattice, (i, j, k): Coord) -> Coord {
    match lattice {
        Lattice::Fcc => (i + j, i + k, j + k),
        Lattice::Cubic => (i, j, k),
    }
}

/// Inverse of [`to_cartesian`]. FCC points always have an even coordinate
/// sum, so the halving is exact.
#[inline]
pub fn from_cartesian(lattice: Lattice, (x, y, z): Coord) -> Coord {
    match lattice {
        Lattice::Fcc => ((x + y - z) / 2, (x - y + z) / 2, (-x + y + z) / 2),
        Lattice::Cubic => (x, y, z),
    }
}

/// Generates every distinct orientation of a 4-cell shape.
///
/// Each orientation is translated so its minimum lattice coordinates are
/// zero and its cells are sorted, so two orientations that differ only by
/// translation compare equal. With `mirror`, reflected variants are added.
pub fn all_orientations(
    lattice: Lattice,
    shape: &[Coord; CELLS_PER_PIECE],
    mirror: bool,
) -> Vec<[Coord; CELLS_PER_PIECE]> {
    let cartesian = shape.map(|cell| to_cartesian(lattice, cell));
    let reflections: &[bool] = if mirror { &[false, true] } else { &[false] };

    let mut orientations: Vec<[Coord; CELLS_PER_PIECE]> = reflections
        .iter()
        .flat_map(|&reflect| {
            ROTATIONS.iter().map(move |rotate| {
                cartesian.map(|cell| {
                    let (x, y, z) = if reflect { (-cell.0, cell.1, cell.2) } else { cell };
                    from_cartesian(lattice, rotate((x, y, z)))
                })
            })
        })
        .map(normalize)
        .collect();

    // symmetric shapes produce duplicates
    orientations.sort();
    orientations.dedup();
    orientations
}

/// Translates cells so the minimum i, j, k are zero, then sorts them.
pub fn normalize(mut cells: [Coord; CELLS_PER_PIECE]) -> [Coord; CELLS_PER_PIECE] {
    let min_x = cells.iter().map(|c| c.0).min().unwrap_or(0);
    let min_y = cells.iter().map(|c| c.1).min().unwrap_or(0);
    let min_z = cells.iter().map(|c| c.2).min().unwrap_or(0);

    for (x, y, z) in &mut cells {
        *x -= min_x;
        *y -= min_y;
        *z -= min_z;
    }
    cells.sort();
    cells
}

/// True if the cells form one connected group on the lattice.
pub fn is_connected(lattice: Lattice, cells: &[Coord]) -> bool {
    if cells.is_empty() {
        return true;
    }
    let mut reached = vec![false; cells.len()];
    let mut stack = vec![0];
    reached[0] = true;
    while let Some(current) = stack.pop() {
        for (other, seen) in reached.iter_mut().enumerate() {
            if !*seen && lattice.adjacent(cells[current], cells[other]) {
                *seen = true;
                stack.push(other);
            }
        }
    }
    reached.iter().all(|&r| r)
}
