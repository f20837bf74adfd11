//! Text rendering of solutions.
//!
//! A container is cut into layers along the support axis. Layers are shown
//! side by side, lowest first, each as a grid over the two remaining axes
//! with the highest row on top. Cells show the letter of the piece covering
//! them, `.` when uncovered, and nothing outside the container.

use rustc_hash::FxHashMap;

use crate::config::Axis;
use crate::lattice::Container;
use crate::pieces::{Coord, PlacedPiece};

/// Gap between two rendered layers.
const LAYER_GAP: &str = "  ";

/// Splits a coordinate into (layer, column, row) for the given axis.
#[inline(always)]
fn project(axis: Axis, (x, y, z): Coord) -> (i32, i32, i32) {
    match axis {
        Axis::X => (x, y, z),
        Axis::Y => (y, x, z),
        Axis::Z => (z, x, y),
    }
}

fn axis_name(axis: Axis) -> char {
    match axis {
        Axis::X => 'x',
        Axis::Y => 'y',
        Axis::Z => 'z',
    }
}

/// Maps every covered coordinate to the letter of its piece.
pub fn solution_to_grid(solution: &[PlacedPiece]) -> FxHashMap<Coord, char> {
    let mut grid = FxHashMap::default();
    for placed in solution {
        for &cell in &placed.cells {
            grid.insert(cell, placed.piece);
        }
    }
    grid
}

/// Formats a solution layer by layer along `axis`.
pub fn format_solution(container: &Container, solution: &[PlacedPiece], axis: Axis) -> String {
    if container.is_empty() {
        return String::new();
    }
    let grid = solution_to_grid(solution);

    let projected: Vec<(i32, i32, i32)> = container.cells().iter().map(|&c| project(axis, c)).collect();
    let mut layers: Vec<i32> = projected.iter().map(|p| p.0).collect();
    layers.sort_unstable();
    layers.dedup();
    let (col_min, col_max) = bounds(projected.iter().map(|p| p.1));
    let (row_min, row_max) = bounds(projected.iter().map(|p| p.2));

    let labels: Vec<String> = layers
        .iter()
        .map(|layer| format!("{}={}", axis_name(axis), layer))
        .collect();
    let columns = (col_max - col_min + 1) as usize;
    let width = labels.iter().map(String::len).max().unwrap_or(0).max(columns);

    let mut output = String::new();
    let header: Vec<String> = labels.iter().map(|l| format!("{l:<width$}")).collect();
    push_line(&mut output, &header.join(LAYER_GAP));

    for row in (row_min..=row_max).rev() {
        let slices: Vec<String> = layers
            .iter()
            .map(|&layer| {
                let slice: String = (col_min..=col_max)
                    .map(|col| {
                        let coord = unproject(axis, layer, col, row);
                        match (container.index_of(coord), grid.get(&coord)) {
                            (Some(_), Some(&piece)) => piece,
                            (Some(_), None) => '.',
                            (None, _) => ' ',
                        }
                    })
                    .collect();
                format!("{slice:<width$}")
            })
            .collect();
        push_line(&mut output, &slices.join(LAYER_GAP));
    }

    output
}

/// Inverse of [`project`].
#[inline(always)]
fn unproject(axis: Axis, layer: i32, col: i32, row: i32) -> Coord {
    match axis {
        Axis::X => (layer, col, row),
        Axis::Y => (col, layer, row),
        Axis::Z => (col, row, layer),
    }
}

fn bounds(values: impl Iterator<Item = i32>) -> (i32, i32) {
    values.fold((i32::MAX, i32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn push_line(output: &mut String, line: &str) {
    output.push_str(line.trim_end());
    output.push('\n');
}
