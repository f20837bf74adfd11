//! Physical support filter for placements.
//!
//! A placement is admissible when none of its cells relies on a single
//! exposed face of the container for support. Cells that are interior or on
//! the bottom plane are always fine; otherwise the exposed directions
//! touched by the whole placement must span at least two non-parallel axes
//! (a corner).

use crate::bitboard::Bitboard;
use crate::config::Axis;
use crate::lattice::Container;

/// Per-container support data, precomputed once.
#[derive(Debug, Clone)]
pub struct SupportFilter {
    bottom: Bitboard,
    /// Bit `a` set when the cell is exposed along axis `a`.
    exposed_axes: Vec<u16>,
}

impl SupportFilter {
    pub fn new(container: &Container, axis: Axis) -> Self {
        let floor = container.cells().iter().map(|&c| axis.of(c)).min().unwrap_or(0);
        let bottom = Bitboard::from_indices(
            container
                .cells()
                .iter()
                .enumerate()
                .filter(|(_, &c)| axis.of(c) == floor)
                .map(|(idx, _)| idx),
        );

        let axes = container.lattice().axis_count();
        let exposed_axes = (0..container.len())
            .map(|idx| {
                let dirs = container.exposed_directions(idx);
                (0..axes)
                    .filter(|a| dirs & (0b11 << (2 * a)) != 0)
                    .fold(0u16, |acc, a| acc | (1 << a))
            })
            .collect();

        Self {
            bottom,
            exposed_axes,
        }
    }

    /// Cells on the bottom plane.
    pub fn bottom(&self) -> Bitboard {
        self.bottom
    }

    /// True if the cell lies on an exposed face of the container.
    pub fn is_boundary(&self, cell: usize) -> bool {
        self.exposed_axes[cell] != 0
    }

    /// Decides whether a placement over these cell indices is supported.
    pub fn admits(&self, cells: &[u16]) -> bool {
        let needs_corner = cells
            .iter()
            .map(|&c| c as usize)
            .any(|c| self.is_boundary(c) && !self.bottom.contains(c));
        if !needs_corner {
            return true;
        }
        let axes = cells
            .iter()
            .fold(0u16, |acc, &c| acc | self.exposed_axes[c as usize]);
        axes.count_ones() >= 2
    }
}
