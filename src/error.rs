//! Error types for puzzle construction and solving.
//!
//! Configuration problems surface as [`SolverError`] from constructors.
//! Defects detected inside a running search are [`InvariantViolation`]s and
//! only ever reach the caller through the engine's terminal summary.

use thiserror::Error;

use crate::lattice::Lattice;
use crate::pieces::PieceId;

/// Result type alias for fallible construction and I/O.
pub type Result<T> = std::result::Result<T, SolverError>;

/// Errors raised while building a puzzle or loading its inputs.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The container holds more cells than the bitboard can address.
    #[error("container has {cells} cells, at most {max} are supported")]
    ContainerTooLarge { cells: usize, max: usize },

    /// A piece was declared without any orientations.
    #[error("piece '{0}' has no orientations")]
    NoOrientations(PieceId),

    /// An orientation does not consist of exactly four distinct cells.
    #[error("piece '{piece}' orientation {orientation} has {cells} distinct cells, expected 4")]
    BadOrientation {
        piece: PieceId,
        orientation: usize,
        cells: usize,
    },

    /// An orientation is not a connected shape on the lattice.
    #[error("piece '{piece}' orientation {orientation} is not connected on the lattice")]
    DisconnectedOrientation { piece: PieceId, orientation: usize },

    /// Container and catalog were built for different lattices.
    #[error("container lattice {container:?} does not match catalog lattice {catalog:?}")]
    LatticeMismatch { container: Lattice, catalog: Lattice },

    /// A piece id in the settings does not exist in the catalog.
    #[error("unknown piece '{0}'")]
    UnknownPiece(PieceId),

    /// A settings value failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A hex-encoded occupancy mask could not be decoded.
    #[error("malformed occupancy mask: {0}")]
    BadMask(String),

    /// Filesystem failure while persisting or loading.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SolverError {
    /// Create an invalid settings error.
    #[must_use]
    pub fn invalid_settings(details: impl Into<String>) -> Self {
        Self::InvalidSettings(details.into())
    }
}

/// A broken search invariant. The run that produced it must be abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A piece was placed with no remaining inventory.
    #[error("inventory for piece '{0}' would go negative")]
    InventoryUnderflow(PieceId),

    /// A placement being undone is not present in the occupancy mask.
    #[error("undo of piece '{0}' does not match occupancy")]
    UndoMismatch(PieceId),

    /// Occupancy contains cells outside the container.
    #[error("occupancy escaped the container mask")]
    OccupancyOverflow,

    /// The frame stack was popped while empty.
    #[error("frame stack underflow")]
    StackUnderflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SolverError::ContainerTooLarge { cells: 300, max: 256 };
        assert!(format!("{err}").contains("300"));

        let err = SolverError::invalid_settings("bad value");
        assert!(format!("{err}").contains("bad value"));

        let err = InvariantViolation::InventoryUnderflow('A');
        assert!(format!("{err}").contains("'A'"));
    }
}
