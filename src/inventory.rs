//! Remaining piece counts.

use std::collections::BTreeMap;

use crate::config::PieceSettings;
use crate::error::{InvariantViolation, Result, SolverError};
use crate::pieces::PieceId;

/// Remaining placeable copies per piece, indexed like
/// [`Precomputed::piece_ids`](crate::precompute::Precomputed::piece_ids).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Inventory {
    counts: Vec<u8>,
}

impl Inventory {
    /// `count` copies of each of `pieces` pieces.
    pub fn uniform(pieces: usize, count: u8) -> Self {
        Self {
            counts: vec![count; pieces],
        }
    }

    /// Resolves the `pieces.allow` / `pieces.inventory` settings against
    /// the catalog's piece order.
    ///
    /// Allowed pieces without an explicit count get one copy; pieces outside
    /// a non-empty allow list get none.
    pub fn from_settings(piece_ids: &[PieceId], settings: &PieceSettings) -> Result<Self> {
        for id in settings.allow.iter().chain(settings.inventory.keys()) {
            if !piece_ids.contains(id) {
                return Err(SolverError::UnknownPiece(*id));
            }
        }
        let counts = piece_ids
            .iter()
            .map(|id| {
                let allowed = settings.allow.is_empty() || settings.allow.contains(id);
                if !allowed {
                    0
                } else {
                    settings.inventory.get(id).copied().unwrap_or(1)
                }
            })
            .collect();
        Ok(Self { counts })
    }

    #[inline(always)]
    pub fn get(&self, piece: usize) -> u8 {
        self.counts[piece]
    }

    #[inline(always)]
    pub fn available(&self, piece: usize) -> bool {
        self.counts[piece] > 0
    }

    /// Takes one copy, returning the count before the take.
    #[inline]
    pub fn take(&mut self, piece: usize, id: PieceId) -> std::result::Result<u8, InvariantViolation> {
        let before = self.counts[piece];
        if before == 0 {
            return Err(InvariantViolation::InventoryUnderflow(id));
        }
        self.counts[piece] = before - 1;
        Ok(before)
    }

    /// Returns one copy, returning the count before the return.
    #[inline]
    pub fn give_back(&mut self, piece: usize) -> u8 {
        let before = self.counts[piece];
        self.counts[piece] = before.saturating_add(1);
        before
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn counts(&self) -> &[u8] {
        &self.counts
    }

    /// Total copies remaining across all pieces.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    pub fn max_count(&self) -> u8 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Counts keyed by piece id.
    pub fn to_map(&self, piece_ids: &[PieceId]) -> BTreeMap<PieceId, u8> {
        piece_ids.iter().copied().zip(self.counts.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_stock() {
        let inventory = Inventory::uniform(3, 2);
        assert_eq!(inventory.counts(), &[2, 2, 2]);
        assert_eq!(inventory.total(), 6);
        assert_eq!(inventory.max_count(), 2);
    }

    #[test]
    fn test_allow_list_and_counts() {
        let ids = ['A', 'B', 'C'];
        let settings = PieceSettings {
            allow: vec!['A', 'C'],
            inventory: [('C', 3)].into_iter().collect(),
        };
        let inventory = Inventory::from_settings(&ids, &settings).unwrap();
        assert_eq!(inventory.counts(), &[1, 0, 3]);
        assert_eq!(inventory.total(), 4);
    }

    #[test]
    fn test_unknown_piece_is_a_configuration_error() {
        let settings = PieceSettings {
            allow: vec!['Q'],
            ..Default::default()
        };
        assert!(matches!(
            Inventory::from_settings(&['A'], &settings),
            Err(SolverError::UnknownPiece('Q'))
        ));
    }

    #[test]
    fn test_take_never_goes_negative() {
        let mut inventory = Inventory::uniform(1, 1);
        assert_eq!(inventory.take(0, 'A'), Ok(1));
        assert_eq!(
            inventory.take(0, 'A'),
            Err(InvariantViolation::InventoryUnderflow('A'))
        );
        assert_eq!(inventory.give_back(0), 0);
        assert!(inventory.available(0));
    }
}
