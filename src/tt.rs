//! Transposition table for proven-dead search states.
//!
//! Two-way set-associative and fixed size. A miss never means anything; a
//! hit only ever reports a hash this table itself stored. Keys are full
//! 64-bit state hashes, so two states alias only on a true hash collision.

use tracing::debug;

use crate::config::TtPolicy;

/// What is known about a stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtFlag {
    /// No completion exists from this state.
    Dead,
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    key: u64,
    flag: Option<TtFlag>,
}

/// Bytes per slot: two ways of key plus flag.
const SLOT_BYTES: usize = 2 * std::mem::size_of::<Entry>();

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtStats {
    pub lookups: u64,
    pub hits: u64,
    pub stores: u64,
    pub overwrites: u64,
    pub dropped: u64,
}

pub struct TranspositionTable {
    slots: Vec<[Entry; 2]>,
    mask: usize,
    policy: TtPolicy,
    stats: TtStats,
}

impl TranspositionTable {
    /// Sizes the table to the largest power-of-two slot count fitting in
    /// `bytes` (at least one slot).
    pub fn with_bytes(bytes: usize, policy: TtPolicy) -> Self {
        let budget = (bytes / SLOT_BYTES).max(1);
        // round down to a power of two so the slot index is a mask
        let count = 1usize << (usize::BITS - 1 - budget.leading_zeros());
        debug!(bytes, slots = count, "sized transposition table");
        Self {
            slots: vec![[Entry::default(); 2]; count],
            mask: count - 1,
            policy,
            stats: TtStats::default(),
        }
    }

    #[inline]
    fn slot(&self, hash: u64) -> usize {
        // mix the high half into the index
        ((hash ^ (hash >> 32)) as usize) & self.mask
    }

    /// Returns the stored flag for `hash`, or `None` on a miss.
    #[inline]
    pub fn lookup(&mut self, hash: u64) -> Option<TtFlag> {
        self.stats.lookups += 1;
        let ways = &self.slots[self.slot(hash)];
        let found = ways
            .iter()
            .find(|e| e.flag.is_some() && e.key == hash)
            .and_then(|e| e.flag);
        if found.is_some() {
            self.stats.hits += 1;
        }
        found
    }

    /// Records `flag` for `hash` in a matching or empty way; on a full
    /// collision the policy decides.
    pub fn store(&mut self, hash: u64, flag: TtFlag) {
        self.stats.stores += 1;
        let slot = self.slot(hash);
        let ways = &mut self.slots[slot];
        let entry = Entry {
            key: hash,
            flag: Some(flag),
        };
        if let Some(way) = ways
            .iter_mut()
            .find(|e| e.flag.is_none() || e.key == hash)
        {
            *way = entry;
            return;
        }
        match self.policy {
            TtPolicy::ReplaceFirst => {
                self.stats.overwrites += 1;
                ways[0] = entry;
            }
            TtPolicy::KeepExisting => self.stats.dropped += 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() * 2
    }

    pub fn stats(&self) -> TtStats {
        self.stats
    }
}
