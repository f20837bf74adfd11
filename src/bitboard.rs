//! Fixed-width occupancy bit-mask.
//!
//! Bit `i` stands for container cell index `i`. Four 64-bit words keep the
//! mask `Copy` and allocation-free in the solver's hot loop, which caps a
//! container at 256 cells.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign};

use crate::error::{Result, SolverError};

/// Number of 64-bit words in a [`Bitboard`].
pub const WORDS: usize = 4;

/// Largest container a [`Bitboard`] can address.
pub const MAX_CELLS: usize = WORDS * 64;

/// A set of cell indices packed into bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bitboard([u64; WORDS]);

impl Bitboard {
    /// The empty set.
    pub const EMPTY: Self = Self([0; WORDS]);

    /// Returns a mask with the lowest `cells` bits set.
    pub fn full(cells: usize) -> Self {
        debug_assert!(cells <= MAX_CELLS);
        let mut words = [0u64; WORDS];
        for (w, word) in words.iter_mut().enumerate() {
            let lo = w * 64;
            if cells >= lo + 64 {
                *word = u64::MAX;
            } else if cells > lo {
                *word = (1u64 << (cells - lo)) - 1;
            }
        }
        Self(words)
    }

    /// Builds a mask from cell indices.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut mask = Self::EMPTY;
        for idx in indices {
            mask.insert(idx);
        }
        mask
    }

    #[inline(always)]
    pub fn insert(&mut self, idx: usize) {
        self.0[idx >> 6] |= 1u64 << (idx & 63);
    }

    #[inline(always)]
    pub fn remove(&mut self, idx: usize) {
        self.0[idx >> 6] &= !(1u64 << (idx & 63));
    }

    #[inline(always)]
    pub fn contains(&self, idx: usize) -> bool {
        self.0[idx >> 6] & (1u64 << (idx & 63)) != 0
    }

    /// Number of set bits.
    #[inline]
    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// True if the two masks share any bit.
    #[inline(always)]
    pub fn intersects(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// True if every bit of `self` is also set in `other`.
    #[inline(always)]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| a & !b == 0)
    }

    /// Bits of `self` that are not in `other`.
    #[inline(always)]
    pub fn and_not(&self, other: &Self) -> Self {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a &= !b;
        }
        out
    }

    /// Lowest set bit, if any.
    #[inline]
    pub fn first(&self) -> Option<usize> {
        self.0
            .iter()
            .enumerate()
            .find(|(_, &w)| w != 0)
            .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
    }

    /// Iterates set bits in ascending order.
    pub fn ones(&self) -> Ones {
        Ones {
            words: self.0,
            word: 0,
        }
    }

    /// Encodes the mask as a fixed-width lowercase hex string, most
    /// significant word first.
    pub fn to_hex(&self) -> String {
        self.0.iter().rev().map(|w| format!("{w:016x}")).collect()
    }

    /// Decodes a hex string produced by [`Bitboard::to_hex`]. Shorter
    /// strings are treated as left-padded with zeros.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim().trim_start_matches("0x");
        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(SolverError::BadMask(format!("'{bad}' is not a hex digit")));
        }
        if hex.len() > WORDS * 16 {
            return Err(SolverError::BadMask(format!(
                "{} hex digits exceed {}",
                hex.len(),
                WORDS * 16
            )));
        }
        let mut words = [0u64; WORDS];
        let mut end = hex.len();
        for word in words.iter_mut() {
            if end == 0 {
                break;
            }
            let start = end.saturating_sub(16);
            let chunk = &hex[start..end];
            *word = u64::from_str_radix(chunk, 16)
                .map_err(|e| SolverError::BadMask(format!("'{chunk}': {e}")))?;
            end = start;
        }
        Ok(Self(words))
    }
}

/// Iterator over the set bits of a [`Bitboard`].
pub struct Ones {
    words: [u64; WORDS],
    word: usize,
}

impl Iterator for Ones {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        while self.word < WORDS {
            let w = self.words[self.word];
            if w != 0 {
                // clear the lowest set bit and report it
                self.words[self.word] = w & (w - 1);
                return Some(self.word * 64 + w.trailing_zeros() as usize);
            }
            self.word += 1;
        }
        None
    }
}

impl BitOr for Bitboard {
    type Output = Self;
    #[inline(always)]
    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}

impl BitOrAssign for Bitboard {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a |= b;
        }
    }
}

impl BitAnd for Bitboard {
    type Output = Self;
    #[inline(always)]
    fn bitand(mut self, rhs: Self) -> Self {
        self &= rhs;
        self
    }
}

impl BitAndAssign for Bitboard {
    #[inline(always)]
    fn bitand_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a &= b;
        }
    }
}

impl BitXor for Bitboard {
    type Output = Self;
    #[inline(always)]
    fn bitxor(mut self, rhs: Self) -> Self {
        self ^= rhs;
        self
    }
}

impl BitXorAssign for Bitboard {
    #[inline(always)]
    fn bitxor_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a ^= b;
        }
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitboard({})", self.to_hex())
    }
}
