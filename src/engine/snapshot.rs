//! Status records emitted by the engine and its serializable snapshot.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bitboard::Bitboard;
use crate::config::Settings;
use crate::error::Result;
use crate::pieces::{PieceId, PlacedPiece};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    /// The state space was exhausted.
    Complete,
    /// The solution-count cap was reached.
    Limit,
    /// The wall-clock budget ran out.
    Timeout,
    /// The caller stopped the run.
    Canceled,
    /// Nothing was left to fill; one empty solution was reported.
    TriviallySolved,
    /// The open cell count is not a multiple of the piece size.
    CellCountMismatch,
    /// A search invariant broke; the run was abandoned.
    Aborted,
}

/// Search counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub nodes: u64,
    pub pruned: u64,
    pub solutions: u64,
    pub backtracks: u64,
    pub tail_calls: u64,
    pub tt_hits: u64,
    pub stall_actions: u32,
}

/// Periodic progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub nodes: u64,
    pub depth: usize,
    pub elapsed_ms: u64,
    pub pruned: u64,
    pub placed: usize,
    pub open_cells: usize,
    pub solutions: u64,
    pub stack: Vec<PlacedPiece>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<BTreeMap<PieceId, u8>>,
}

/// Terminal report of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub solutions: u64,
    pub nodes: u64,
    pub elapsed_ms: u64,
    pub reason: TerminationReason,
    pub counters: Counters,
    /// Details for `Aborted` runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One frame of the search stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSnapshot {
    pub cell: usize,
    pub cursor: usize,
    pub placed: Option<PlacedPiece>,
}

/// Everything needed to persist a run and describe it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    #[serde(default)]
    pub container_id: Option<String>,
    /// Occupancy bit-mask as hex, most significant word first.
    pub occupancy: String,
    pub piece_order: Vec<PieceId>,
    pub inventory: BTreeMap<PieceId, u8>,
    pub frames: Vec<FrameSnapshot>,
    pub counters: Counters,
    pub elapsed_ms: u64,
    pub settings: Settings,
}

impl EngineSnapshot {
    pub fn occupancy_mask(&self) -> Result<Bitboard> {
        Bitboard::from_hex(&self.occupancy)
    }

    /// Human-readable summary of the snapshot.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "container: {}", self.container_id.as_deref().unwrap_or("(unnamed)"))?;
        match self.occupancy_mask() {
            Ok(mask) => writeln!(f, "filled cells: {}", mask.count())?,
            Err(e) => writeln!(f, "filled cells: unknown ({e})")?,
        }
        writeln!(
            f,
            "nodes: {}  pruned: {}  solutions: {}  elapsed: {} ms",
            self.counters.nodes, self.counters.pruned, self.counters.solutions, self.elapsed_ms
        )?;
        let order: String = self.piece_order.iter().collect();
        writeln!(f, "piece order: {order}")?;
        let stock: Vec<String> = self
            .inventory
            .iter()
            .map(|(piece, count)| format!("{piece}x{count}"))
            .collect();
        writeln!(f, "remaining: {}", stock.join(" "))?;
        writeln!(f, "stack ({} frames):", self.frames.len())?;
        for (depth, frame) in self.frames.iter().enumerate() {
            match &frame.placed {
                Some(p) => writeln!(
                    f,
                    "  {depth:>3}: cell {} cursor {} -> {} #{} at {:?}",
                    frame.cell, frame.cursor, p.piece, p.orientation, p.translation
                )?,
                None => writeln!(f, "  {depth:>3}: cell {} cursor {}", frame.cell, frame.cursor)?,
            }
        }
        Ok(())
    }
}
