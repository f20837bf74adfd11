//! Solver settings.
//!
//! [`Settings`] mirrors the JSON settings record accepted from callers.
//! Every field has its default resolved here, once, so the search loop
//! reads plain values. [`SettingsBuilder`] is the validated way to build
//! one in code; deserialized settings go through [`Settings::validate`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};
use crate::pieces::{PieceId, CELLS_PER_PIECE};

/// How the engine picks the next cell to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveOrdering {
    /// Cell with the fewest fitting candidates.
    #[default]
    MostConstrainedCell,
    /// Lowest-index open cell.
    Naive,
}

/// What the engine does when it detects a stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StallAction {
    /// Shuffle the piece order and jump shallow cursors forward.
    #[default]
    Reshuffle,
    /// Drop every frame deeper than `depthK`.
    Restart,
    /// Swap two piece priorities and nudge one shallow cursor.
    Perturb,
}

/// Replacement rule when both ways of a table slot are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TtPolicy {
    /// Overwrite the first way.
    #[default]
    ReplaceFirst,
    /// Drop the new entry.
    KeepExisting,
}

/// Coordinate axis used as "down" by the gravity filter and renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    /// Component of `coord` along this axis.
    #[inline]
    pub fn of(self, (x, y, z): (i32, i32, i32)) -> i32 {
        match self {
            Axis::X => x,
            Axis::Y => y,
            Axis::Z => z,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pruning {
    /// Reject placements that split the open cells into several regions.
    pub connectivity: bool,
    /// Reject placements leaving an open count not divisible by 4.
    #[serde(rename = "multipleOf4")]
    pub multiple_of_4: bool,
    /// Reject placements leaving an odd count in either parity class.
    pub color_residue: bool,
    /// Require placements to touch the pieces already placed.
    pub neighbor_touch: bool,
    /// Reject placements leaving any open region with a size not divisible by 4.
    pub component_residue: bool,
}

impl Default for Pruning {
    fn default() -> Self {
        Self {
            connectivity: false,
            multiple_of_4: true,
            color_residue: false,
            neighbor_touch: false,
            component_residue: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PieceSettings {
    /// Restrict the search to these pieces. Empty means every catalog piece.
    pub allow: Vec<PieceId>,
    /// Per-piece counts. Pieces missing here get one copy.
    pub inventory: BTreeMap<PieceId, u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StallSettings {
    /// No-progress window before a stall action fires.
    pub timeout_ms: u64,
    pub action: StallAction,
    /// Shallow depth the stall actions operate on.
    pub depth_k: usize,
    /// Stall actions allowed per run.
    pub max_shuffles: u32,
    /// Node rate under which a measurement window counts as stalled.
    pub min_nodes_per_sec: u64,
}

impl Default for StallSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000,
            action: StallAction::Reshuffle,
            depth_k: 2,
            max_shuffles: 8,
            min_nodes_per_sec: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TtSettings {
    pub enable: bool,
    /// Memory budget in bytes.
    pub bytes: usize,
    pub policy: TtPolicy,
}

impl Default for TtSettings {
    fn default() -> Self {
        Self {
            enable: true,
            bytes: 8 << 20,
            policy: TtPolicy::ReplaceFirst,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TailSwitch {
    pub enable: bool,
    /// Open-cell count at or below which the tail solver takes over.
    pub tail_size: usize,
}

impl Default for TailSwitch {
    fn default() -> Self {
        Self {
            enable: true,
            tail_size: 12,
        }
    }
}

/// Everything a solve run can be configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Stop after this many solutions; 0 means unlimited.
    pub max_solutions: u64,
    /// Wall-clock budget; 0 means unbounded.
    pub timeout_ms: u64,
    pub status_interval_ms: u64,
    pub pause_on_solution: bool,
    pub move_ordering: MoveOrdering,
    pub pruning: Pruning,
    pub pieces: PieceSettings,
    pub seed: u64,
    pub randomize_ties: bool,
    pub stall: StallSettings,
    pub tt: TtSettings,
    pub tail_switch: TailSwitch,
    /// Include remaining inventory in status snapshots.
    pub track_inventory: bool,
    /// Drop placements without physical support during precompute.
    pub gravity: bool,
    pub support_axis: Axis,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_solutions: 1,
            timeout_ms: 0,
            status_interval_ms: 250,
            pause_on_solution: false,
            move_ordering: MoveOrdering::MostConstrainedCell,
            pruning: Pruning::default(),
            pieces: PieceSettings::default(),
            seed: 0,
            randomize_ties: false,
            stall: StallSettings::default(),
            tt: TtSettings::default(),
            tail_switch: TailSwitch::default(),
            track_inventory: true,
            gravity: false,
            support_axis: Axis::Z,
        }
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Parses a JSON settings record and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.tt.enable && self.tt.bytes < 64 {
            return Err(SolverError::invalid_settings(format!(
                "tt.bytes must be at least 64, got {}",
                self.tt.bytes
            )));
        }
        if self.stall.depth_k == 0 {
            return Err(SolverError::invalid_settings("stall.depthK must be at least 1"));
        }
        if self.tail_switch.tail_size % CELLS_PER_PIECE != 0 {
            return Err(SolverError::invalid_settings(format!(
                "tailSwitch.tailSize must be a multiple of {CELLS_PER_PIECE}, got {}",
                self.tail_switch.tail_size
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

/// Fluent construction of [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn max_solutions(mut self, max: u64) -> Self {
        self.settings.max_solutions = max;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.settings.timeout_ms = ms;
        self
    }

    pub fn status_interval_ms(mut self, ms: u64) -> Self {
        self.settings.status_interval_ms = ms;
        self
    }

    pub fn pause_on_solution(mut self, pause: bool) -> Self {
        self.settings.pause_on_solution = pause;
        self
    }

    pub fn move_ordering(mut self, ordering: MoveOrdering) -> Self {
        self.settings.move_ordering = ordering;
        self
    }

    pub fn pruning(mut self, pruning: Pruning) -> Self {
        self.settings.pruning = pruning;
        self
    }

    pub fn allow(mut self, pieces: impl IntoIterator<Item = PieceId>) -> Self {
        self.settings.pieces.allow = pieces.into_iter().collect();
        self
    }

    pub fn inventory(mut self, counts: impl IntoIterator<Item = (PieceId, u8)>) -> Self {
        self.settings.pieces.inventory = counts.into_iter().collect();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.settings.seed = seed;
        self
    }

    pub fn randomize_ties(mut self, randomize: bool) -> Self {
        self.settings.randomize_ties = randomize;
        self
    }

    pub fn stall(mut self, stall: StallSettings) -> Self {
        self.settings.stall = stall;
        self
    }

    pub fn tt(mut self, enable: bool, bytes: usize) -> Self {
        self.settings.tt.enable = enable;
        self.settings.tt.bytes = bytes;
        self
    }

    pub fn tt_policy(mut self, policy: TtPolicy) -> Self {
        self.settings.tt.policy = policy;
        self
    }

    pub fn tail_switch(mut self, enable: bool, tail_size: usize) -> Self {
        self.settings.tail_switch = TailSwitch { enable, tail_size };
        self
    }

    pub fn track_inventory(mut self, track: bool) -> Self {
        self.settings.track_inventory = track;
        self
    }

    pub fn gravity(mut self, gravity: bool, axis: Axis) -> Self {
        self.settings.gravity = gravity;
        self.settings.support_axis = axis;
        self
    }

    pub fn build(self) -> Result<Settings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
