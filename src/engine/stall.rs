//! Stall detection and the randomized escape actions.
//!
//! A run is stalled when a measurement window produced too few nodes per
//! second, or when the deepest depth reached has not improved for the
//! configured timeout. The entropy check is evaluated first; when it fires
//! the no-progress check is skipped for that poll and both clocks restart.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use super::Engine;
use crate::config::{StallAction, StallSettings};
use crate::error::InvariantViolation;

/// Length of one node-rate measurement window.
const ENTROPY_WINDOW: Duration = Duration::from_secs(1);

/// Largest cursor nudge applied by [`StallAction::Perturb`].
const MAX_NUDGE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StallTrigger {
    LowEntropy,
    NoProgress,
}

#[derive(Debug, Clone)]
pub(crate) struct StallMonitor {
    window_start: Instant,
    window_nodes: u64,
    last_progress: Instant,
    best_depth: usize,
    /// Progress seen since the last poll, stamped when polled.
    progressed: bool,
    pub(crate) actions: u32,
}

impl StallMonitor {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            window_nodes: 0,
            last_progress: now,
            best_depth: 0,
            progressed: false,
            actions: 0,
        }
    }

    /// Records the current depth; a new maximum counts as progress.
    #[inline]
    pub(crate) fn note_depth(&mut self, depth: usize) {
        if depth > self.best_depth {
            self.best_depth = depth;
            self.progressed = true;
        }
    }

    pub(crate) fn note_solution(&mut self) {
        self.progressed = true;
    }

    /// Decides whether a stall action is due.
    pub(crate) fn poll(
        &mut self,
        now: Instant,
        nodes: u64,
        settings: &StallSettings,
    ) -> Option<StallTrigger> {
        if std::mem::take(&mut self.progressed) {
            self.last_progress = now;
        }
        if self.actions >= settings.max_shuffles {
            return None;
        }

        let window = now.saturating_duration_since(self.window_start);
        if window >= ENTROPY_WINDOW {
            let rate = nodes.saturating_sub(self.window_nodes) as f64 / window.as_secs_f64();
            self.window_start = now;
            self.window_nodes = nodes;
            if rate < settings.min_nodes_per_sec as f64 {
                self.restart_clocks(now, nodes);
                return Some(StallTrigger::LowEntropy);
            }
        }

        let idle = now.saturating_duration_since(self.last_progress);
        if settings.timeout_ms > 0 && idle >= Duration::from_millis(settings.timeout_ms) {
            self.restart_clocks(now, nodes);
            return Some(StallTrigger::NoProgress);
        }
        None
    }

    fn restart_clocks(&mut self, now: Instant, nodes: u64) {
        self.window_start = now;
        self.window_nodes = nodes;
        self.last_progress = now;
        self.best_depth = 0;
        self.progressed = false;
        self.actions += 1;
    }
}

impl Engine<'_> {
    /// Applies one escape action. Every surviving frame loses its
    /// exhaustive flag, so nothing below it is ever recorded as dead.
    pub(crate) fn apply_stall_action(
        &mut self,
        action: StallAction,
        trigger: StallTrigger,
    ) -> Result<(), InvariantViolation> {
        let depth_k = self.settings.stall.depth_k;
        warn!(?action, ?trigger, depth = self.frames.len(), "search stalled");

        match action {
            StallAction::Reshuffle => {
                self.piece_rank.shuffle(&mut self.rng);
                self.sort_orders();
                let shallow = depth_k.min(self.frames.len());
                for f in 0..shallow {
                    let len = self.orders[self.frames[f].cell].len();
                    let room = len.saturating_sub(self.frames[f].cursor);
                    if room > 0 {
                        let jump = self.rng.gen_range(0..=room / 2);
                        self.frames[f].cursor += jump;
                    }
                }
            }
            StallAction::Restart => {
                while self.frames.len() > depth_k {
                    let frame = self.frames.pop().ok_or(InvariantViolation::StackUnderflow)?;
                    if let Some(id) = frame.placed {
                        self.undo(id)?;
                    }
                }
            }
            StallAction::Perturb => {
                let pieces = self.piece_rank.len();
                if pieces >= 2 {
                    let a = self.rng.gen_range(0..pieces);
                    let b = (a + self.rng.gen_range(1..pieces)) % pieces;
                    self.piece_rank.swap(a, b);
                    self.sort_orders();
                }
                let shallow = depth_k.min(self.frames.len());
                if shallow > 0 {
                    let f = self.rng.gen_range(0..shallow);
                    let len = self.orders[self.frames[f].cell].len();
                    let nudge = self.rng.gen_range(1..=MAX_NUDGE);
                    self.frames[f].cursor = (self.frames[f].cursor + nudge).min(len);
                }
            }
        }

        for frame in &mut self.frames {
            frame.exhaustive = false;
        }
        self.counters.stall_actions += 1;
        Ok(())
    }
}
