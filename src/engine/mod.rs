//! Depth-first search engine.
//!
//! The engine owns the occupancy mask, inventory, frame stack and counters
//! of one run and advances them a bounded number of steps per call to
//! [`Engine::run_slice`]. One step either places the next passing candidate
//! of the top frame or pops that frame. Everything the host sees arrives
//! through a [`SearchObserver`].
//!
//! Key optimizations:
//! - Occupancy is a [`Bitboard`]; a candidate fits when its mask misses it
//! - The state hash is updated by XOR on every place and undo
//! - Proven-dead states go into a [`TranspositionTable`]
//! - Small residual problems are handed to the [`TailSolver`]

mod snapshot;
mod stall;

pub use snapshot::{
    Counters, EngineSnapshot, FrameSnapshot, SearchSummary, StatusSnapshot, TerminationReason,
};

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, trace, warn};

use crate::bitboard::Bitboard;
use crate::config::{MoveOrdering, Settings};
use crate::error::{InvariantViolation, Result, SolverError};
use crate::inventory::Inventory;
use crate::pieces::{PlacedPiece, CELLS_PER_PIECE};
use crate::precompute::{Candidate, CandidateId, Precomputed, MAX_TRACKED_COUNT};
use crate::prune::{self, Prune};
use crate::tail::{fitting_count, TailOutcome, TailSolver};
use crate::tt::{TranspositionTable, TtFlag, TtStats};
use stall::StallMonitor;

/// Steps per slice used by [`Engine::run_to_completion`].
pub const DEFAULT_SLICE_STEPS: u32 = 4096;

/// Receives progress from a running engine.
pub trait SearchObserver {
    fn on_status(&mut self, _status: &StatusSnapshot) {}

    /// Called once per solution with the placements in stack order.
    fn on_solution(&mut self, _placements: &[PlacedPiece]) {}

    fn on_done(&mut self, _summary: &SearchSummary) {}
}

impl SearchObserver for () {}

/// Observer that keeps every solution and the last reports.
#[derive(Debug, Default)]
pub struct CollectSolutions {
    pub solutions: Vec<Vec<PlacedPiece>>,
    pub last_status: Option<StatusSnapshot>,
    pub summary: Option<SearchSummary>,
}

impl SearchObserver for CollectSolutions {
    fn on_status(&mut self, status: &StatusSnapshot) {
        self.last_status = Some(status.clone());
    }

    fn on_solution(&mut self, placements: &[PlacedPiece]) {
        self.solutions.push(placements.to_vec());
    }

    fn on_done(&mut self, summary: &SearchSummary) {
        self.summary = Some(summary.clone());
    }
}

/// Static classification of the starting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    Ready,
    TriviallySolved,
    CellCountMismatch { open_cells: usize },
}

impl Preflight {
    /// Classifies a state by its number of open cells.
    pub fn for_open_cells(open_cells: usize) -> Self {
        if open_cells == 0 {
            Preflight::TriviallySolved
        } else if open_cells % CELLS_PER_PIECE != 0 {
            Preflight::CellCountMismatch { open_cells }
        } else {
            Preflight::Ready
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Done(TerminationReason),
}

/// Result of one [`Engine::run_slice`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// The step budget ran out; call again to continue.
    Yielded,
    Paused,
    Done(TerminationReason),
}

enum Step {
    Continue,
    Pause,
    Finish(TerminationReason),
}

#[derive(Debug, Clone)]
struct Frame {
    /// Cell every candidate of this frame covers.
    cell: usize,
    /// Next index into the cell's candidate order.
    cursor: usize,
    placed: Option<CandidateId>,
    /// Cleared when part of the subtree was skipped without proof.
    exhaustive: bool,
    solutions_before: u64,
}

impl Frame {
    fn new(cell: usize, solutions_before: u64) -> Self {
        Self {
            cell,
            cursor: 0,
            placed: None,
            exhaustive: true,
            solutions_before,
        }
    }
}

pub struct Engine<'a> {
    pre: &'a Precomputed,
    settings: Settings,
    container_id: Option<String>,
    initial: Bitboard,
    occupied: Bitboard,
    placed_count: usize,
    inventory: Inventory,
    hash: u64,
    frames: Vec<Frame>,
    /// Candidate order per cell, sorted by `piece_rank`.
    orders: Vec<Vec<CandidateId>>,
    /// Cells whose order missed a re-sort while a frame was scanning it.
    stale_orders: Bitboard,
    /// Priority of each piece; lower is tried first.
    piece_rank: Vec<usize>,
    tt: Option<TranspositionTable>,
    rng: StdRng,
    stall: StallMonitor,
    counters: Counters,
    state: EngineState,
    started: Option<Instant>,
    finished: Option<Duration>,
    deadline: Option<Instant>,
    last_status: Instant,
    pause_requested: bool,
    cancel_requested: bool,
    message: Option<String>,
    #[cfg(test)]
    dead_log: Vec<(Bitboard, Inventory)>,
}

impl<'a> Engine<'a> {
    /// Engine over an empty container with the inventory from `settings`.
    pub fn new(pre: &'a Precomputed, settings: Settings) -> Result<Self> {
        let inventory = Inventory::from_settings(pre.piece_ids(), &settings.pieces)?;
        Self::with_state(pre, settings, Bitboard::EMPTY, inventory)
    }

    /// Engine starting from a partially filled container. Solutions only
    /// list the placements the engine itself makes.
    pub fn with_state(
        pre: &'a Precomputed,
        settings: Settings,
        occupied: Bitboard,
        inventory: Inventory,
    ) -> Result<Self> {
        settings.validate()?;
        if !occupied.is_subset(&pre.full()) {
            return Err(SolverError::BadMask(
                "initial occupancy has cells outside the container".to_string(),
            ));
        }
        if inventory.len() != pre.piece_ids().len() {
            return Err(SolverError::invalid_settings(format!(
                "inventory tracks {} pieces, catalog has {}",
                inventory.len(),
                pre.piece_ids().len()
            )));
        }

        let tt = if !settings.tt.enable {
            None
        } else if inventory.max_count() as usize > MAX_TRACKED_COUNT {
            warn!(
                max_count = inventory.max_count(),
                bound = MAX_TRACKED_COUNT,
                "inventory count exceeds hash key bound, transposition table disabled"
            );
            None
        } else {
            Some(TranspositionTable::with_bytes(settings.tt.bytes, settings.tt.policy))
        };

        let open = pre.full().and_not(&occupied);
        let now = Instant::now();
        Ok(Self {
            pre,
            container_id: None,
            initial: occupied,
            occupied,
            placed_count: 0,
            hash: pre.hash_state(&open, &inventory),
            inventory,
            frames: Vec::with_capacity(pre.cell_count() / CELLS_PER_PIECE + 1),
            orders: (0..pre.cell_count())
                .map(|cell| pre.candidates_for(cell).to_vec())
                .collect(),
            stale_orders: Bitboard::EMPTY,
            piece_rank: (0..pre.piece_ids().len()).collect(),
            tt,
            rng: StdRng::seed_from_u64(settings.seed),
            stall: StallMonitor::new(now),
            counters: Counters::default(),
            state: EngineState::Idle,
            started: None,
            finished: None,
            deadline: None,
            last_status: now,
            pause_requested: false,
            cancel_requested: false,
            message: None,
            settings,
            #[cfg(test)]
            dead_log: Vec::new(),
        })
    }

    /// Tags snapshots with a container identifier.
    pub fn with_container_id(mut self, id: impl Into<String>) -> Self {
        self.container_id = Some(id.into());
        self
    }

    /// Classifies the starting state without searching.
    pub fn preflight(&self) -> Preflight {
        Preflight::for_open_cells(self.pre.full().and_not(&self.initial).count() as usize)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn occupied(&self) -> Bitboard {
        self.occupied
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Transposition table counters, if the table is active.
    pub fn tt_stats(&self) -> Option<TtStats> {
        self.tt.as_ref().map(TranspositionTable::stats)
    }

    /// Requests a pause at the top of the next slice.
    pub fn pause(&mut self) {
        self.pause_requested = true;
    }

    pub fn resume(&mut self) {
        self.pause_requested = false;
        if self.state == EngineState::Paused {
            self.state = EngineState::Running;
        }
    }

    /// Requests cancellation; the next slice ends the run.
    pub fn cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Runs at most `max_steps` search steps.
    pub fn run_slice(&mut self, max_steps: u32, observer: &mut dyn SearchObserver) -> SliceOutcome {
        if let EngineState::Done(reason) = self.state {
            return SliceOutcome::Done(reason);
        }
        if self.cancel_requested {
            return self.finish(TerminationReason::Canceled, observer);
        }
        match self.state {
            EngineState::Paused => return SliceOutcome::Paused,
            EngineState::Idle => {
                if let Some(reason) = self.start(observer) {
                    return self.finish(reason, observer);
                }
            }
            _ => {}
        }
        if self.pause_requested {
            self.pause_requested = false;
            self.state = EngineState::Paused;
            return SliceOutcome::Paused;
        }

        let now = Instant::now();
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            return self.finish(TerminationReason::Timeout, observer);
        }
        if self.settings.randomize_ties {
            if let Some(trigger) = self.stall.poll(now, self.counters.nodes, &self.settings.stall) {
                if let Err(violation) = self.apply_stall_action(self.settings.stall.action, trigger) {
                    return self.abort(violation, observer);
                }
            }
        }

        for _ in 0..max_steps {
            match self.step(observer) {
                Ok(Step::Continue) => {}
                Ok(Step::Pause) => {
                    self.state = EngineState::Paused;
                    return SliceOutcome::Paused;
                }
                Ok(Step::Finish(reason)) => return self.finish(reason, observer),
                Err(violation) => return self.abort(violation, observer),
            }
        }

        if self.last_status.elapsed() >= self.settings.status_interval() {
            self.emit_status(observer);
        }
        SliceOutcome::Yielded
    }

    /// Drives the run to its end, resuming after every solution pause.
    pub fn run_to_completion(&mut self, observer: &mut dyn SearchObserver) -> SearchSummary {
        loop {
            match self.run_slice(DEFAULT_SLICE_STEPS, observer) {
                SliceOutcome::Yielded => {}
                SliceOutcome::Paused => self.resume(),
                SliceOutcome::Done(reason) => return self.summary_for(reason),
            }
        }
    }

    /// Terminal summary, once the run has ended.
    pub fn summary(&self) -> Option<SearchSummary> {
        match self.state {
            EngineState::Done(reason) => Some(self.summary_for(reason)),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            nodes: self.counters.nodes,
            depth: self.frames.len(),
            elapsed_ms: self.elapsed().as_millis() as u64,
            pruned: self.counters.pruned,
            placed: self.placed_count,
            open_cells: self.pre.full().and_not(&self.occupied).count() as usize,
            solutions: self.counters.solutions,
            stack: self.stack(),
            inventory: self
                .settings
                .track_inventory
                .then(|| self.inventory.to_map(self.pre.piece_ids())),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let ids = self.pre.piece_ids();
        let mut order: Vec<usize> = (0..ids.len()).collect();
        order.sort_by_key(|&piece| self.piece_rank[piece]);
        EngineSnapshot {
            container_id: self.container_id.clone(),
            occupancy: self.occupied.to_hex(),
            piece_order: order.into_iter().map(|piece| ids[piece]).collect(),
            inventory: self.inventory.to_map(ids),
            frames: self
                .frames
                .iter()
                .map(|frame| FrameSnapshot {
                    cell: frame.cell,
                    cursor: frame.cursor,
                    placed: frame.placed.map(|id| self.pre.placed(id)),
                })
                .collect(),
            counters: self.counters,
            elapsed_ms: self.elapsed().as_millis() as u64,
            settings: self.settings.clone(),
        }
    }

    fn start(&mut self, observer: &mut dyn SearchObserver) -> Option<TerminationReason> {
        let now = Instant::now();
        self.started = Some(now);
        self.deadline = self.settings.timeout().map(|timeout| now + timeout);
        self.last_status = now;
        self.stall = StallMonitor::new(now);
        self.state = EngineState::Running;

        let open = self.pre.full().and_not(&self.occupied);
        info!(
            cells = self.pre.cell_count(),
            open = open.count(),
            candidates = self.pre.candidates().len(),
            pieces = self.inventory.total(),
            tt = self.tt.is_some(),
            "search started"
        );

        match self.preflight() {
            Preflight::Ready => {
                let cell = self.choose_cell(&open);
                self.push_frame(cell);
                None
            }
            Preflight::TriviallySolved => {
                self.counters.solutions = 1;
                observer.on_solution(&[]);
                Some(TerminationReason::TriviallySolved)
            }
            Preflight::CellCountMismatch { open_cells } => {
                warn!(open_cells, "open cell count is not a multiple of {CELLS_PER_PIECE}");
                Some(TerminationReason::CellCountMismatch)
            }
        }
    }

    fn step(&mut self, observer: &mut dyn SearchObserver) -> std::result::Result<Step, InvariantViolation> {
        let Some(top) = self.frames.len().checked_sub(1) else {
            return Ok(Step::Finish(TerminationReason::Complete));
        };
        if let Some(previous) = self.frames[top].placed.take() {
            self.undo(previous)?;
        }

        let (found, cursor, exhaustive) = self.scan(self.frames[top].cell, self.frames[top].cursor);
        let frame = &mut self.frames[top];
        frame.cursor = cursor;
        frame.exhaustive &= exhaustive;
        let Some(id) = found else {
            return self.backtrack();
        };

        self.place(id)?;
        self.frames[top].placed = Some(id);
        self.counters.nodes += 1;

        let open = self.pre.full().and_not(&self.occupied);
        if open.is_empty() {
            return Ok(self.solution_found(observer, &[]));
        }
        let tail = &self.settings.tail_switch;
        if tail.enable && open.count() as usize <= tail.tail_size {
            return Ok(self.run_tail(open, observer));
        }

        let cell = self.choose_cell(&open);
        self.push_frame(cell);
        self.stall.note_depth(self.frames.len());
        Ok(Step::Continue)
    }

    /// Finds the next passing candidate at `cell` starting from `cursor`.
    ///
    /// Returns the candidate, the cursor past it, and whether every
    /// rejection was sound for the state alone.
    fn scan(&mut self, cell: usize, mut cursor: usize) -> (Option<CandidateId>, usize, bool) {
        let pre = self.pre;
        let full = pre.full();
        let rules = &self.settings.pruning;
        let mut exhaustive = true;

        while cursor < self.orders[cell].len() {
            let id = self.orders[cell][cursor];
            cursor += 1;
            let candidate = pre.candidate(id);
            if !self.inventory.available(candidate.piece) || candidate.mask.intersects(&self.occupied) {
                continue;
            }

            let open = full.and_not(&(self.occupied | candidate.mask));
            let touch = (!self.occupied.is_empty()).then(|| candidate.halo.intersects(&self.occupied));
            if let Err(rule) = prune::check(rules, &open, touch, pre) {
                self.counters.pruned += 1;
                // depends on the path, not on the state
                if rule == Prune::NeighborTouch {
                    exhaustive = false;
                }
                continue;
            }

            if let Some(tt) = self.tt.as_mut() {
                let child = self.hash ^ placement_key(pre, &self.inventory, candidate);
                if tt.lookup(child) == Some(TtFlag::Dead) {
                    self.counters.pruned += 1;
                    self.counters.tt_hits += 1;
                    continue;
                }
            }
            return (Some(id), cursor, exhaustive);
        }
        (None, cursor, exhaustive)
    }

    fn backtrack(&mut self) -> std::result::Result<Step, InvariantViolation> {
        let frame = self.frames.pop().ok_or(InvariantViolation::StackUnderflow)?;
        self.counters.backtracks += 1;
        if frame.exhaustive && self.counters.solutions == frame.solutions_before {
            self.mark_dead();
        }
        match self.frames.last_mut() {
            Some(parent) => {
                parent.exhaustive &= frame.exhaustive;
                Ok(Step::Continue)
            }
            None => Ok(Step::Finish(TerminationReason::Complete)),
        }
    }

    /// Picks the cell the next frame branches on. `open` must not be empty.
    fn choose_cell(&mut self, open: &Bitboard) -> usize {
        if self.settings.move_ordering == MoveOrdering::Naive {
            return open.first().unwrap_or_default();
        }

        let offset = if self.settings.randomize_ties {
            self.rng.gen_range(0..self.pre.cell_count().max(1))
        } else {
            0
        };
        let mut best: Option<(usize, usize)> = None;
        let rotated = open
            .ones()
            .filter(|&cell| cell >= offset)
            .chain(open.ones().filter(|&cell| cell < offset));
        for cell in rotated {
            let cap = best.map(|(_, count)| count);
            let fitting = fitting_count(self.pre, cell, open, &self.inventory, cap);
            if best.map_or(true, |(_, count)| fitting < count) {
                best = Some((cell, fitting));
                if fitting <= 1 {
                    break;
                }
            }
        }
        best.map(|(cell, _)| cell).unwrap_or_default()
    }

    fn place(&mut self, id: CandidateId) -> std::result::Result<(), InvariantViolation> {
        let candidate = *self.pre.candidate(id);
        if candidate.mask.intersects(&self.occupied) {
            return Err(InvariantViolation::OccupancyOverflow);
        }
        let before = self
            .inventory
            .take(candidate.piece, self.pre.piece_ids()[candidate.piece])?;
        self.occupied |= candidate.mask;
        if !self.occupied.is_subset(&self.pre.full()) {
            return Err(InvariantViolation::OccupancyOverflow);
        }
        self.hash ^= cells_key(self.pre, &candidate) ^ count_flip(self.pre, candidate.piece, before);
        self.placed_count += 1;
        Ok(())
    }

    fn undo(&mut self, id: CandidateId) -> std::result::Result<(), InvariantViolation> {
        let candidate = *self.pre.candidate(id);
        if self.placed_count == 0 || !candidate.mask.is_subset(&self.occupied) {
            return Err(InvariantViolation::UndoMismatch(
                self.pre.piece_ids()[candidate.piece],
            ));
        }
        self.occupied = self.occupied.and_not(&candidate.mask);
        let before = self.inventory.give_back(candidate.piece);
        self.hash ^= cells_key(self.pre, &candidate)
            ^ count_flip(self.pre, candidate.piece, before.saturating_add(1));
        self.placed_count -= 1;
        Ok(())
    }

    fn mark_dead(&mut self) {
        if let Some(tt) = self.tt.as_mut() {
            tt.store(self.hash, TtFlag::Dead);
            #[cfg(test)]
            self.dead_log.push((self.occupied, self.inventory.clone()));
        }
    }

    fn run_tail(&mut self, open: Bitboard, observer: &mut dyn SearchObserver) -> Step {
        self.counters.tail_calls += 1;
        let result = TailSolver::new(self.pre)
            .with_color_residue(self.settings.pruning.color_residue)
            .with_deadline(self.deadline)
            .solve(open, &self.inventory);
        self.counters.nodes += result.nodes;
        trace!(open = open.count(), nodes = result.nodes, feasible = result.feasible(), "tail solve");

        match result.outcome {
            TailOutcome::Solved(rest) => self.solution_found(observer, &rest),
            TailOutcome::Unsolvable => {
                self.mark_dead();
                Step::Continue
            }
            TailOutcome::TimedOut => Step::Finish(TerminationReason::Timeout),
        }
    }

    fn solution_found(&mut self, observer: &mut dyn SearchObserver, tail: &[CandidateId]) -> Step {
        self.counters.solutions += 1;
        self.stall.note_solution();
        let placements: Vec<PlacedPiece> = self
            .frames
            .iter()
            .filter_map(|frame| frame.placed)
            .chain(tail.iter().copied())
            .map(|id| self.pre.placed(id))
            .collect();
        debug!(
            solution = self.counters.solutions,
            nodes = self.counters.nodes,
            "solution found"
        );
        observer.on_solution(&placements);
        self.emit_status(observer);

        let max = self.settings.max_solutions;
        if max > 0 && self.counters.solutions >= max {
            Step::Finish(TerminationReason::Limit)
        } else if self.settings.pause_on_solution {
            Step::Pause
        } else {
            Step::Continue
        }
    }

    fn emit_status(&mut self, observer: &mut dyn SearchObserver) {
        self.last_status = Instant::now();
        observer.on_status(&self.status());
    }

    fn abort(&mut self, violation: InvariantViolation, observer: &mut dyn SearchObserver) -> SliceOutcome {
        error!(%violation, depth = self.frames.len(), "search invariant violated, aborting run");
        self.message = Some(violation.to_string());
        self.finish(TerminationReason::Aborted, observer)
    }

    fn finish(&mut self, reason: TerminationReason, observer: &mut dyn SearchObserver) -> SliceOutcome {
        if reason == TerminationReason::Complete && self.counters.stall_actions > 0 && self.message.is_none() {
            self.message = Some(format!(
                "{} stall actions skipped part of the search space",
                self.counters.stall_actions
            ));
        }
        self.finished = Some(self.started.map(|s| s.elapsed()).unwrap_or_default());
        self.state = EngineState::Done(reason);
        let summary = self.summary_for(reason);
        info!(
            ?reason,
            solutions = summary.solutions,
            nodes = summary.nodes,
            elapsed_ms = summary.elapsed_ms,
            "search finished"
        );
        observer.on_done(&summary);
        SliceOutcome::Done(reason)
    }

    fn summary_for(&self, reason: TerminationReason) -> SearchSummary {
        SearchSummary {
            solutions: self.counters.solutions,
            nodes: self.counters.nodes,
            elapsed_ms: self.elapsed().as_millis() as u64,
            reason,
            counters: self.counters,
            message: self.message.clone(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.finished
            .or_else(|| self.started.map(|s| s.elapsed()))
            .unwrap_or_default()
    }

    fn stack(&self) -> Vec<PlacedPiece> {
        self.frames
            .iter()
            .filter_map(|frame| frame.placed)
            .map(|id| self.pre.placed(id))
            .collect()
    }

    /// Opens a frame on `cell`, first catching up on any re-sort its
    /// order missed.
    fn push_frame(&mut self, cell: usize) {
        if self.stale_orders.contains(cell) {
            self.stale_orders.remove(cell);
            self.sort_order(cell);
        }
        self.frames.push(Frame::new(cell, self.counters.solutions));
    }

    /// Re-sorts candidates by the current piece ranks. Cells with a live
    /// frame keep their order, so the tried prefix below each cursor is
    /// never reshuffled; they are sorted when next opened.
    fn sort_orders(&mut self) {
        let live = Bitboard::from_indices(self.frames.iter().map(|frame| frame.cell));
        for cell in 0..self.orders.len() {
            if live.contains(cell) {
                self.stale_orders.insert(cell);
            } else {
                self.sort_order(cell);
            }
        }
    }

    fn sort_order(&mut self, cell: usize) {
        let pre = self.pre;
        let rank = &self.piece_rank;
        self.orders[cell].sort_by_key(|&id| rank[pre.candidate(id).piece]);
    }
}

#[inline]
fn cells_key(pre: &Precomputed, candidate: &Candidate) -> u64 {
    candidate
        .cells
        .iter()
        .fold(0, |hash, &cell| hash ^ pre.cell_key(cell as usize))
}

/// Key change when a piece's count moves between `upper` and `upper - 1`.
#[inline]
fn count_flip(pre: &Precomputed, piece: usize, upper: u8) -> u64 {
    pre.count_key(piece, upper) ^ pre.count_key(piece, upper.saturating_sub(1))
}

/// Hash delta of placing `candidate` with the current inventory.
#[inline]
fn placement_key(pre: &Precomputed, inventory: &Inventory, candidate: &Candidate) -> u64 {
    cells_key(pre, candidate) ^ count_flip(pre, candidate.piece, inventory.get(candidate.piece))
}
