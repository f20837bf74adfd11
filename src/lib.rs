//! Polycube and sphere-packing puzzle solver library.
//!
//! Fills a container of lattice cells (face-centered cubic or simple cubic)
//! with 4-cell pieces from a catalog, either by the cooperative
//! depth-first [`engine`] or by the synchronous [`dlx`] and [`tail`]
//! exact-cover solvers. [`Puzzle`] bundles the common path.

pub mod bitboard;
pub mod config;
pub mod dlx;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod geometry;
pub mod gravity;
pub mod grid;
pub mod inventory;
pub mod lattice;
pub mod persistence;
pub mod pieces;
pub mod precompute;
pub mod prune;
pub mod tail;
pub mod tt;

use config::Settings;
use dlx::{DlxOptions, DlxResult};
use engine::{CollectSolutions, Engine, Preflight, SearchObserver, SearchSummary};
use error::Result;
use estimate::SearchSpaceEstimate;
use gravity::SupportFilter;
use inventory::Inventory;
use lattice::Container;
use pieces::{PieceCatalog, PlacedPiece};
use precompute::Precomputed;

/// A container together with the catalog of pieces that may fill it.
#[derive(Debug, Clone)]
pub struct Puzzle {
    pub container: Container,
    pub catalog: PieceCatalog,
}

/// Solutions and terminal summary of a blocking solve.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub solutions: Vec<Vec<PlacedPiece>>,
    pub summary: SearchSummary,
}

impl Puzzle {
    pub fn new(container: Container, catalog: PieceCatalog) -> Self {
        Self { container, catalog }
    }

    /// Four-layer FCC pyramid with the demo catalog.
    pub fn demo() -> Result<Self> {
        let container = Container::pyramid(4)?.with_id("pyramid-4");
        let catalog = PieceCatalog::demo(container.lattice())?;
        Ok(Self::new(container, catalog))
    }

    /// Precomputes placements, applying the gravity filter when the
    /// settings ask for it.
    pub fn precompute(&self, settings: &Settings) -> Result<Precomputed> {
        if settings.gravity {
            let filter = SupportFilter::new(&self.container, settings.support_axis);
            Precomputed::build_filtered(&self.container, &self.catalog, |c| filter.admits(&c.cells))
        } else {
            Precomputed::build(&self.container, &self.catalog)
        }
    }

    /// Runs the engine to its end and collects every solution it emits.
    pub fn solve(&self, settings: &Settings) -> Result<SolveReport> {
        let mut observer = CollectSolutions::default();
        let summary = self.solve_with(settings, &mut observer)?;
        Ok(SolveReport {
            solutions: observer.solutions,
            summary,
        })
    }

    /// Runs the engine to its end, reporting to `observer`.
    pub fn solve_with(
        &self,
        settings: &Settings,
        observer: &mut dyn SearchObserver,
    ) -> Result<SearchSummary> {
        let pre = self.precompute(settings)?;
        let mut engine = Engine::new(&pre, settings.clone())?;
        if let Some(id) = self.container.id() {
            engine = engine.with_container_id(id);
        }
        Ok(engine.run_to_completion(observer))
    }

    /// Classifies the empty container before any search.
    pub fn preflight(&self) -> Preflight {
        Preflight::for_open_cells(self.container.len())
    }

    /// Exact-cover check of the whole container with dancing links.
    pub fn check(&self, settings: &Settings, options: DlxOptions) -> Result<DlxResult> {
        let pre = self.precompute(settings)?;
        let inventory = Inventory::from_settings(pre.piece_ids(), &settings.pieces)?;
        Ok(dlx::solve(&pre, pre.full(), &inventory, options))
    }

    pub fn estimate(&self, settings: &Settings) -> Result<SearchSpaceEstimate> {
        let pre = self.precompute(settings)?;
        let inventory = Inventory::from_settings(pre.piece_ids(), &settings.pieces)?;
        Ok(estimate::estimate(&pre, pre.full(), &inventory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Axis;
    use crate::engine::TerminationReason;
    use crate::lattice::Lattice;

    #[test]
    fn test_demo_solve_agrees_with_check() {
        let puzzle = Puzzle::demo().unwrap();
        let settings = Settings::default();
        let report = puzzle.solve(&settings).unwrap();
        let check = puzzle.check(&settings, DlxOptions::first_witness()).unwrap();
        assert_eq!(!report.solutions.is_empty(), check.feasible);
        assert!(matches!(
            report.summary.reason,
            TerminationReason::Complete | TerminationReason::Limit
        ));
    }

    #[test]
    fn test_gravity_only_removes_placements() {
        let container = Container::block(Lattice::Cubic, (2, 3, 4)).unwrap();
        let puzzle = Puzzle::new(container, PieceCatalog::demo(Lattice::Cubic).unwrap());
        let plain = Settings::default();
        let settled = Settings::builder().gravity(true, Axis::Z).build().unwrap();
        let all = puzzle.precompute(&plain).unwrap().candidates().len();
        let supported = puzzle.precompute(&settled).unwrap().candidates().len();
        assert!(supported <= all);
        assert!(supported > 0);
    }

    #[test]
    fn test_preflight_flags_uneven_containers() {
        assert_eq!(Puzzle::demo().unwrap().preflight(), Preflight::Ready);
        let pyramid = Puzzle::new(
            Container::pyramid(3).unwrap(),
            PieceCatalog::demo(Lattice::Fcc).unwrap(),
        );
        assert_eq!(pyramid.preflight(), Preflight::CellCountMismatch { open_cells: 10 });
    }

    #[test]
    fn test_estimate_for_demo() {
        let estimate = Puzzle::demo().unwrap().estimate(&Settings::default()).unwrap();
        assert_eq!(estimate.open_cells, 20);
        assert_eq!(estimate.pieces_needed, 5);
        assert_eq!(estimate.pieces_available, 6);
    }
}
