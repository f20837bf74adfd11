//! Packing Puzzle Solver
//!
//! Fills a container of FCC or cubic lattice cells with 4-cell pieces. With
//! no input files the built-in demo is used: a four-layer FCC pyramid and
//! six pieces, one copy each.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use spherepack::config::Settings;
use spherepack::dlx::DlxOptions;
use spherepack::engine::{
    Engine, Preflight, SearchObserver, SearchSummary, SliceOutcome, StatusSnapshot,
    TerminationReason,
};
use spherepack::error::Result;
use spherepack::lattice::{Container, ContainerSpec, Lattice};
use spherepack::pieces::{CatalogSpec, PieceCatalog, PlacedPiece, CELLS_PER_PIECE};
use spherepack::{grid, persistence, Puzzle};

/// Solves exact-cover packing puzzles on FCC and cubic lattices.
#[derive(Parser)]
#[command(name = "spherepack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Search for solutions and save them to disk.
    Solve {
        #[command(flatten)]
        inputs: Inputs,
        /// Directory for solutions.json and solutions.txt.
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Write the final engine snapshot to this file.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Search steps per slice.
        #[arg(long, default_value_t = spherepack::engine::DEFAULT_SLICE_STEPS)]
        slice_steps: u32,
    },
    /// Check feasibility with dancing links.
    Check {
        #[command(flatten)]
        inputs: Inputs,
        /// Count every solution instead of stopping at the first.
        #[arg(long)]
        count: bool,
    },
    /// Print search-space statistics.
    Estimate {
        #[command(flatten)]
        inputs: Inputs,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Describe a saved engine snapshot.
    Describe {
        snapshot: PathBuf,
    },
    /// Show the number of saved solutions.
    Count {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

/// Puzzle and settings sources shared by the solving commands.
#[derive(Args)]
struct Inputs {
    /// Container JSON file; defaults to the demo pyramid.
    #[arg(long)]
    container: Option<PathBuf>,
    /// Piece catalog JSON file; defaults to the demo pieces.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Settings JSON file.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Stop after this many solutions (0 for all).
    #[arg(long)]
    max_solutions: Option<u64>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Only keep physically supported placements.
    #[arg(long)]
    gravity: bool,
}

impl Inputs {
    fn load(&self) -> Result<(Puzzle, Settings)> {
        let puzzle = match &self.container {
            None if self.catalog.is_none() => Puzzle::demo()?,
            None => {
                let catalog = load_catalog(self.catalog.as_deref(), Lattice::Fcc)?;
                Puzzle::new(Container::pyramid(4)?.with_id("pyramid-4"), catalog)
            }
            Some(path) => {
                let spec: ContainerSpec = serde_json::from_str(&fs::read_to_string(path)?)?;
                let container = Container::from_spec(spec)?;
                let catalog = load_catalog(self.catalog.as_deref(), container.lattice())?;
                Puzzle::new(container, catalog)
            }
        };

        let mut settings = match &self.settings {
            Some(path) => Settings::from_json(&fs::read_to_string(path)?)?,
            None => Settings::default(),
        };
        if let Some(max) = self.max_solutions {
            settings.max_solutions = max;
        }
        if let Some(ms) = self.timeout_ms {
            settings.timeout_ms = ms;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        settings.gravity |= self.gravity;
        settings.validate()?;
        Ok((puzzle, settings))
    }
}

fn load_catalog(path: Option<&Path>, lattice: Lattice) -> Result<PieceCatalog> {
    match path {
        Some(path) => {
            let spec: CatalogSpec = serde_json::from_str(&fs::read_to_string(path)?)?;
            PieceCatalog::from_spec(spec)
        }
        None => PieceCatalog::demo(lattice),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.unwrap_or_else(|| Command::Solve {
        inputs: Inputs {
            container: None,
            catalog: None,
            settings: None,
            max_solutions: None,
            timeout_ms: None,
            seed: None,
            gravity: false,
        },
        out: PathBuf::from("."),
        snapshot: None,
        slice_steps: spherepack::engine::DEFAULT_SLICE_STEPS,
    });

    let result = match command {
        Command::Solve {
            inputs,
            out,
            snapshot,
            slice_steps,
        } => run_solver(&inputs, &out, snapshot.as_deref(), slice_steps),
        Command::Check { inputs, count } => run_check(&inputs, count),
        Command::Estimate { inputs, json } => run_estimate(&inputs, json),
        Command::Describe { snapshot } => run_describe(&snapshot),
        Command::Count { out } => run_count(&out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Prints solutions as they arrive and logs status reports.
struct ConsoleObserver<'a> {
    container: &'a Container,
    axis: spherepack::config::Axis,
    solutions: Vec<Vec<PlacedPiece>>,
}

impl SearchObserver for ConsoleObserver<'_> {
    fn on_status(&mut self, status: &StatusSnapshot) {
        info!(
            nodes = status.nodes,
            depth = status.depth,
            pruned = status.pruned,
            open = status.open_cells,
            solutions = status.solutions,
            elapsed_ms = status.elapsed_ms,
            "status"
        );
    }

    fn on_solution(&mut self, placements: &[PlacedPiece]) {
        println!("Solution {}:", self.solutions.len() + 1);
        print!("{}", grid::format_solution(self.container, placements, self.axis));
        println!();
        self.solutions.push(placements.to_vec());
    }

    fn on_done(&mut self, summary: &SearchSummary) {
        println!(
            "{:?}: {} solutions, {} nodes in {} ms",
            summary.reason, summary.solutions, summary.nodes, summary.elapsed_ms
        );
        if let Some(message) = &summary.message {
            eprintln!("{message}");
        }
    }
}

/// Drives the engine slice by slice, then saves what it found.
fn run_solver(inputs: &Inputs, out: &Path, snapshot: Option<&Path>, slice_steps: u32) -> Result<()> {
    let (puzzle, settings) = inputs.load()?;
    let pre = puzzle.precompute(&settings)?;
    let mut engine = Engine::new(&pre, settings.clone())?;
    if let Some(id) = puzzle.container.id() {
        engine = engine.with_container_id(id);
    }

    let mut observer = ConsoleObserver {
        container: &puzzle.container,
        axis: settings.support_axis,
        solutions: Vec::new(),
    };
    let reason = loop {
        match engine.run_slice(slice_steps, &mut observer) {
            SliceOutcome::Yielded => {}
            SliceOutcome::Paused => engine.resume(),
            SliceOutcome::Done(reason) => break reason,
        }
    };

    if let Some(path) = snapshot {
        persistence::save_snapshot(path, &engine.snapshot())?;
        println!("Wrote snapshot to {}", path.display());
    }
    if reason != TerminationReason::CellCountMismatch {
        persistence::save(out, &puzzle.container, &observer.solutions, settings.support_axis)?;
        println!(
            "Wrote {} and {} to {}",
            persistence::SOLUTIONS_TXT,
            persistence::SOLUTIONS_JSON,
            out.display()
        );
    }
    Ok(())
}

fn run_check(inputs: &Inputs, count: bool) -> Result<()> {
    print!("{}", check_report(inputs, count)?);
    Ok(())
}

/// Feasibility report for `check`. Degenerate containers are reported
/// without building the matrix.
fn check_report(inputs: &Inputs, count: bool) -> Result<String> {
    let (puzzle, settings) = inputs.load()?;
    match puzzle.preflight() {
        Preflight::Ready => {}
        Preflight::TriviallySolved => {
            return Ok("feasible: true (trivially solved, no open cells)\n".to_string())
        }
        Preflight::CellCountMismatch { open_cells } => {
            return Ok(format!(
                "feasible: false (cell count mismatch: {open_cells} open cells is not a multiple of {CELLS_PER_PIECE})\n"
            ))
        }
    }

    let options = DlxOptions {
        max_solutions: if count { settings.max_solutions } else { 1 },
        deadline: settings.timeout().map(|t| std::time::Instant::now() + t),
        want_witness: true,
    };
    let result = puzzle.check(&settings, options)?;
    let mut report = format!(
        "feasible: {} ({:?}, {} solutions, {} nodes)\n",
        result.feasible, result.reason, result.solutions, result.nodes
    );
    if let Some(witness) = &result.witness {
        let pre = puzzle.precompute(&settings)?;
        let placed: Vec<PlacedPiece> = witness.iter().map(|&id| pre.placed(id)).collect();
        report.push_str(&grid::format_solution(&puzzle.container, &placed, settings.support_axis));
    }
    Ok(report)
}

fn run_estimate(inputs: &Inputs, json: bool) -> Result<()> {
    let (puzzle, settings) = inputs.load()?;
    let estimate = puzzle.estimate(&settings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        println!("{estimate}");
    }
    Ok(())
}

fn run_describe(path: &Path) -> Result<()> {
    let snapshot = persistence::load_snapshot(path)?;
    print!("{}", snapshot.describe());
    Ok(())
}

fn run_count(out: &Path) -> Result<()> {
    match persistence::count(out)? {
        Some(count) => println!("{count} solutions"),
        None => eprintln!(
            "No {} found in {}. Run 'spherepack solve' first.",
            persistence::SOLUTIONS_JSON,
            out.display()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("spherepack-cli-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_no_subcommand_means_demo() {
        let cli = Cli::try_parse_from(["spherepack"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_flags_override_settings_file() {
        let file = scratch_file("settings.json", r#"{"maxSolutions": 3, "seed": 9}"#);
        let cli = Cli::try_parse_from([
            "spherepack",
            "check",
            "--settings",
            file.to_str().unwrap(),
            "--max-solutions",
            "0",
            "--gravity",
        ])
        .unwrap();
        let Some(Command::Check { inputs, count }) = cli.command else {
            panic!("expected check");
        };
        assert!(!count);
        let (puzzle, settings) = inputs.load().unwrap();
        assert_eq!(settings.max_solutions, 0);
        assert_eq!(settings.seed, 9);
        assert!(settings.gravity);
        assert_eq!(puzzle.container.id(), Some("pyramid-4"));
        let _ = fs::remove_file(&file);
    }

    #[test]
    fn test_container_file_picks_matching_catalog() {
        let container = scratch_file(
            "container.json",
            r#"{"id": "slab", "lattice": "cubic", "cells": [[0,0,0],[1,0,0],[0,1,0],[1,1,0]]}"#,
        );
        let cli = Cli::try_parse_from([
            "spherepack",
            "estimate",
            "--container",
            container.to_str().unwrap(),
        ])
        .unwrap();
        let Some(Command::Estimate { inputs, .. }) = cli.command else {
            panic!("expected estimate");
        };
        let (puzzle, _) = inputs.load().unwrap();
        assert_eq!(puzzle.container.len(), 4);
        assert_eq!(puzzle.catalog.lattice(), Lattice::Cubic);
        let _ = fs::remove_file(&container);
    }

    #[test]
    fn test_check_reports_cell_count_mismatch() {
        let container = scratch_file(
            "corner.json",
            r#"{"lattice": "cubic", "cells": [[0,0,0],[1,0,0],[0,1,0]]}"#,
        );
        let inputs = Inputs {
            container: Some(container.clone()),
            catalog: None,
            settings: None,
            max_solutions: None,
            timeout_ms: None,
            seed: None,
            gravity: false,
        };
        let report = check_report(&inputs, false).unwrap();
        assert!(report.contains("cell count mismatch: 3 open cells"), "{report}");
        let _ = fs::remove_file(&container);
    }

    #[test]
    fn test_solve_writes_solution_files() {
        let container = scratch_file(
            "square.json",
            r#"{"lattice": "cubic", "cells": [[0,0,0],[1,0,0],[0,1,0],[1,1,0]]}"#,
        );
        let out = std::env::temp_dir().join(format!("spherepack-cli-{}-out", std::process::id()));
        let inputs = Inputs {
            container: Some(container.clone()),
            catalog: None,
            settings: None,
            max_solutions: Some(1),
            timeout_ms: None,
            seed: None,
            gravity: false,
        };
        run_solver(&inputs, &out, None, 64).unwrap();
        let saved = persistence::load_all(&out).unwrap().unwrap();
        assert_eq!(saved.solutions.len(), 1);
        assert_eq!(saved.solutions[0][0].piece, 'O');
        let _ = fs::remove_dir_all(&out);
        let _ = fs::remove_file(&container);
    }
}
