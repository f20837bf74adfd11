//! File I/O for solutions and engine snapshots.
//!
//! Solutions are written twice into an output directory:
//! - `solutions.json`: the container description plus every solution as a
//!   list of placed pieces, for loading back
//! - `solutions.txt`: each solution rendered layer by layer, for reading
//!
//! Engine snapshots are stored as standalone JSON files.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Axis;
use crate::engine::EngineSnapshot;
use crate::error::Result;
use crate::grid::format_solution;
use crate::lattice::{Container, ContainerSpec};
use crate::pieces::PlacedPiece;

pub const SOLUTIONS_JSON: &str = "solutions.json";
pub const SOLUTIONS_TXT: &str = "solutions.txt";

/// Contents of `solutions.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSolutions {
    pub container: ContainerSpec,
    pub solutions: Vec<Vec<PlacedPiece>>,
}

/// Minimal view of `solutions.json` used for counting.
#[derive(Deserialize)]
struct SolutionCount {
    solutions: Vec<serde::de::IgnoredAny>,
}

/// Saves solutions to both the JSON and text files in `dir`.
pub fn save(dir: &Path, container: &Container, solutions: &[Vec<PlacedPiece>], axis: Axis) -> Result<()> {
    fs::create_dir_all(dir)?;
    save_text(&dir.join(SOLUTIONS_TXT), container, solutions, axis)?;
    save_json(&dir.join(SOLUTIONS_JSON), container, solutions)?;
    debug!(dir = %dir.display(), count = solutions.len(), "saved solutions");
    Ok(())
}

fn save_text(path: &Path, container: &Container, solutions: &[Vec<PlacedPiece>], axis: Axis) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "Found {} solutions:\n", solutions.len())?;
    for (i, solution) in solutions.iter().enumerate() {
        writeln!(file, "Solution {}:", i + 1)?;
        write!(file, "{}", format_solution(container, solution, axis))?;
        writeln!(file)?;
    }
    file.flush()?;
    Ok(())
}

fn save_json(path: &Path, container: &Container, solutions: &[Vec<PlacedPiece>]) -> Result<()> {
    let saved = SavedSolutions {
        container: container.to_spec(),
        solutions: solutions.to_vec(),
    };
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut file, &saved)?;
    file.flush()?;
    Ok(())
}

/// Loads every saved solution from `dir`, or `None` if nothing was saved.
pub fn load_all(dir: &Path) -> Result<Option<SavedSolutions>> {
    let Some(file) = open_if_exists(&dir.join(SOLUTIONS_JSON))? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_reader(BufReader::new(file))?))
}

/// Returns the number of saved solutions without keeping them.
pub fn count(dir: &Path) -> Result<Option<usize>> {
    let Some(file) = open_if_exists(&dir.join(SOLUTIONS_JSON))? else {
        return Ok(None);
    };
    let counted: SolutionCount = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(counted.solutions.len()))
}

pub fn save_snapshot(path: &Path, snapshot: &EngineSnapshot) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, snapshot)?;
    file.flush()?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<EngineSnapshot> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn open_if_exists(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
