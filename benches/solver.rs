//! Benchmarks for the packing solver.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use spherepack::config::Settings;
use spherepack::dlx::{self, DlxOptions};
use spherepack::geometry::all_orientations;
use spherepack::inventory::Inventory;
use spherepack::lattice::{Container, Lattice};
use spherepack::pieces::{PieceCatalog, DEMO_SHAPES};
use spherepack::precompute::Precomputed;
use spherepack::Puzzle;

/// Benchmark building every placement for the demo pyramid.
fn bench_precompute(c: &mut Criterion) {
    let puzzle = Puzzle::demo().unwrap();
    c.bench_function("precompute_pyramid_4", |b| {
        b.iter(|| Precomputed::build(black_box(&puzzle.container), &puzzle.catalog).unwrap())
    });
}

/// Benchmark the complete depth-first search of the demo pyramid.
fn bench_solve_demo(c: &mut Criterion) {
    let puzzle = Puzzle::demo().unwrap();
    let settings = Settings::builder().max_solutions(0).build().unwrap();

    let mut group = c.benchmark_group("engine");
    group.sample_size(10);
    group.bench_function("solve_pyramid_4", |b| {
        b.iter(|| puzzle.solve(black_box(&settings)).unwrap())
    });
    group.finish();
}

/// Benchmark counting every tiling of a cubic block with dancing links.
fn bench_dlx_count(c: &mut Criterion) {
    let container = Container::block(Lattice::Cubic, (4, 2, 2)).unwrap();
    let pre = Precomputed::build(&container, &PieceCatalog::demo(Lattice::Cubic).unwrap()).unwrap();
    let inventory = Inventory::uniform(pre.piece_ids().len(), 2);
    let options = DlxOptions {
        max_solutions: 0,
        ..DlxOptions::default()
    };

    c.bench_function("dlx_count_4x2x2", |b| {
        b.iter(|| dlx::solve(&pre, black_box(pre.full()), &inventory, options))
    });
}

/// Benchmark computing all orientations for a single piece.
fn bench_orientations(c: &mut Criterion) {
    let (_, shape) = DEMO_SHAPES[1];

    c.bench_function("all_orientations_fcc", |b| {
        b.iter(|| all_orientations(Lattice::Fcc, black_box(&shape), true))
    });
}

criterion_group!(
    benches,
    bench_precompute,
    bench_solve_demo,
    bench_dlx_count,
    bench_orientations,
);
criterion_main!(benches);
