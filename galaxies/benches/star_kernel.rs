mod perf;

use criterion::{Criterion, criterion_group, criterion_main};
use galaxies::{
    SimulationConfig,
    grid::StarGrid,
    sim::{
        StarState, StepParams,
        genesis::{Genesis, genesis},
        step_texels,
    },
};
use rand::{SeedableRng, rngs::StdRng};

fn setup(galaxies: u32, stars_per_galaxy: u32) -> (SimulationConfig, Genesis) {
    let config = SimulationConfig {
        galaxies,
        stars_per_galaxy,
        ..SimulationConfig::default()
    };
    let grid = StarGrid::new(galaxies * stars_per_galaxy);
    let initial = genesis(&config, grid, &mut StdRng::seed_from_u64(0));
    (config, initial)
}

fn bench_star_step(c: &mut Criterion) {
    let (config, initial) = setup(2, 50_000);
    let holes = initial.black_holes.positions();
    let params = StepParams::new(config.live.speed, config.gravity);
    let mut back = StarState::zeroed(initial.grid.texel_count());

    c.bench_function("star_step_100k", |b| {
        b.iter(|| step_texels(&initial.stars, &mut back, &holes, &params))
    });
}

fn bench_black_holes(c: &mut Criterion) {
    let (config, initial) = setup(16, 1);
    let mut holes = initial.black_holes;

    c.bench_function("black_holes_16", |b| {
        b.iter(|| holes.step(config.gravity, 1.0))
    });
}

fn bench_genesis(c: &mut Criterion) {
    let config = SimulationConfig {
        galaxies: 2,
        stars_per_galaxy: 50_000,
        ..SimulationConfig::default()
    };
    let grid = StarGrid::new(100_000);

    c.bench_function("genesis_100k", |b| {
        b.iter(|| genesis(&config, grid, &mut StdRng::seed_from_u64(0)))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(perf::FlamegraphProfiler::new(100));
    targets = bench_star_step, bench_black_holes, bench_genesis
}
criterion_main!(benches);
