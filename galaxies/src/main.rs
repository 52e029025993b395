use std::path::PathBuf;

use clap::Parser;
use galaxies::{
    GalaxyApp, KernelKind, LiveOptions, SimulationConfig,
    constants::{
        BLACK_HOLE_GRAVITY, DEFAULT_BOUNDS, DEFAULT_GALAXIES, DEFAULT_GALAXY_RADIUS,
        DEFAULT_HDR_EXPOSURE, DEFAULT_MAX_GALAXY_SPEED, DEFAULT_SPEED, DEFAULT_STAR_INTENSITY,
        DEFAULT_STAR_SIZE, DEFAULT_STARS_PER_GALAXY,
    },
};
use winit::event_loop::EventLoop;

/// Galaxies of stars orbiting colliding black holes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value_t = DEFAULT_GALAXIES)]
    galaxies: u32,
    #[arg(long, default_value_t = DEFAULT_STARS_PER_GALAXY)]
    stars_per_galaxy: u32,
    #[arg(long, default_value_t = DEFAULT_GALAXY_RADIUS)]
    galaxy_radius: f64,
    /// Half extent of the cube black holes spawn in.
    #[arg(long, default_value_t = DEFAULT_BOUNDS)]
    bounds: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_GALAXY_SPEED)]
    max_galaxy_speed: f64,
    #[arg(long, default_value_t = BLACK_HOLE_GRAVITY)]
    gravity: f64,
    /// Seed for reproducible genesis.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum, default_value_t = KernelKind::Gpu)]
    kernel: KernelKind,

    #[arg(long, default_value_t = DEFAULT_SPEED)]
    speed: f32,
    #[arg(long)]
    light_mode: bool,
    /// Disable tone mapping.
    #[arg(long)]
    no_hdr: bool,
    #[arg(long, default_value_t = DEFAULT_HDR_EXPOSURE)]
    hdr_exposure: f32,
    #[arg(long, default_value_t = DEFAULT_STAR_SIZE)]
    star_size: f32,
    #[arg(long, default_value_t = DEFAULT_STAR_INTENSITY)]
    star_intensity: f32,
    #[arg(long)]
    show_black_holes: bool,
    /// Leave fading trails behind moving stars.
    #[arg(long)]
    blur: bool,
    #[arg(long)]
    auto_center: bool,

    /// Depth layers written when pressing L.
    #[arg(long, default_value_t = 16)]
    layers: u32,
    #[arg(long, default_value = ".")]
    layer_dir: PathBuf,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            galaxies: self.galaxies,
            stars_per_galaxy: self.stars_per_galaxy,
            galaxy_radius: self.galaxy_radius,
            bounds: self.bounds,
            max_galaxy_speed: self.max_galaxy_speed,
            gravity: self.gravity,
            seed: self.seed,
            kernel: self.kernel,
            live: LiveOptions {
                speed: self.speed,
                light_mode: self.light_mode,
                hdr: !self.no_hdr,
                hdr_exposure: self.hdr_exposure,
                star_size: self.star_size,
                star_intensity: self.star_intensity,
                show_black_holes: self.show_black_holes,
                blur: self.blur,
                auto_center: self.auto_center,
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let event_loop = EventLoop::new()?;
    let mut app = GalaxyApp::new(args.config(), args.layers, args.layer_dir.clone());
    event_loop.run_app(&mut app)?;
    app.finish()
}
