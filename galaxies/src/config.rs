use std::fmt::Debug;

use crate::constants::{
    BLACK_HOLE_GRAVITY, DEFAULT_BOUNDS, DEFAULT_GALAXIES, DEFAULT_GALAXY_RADIUS,
    DEFAULT_HDR_EXPOSURE, DEFAULT_MAX_GALAXY_SPEED, DEFAULT_SPEED, DEFAULT_STAR_INTENSITY,
    DEFAULT_STAR_SIZE, DEFAULT_STARS_PER_GALAXY,
};

/// Where the per-star integration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum KernelKind {
    /// Compute shader over double-buffered storage textures.
    #[default]
    Gpu,
    /// Rayon parallel-for over double-buffered host arrays.
    Cpu,
}

/// Options that apply on the next tick or frame without regenerating the universe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveOptions {
    /// Time scale of one tick.
    pub speed: f32,
    pub light_mode: bool,
    pub hdr: bool,
    pub hdr_exposure: f32,
    pub star_size: f32,
    /// In (0, 1].
    pub star_intensity: f32,
    pub show_black_holes: bool,
    /// Fade the previous frame instead of clearing it, leaving trails.
    pub blur: bool,
    pub auto_center: bool,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            light_mode: false,
            hdr: true,
            hdr_exposure: DEFAULT_HDR_EXPOSURE,
            star_size: DEFAULT_STAR_SIZE,
            star_intensity: DEFAULT_STAR_INTENSITY,
            show_black_holes: false,
            blur: false,
            auto_center: false,
        }
    }
}

impl LiveOptions {
    /// Replace every out-of-range field with its default.
    pub fn validated(self) -> Self {
        let d = Self::default();
        Self {
            speed: check("speed", self.speed, positive(self.speed), d.speed),
            hdr_exposure: check(
                "hdr_exposure",
                self.hdr_exposure,
                positive(self.hdr_exposure),
                d.hdr_exposure,
            ),
            star_size: check("star_size", self.star_size, positive(self.star_size), d.star_size),
            star_intensity: check(
                "star_intensity",
                self.star_intensity,
                positive(self.star_intensity) && self.star_intensity <= 1.0,
                d.star_intensity,
            ),
            ..self
        }
    }

    /// Color the accumulation target is cleared to, and faded towards.
    pub fn background(&self) -> [f32; 3] {
        if self.light_mode {
            [1.0, 1.0, 1.0]
        } else {
            [0.0, 0.0, 0.0]
        }
    }
}

/// Everything needed to build a universe. Changing any field outside `live`
/// requires a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub galaxies: u32,
    pub stars_per_galaxy: u32,
    pub galaxy_radius: f64,
    /// Half extent of the cube black holes are spawned in, and the auto-center threshold.
    pub bounds: f64,
    pub max_galaxy_speed: f64,
    pub gravity: f64,
    /// Fixed seed for genesis, random if unset.
    pub seed: Option<u64>,
    pub kernel: KernelKind,
    pub live: LiveOptions,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            galaxies: DEFAULT_GALAXIES,
            stars_per_galaxy: DEFAULT_STARS_PER_GALAXY,
            galaxy_radius: DEFAULT_GALAXY_RADIUS,
            bounds: DEFAULT_BOUNDS,
            max_galaxy_speed: DEFAULT_MAX_GALAXY_SPEED,
            gravity: BLACK_HOLE_GRAVITY,
            seed: None,
            kernel: KernelKind::default(),
            live: LiveOptions::default(),
        }
    }
}

impl SimulationConfig {
    /// Replace every out-of-range field with its default. Never fails.
    pub fn validated(self) -> Self {
        let d = Self::default();
        Self {
            galaxies: check("galaxies", self.galaxies, self.galaxies >= 1, d.galaxies),
            stars_per_galaxy: check(
                "stars_per_galaxy",
                self.stars_per_galaxy,
                self.stars_per_galaxy >= 1,
                d.stars_per_galaxy,
            ),
            galaxy_radius: check(
                "galaxy_radius",
                self.galaxy_radius,
                positive(self.galaxy_radius),
                d.galaxy_radius,
            ),
            bounds: check("bounds", self.bounds, positive(self.bounds), d.bounds),
            max_galaxy_speed: check(
                "max_galaxy_speed",
                self.max_galaxy_speed,
                self.max_galaxy_speed.is_finite() && self.max_galaxy_speed >= 0.0,
                d.max_galaxy_speed,
            ),
            gravity: check("gravity", self.gravity, positive(self.gravity), d.gravity),
            live: self.live.validated(),
            ..self
        }
    }

    pub fn star_count(&self) -> u64 {
        self.galaxies as u64 * self.stars_per_galaxy as u64
    }
}

fn positive<F: Into<f64>>(value: F) -> bool {
    let value = value.into();
    value.is_finite() && value > 0.0
}

fn check<T: Debug>(name: &str, value: T, valid: bool, default: T) -> T {
    if valid {
        value
    } else {
        log::warn!("{name} = {value:?} is out of range, using {default:?}");
        default
    }
}
