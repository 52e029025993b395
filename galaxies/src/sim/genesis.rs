//! Initial conditions: black holes scattered in a cube, each carrying a thin
//! disc of stars in circular orbit around it.

use std::f64::consts::TAU;

use cgmath::{Matrix3, Rad, Vector3};
use rand::Rng;

use crate::{
    config::SimulationConfig,
    constants::{GALAXY_SPRITES, MIN_STAR_DISTANCE_FRACTION},
    grid::StarGrid,
    sim::{BlackHole, BlackHoles, StarState},
};

pub struct Genesis {
    pub grid: StarGrid,
    pub black_holes: BlackHoles,
    /// Sized to the full grid, padding texels zero.
    pub stars: StarState,
    /// Sprite lookup per real star: the star's starting disc position mapped to `[0, 1]^2`.
    pub sprite_coords: Vec<[f32; 2]>,
    /// Galaxy sprite of the first galaxy. Galaxy `g` uses sprite `sprite_offset + g`.
    pub sprite_offset: usize,
}

/// Galaxy that star `index` was born in.
pub fn galaxy_of(index: u32, stars_per_galaxy: u32) -> u32 {
    index / stars_per_galaxy.max(1)
}

fn random_orientation<R: Rng + ?Sized>(rng: &mut R) -> Matrix3<f64> {
    let mut angle = || Rad(rng.random_range(0.0..TAU));
    Matrix3::from_angle_x(angle()) * Matrix3::from_angle_y(angle()) * Matrix3::from_angle_z(angle())
}

/// Build the starting state for `config`. Stars of galaxy `g` occupy indices
/// `g * stars_per_galaxy .. (g + 1) * stars_per_galaxy`.
pub fn genesis<R: Rng + ?Sized>(config: &SimulationConfig, grid: StarGrid, rng: &mut R) -> Genesis {
    debug_assert_eq!(grid.stars() as u64, config.star_count());

    let texels = grid.texel_count();
    let mut stars = StarState::zeroed(texels);
    let mut sprite_coords = Vec::with_capacity(grid.stars() as usize);
    let mut holes = Vec::with_capacity(config.galaxies as usize);
    let mut index = 0;
    let sprite_offset = rng.random_range(0..GALAXY_SPRITES);

    for _ in 0..config.galaxies {
        let hole = BlackHole::random(rng, config.bounds, config.max_galaxy_speed);
        let orientation = random_orientation(rng);

        for _ in 0..config.stars_per_galaxy {
            let fraction = rng.random_range(MIN_STAR_DISTANCE_FRACTION..1.0);
            let angle = rng.random_range(0.0..TAU);
            let (sin, cos) = angle.sin_cos();

            let orbital_speed = (config.gravity / (fraction * config.galaxy_radius)).sqrt();
            let disc = Vector3::new(fraction * cos, fraction * sin, 0.0);
            let tangent = Vector3::new(-sin, cos, 0.0);

            let pos = hole.pos + orientation * (disc * config.galaxy_radius);
            let vel = hole.vel + orientation * (tangent * orbital_speed);

            stars.positions[index] = [pos.x as f32, pos.y as f32, pos.z as f32, 0.0];
            stars.velocities[index] = [vel.x as f32, vel.y as f32, vel.z as f32, 0.0];
            sprite_coords.push([((disc.x + 1.0) / 2.0) as f32, ((disc.y + 1.0) / 2.0) as f32]);
            index += 1;
        }
        holes.push(hole);
    }

    Genesis {
        grid,
        black_holes: BlackHoles::new(holes),
        stars,
        sprite_coords,
        sprite_offset,
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, MetricSpace, Point3};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::sim::{StarField, StepParams};

    fn config(galaxies: u32, stars_per_galaxy: u32) -> SimulationConfig {
        SimulationConfig {
            galaxies,
            stars_per_galaxy,
            ..SimulationConfig::default()
        }
    }

    fn point(p: [f32; 4]) -> Point3<f64> {
        Point3::new(p[0] as f64, p[1] as f64, p[2] as f64)
    }

    fn vector(v: [f32; 4]) -> Vector3<f64> {
        Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64)
    }

    #[test]
    fn stars_start_on_their_disc_in_circular_orbit() {
        let config = config(3, 400);
        let grid = StarGrid::new(1200);
        let g = genesis(&config, grid, &mut StdRng::seed_from_u64(1));
        let radius = config.galaxy_radius;

        for index in 0..grid.stars() {
            let hole = &g.black_holes.as_slice()[galaxy_of(index, 400) as usize];
            let rel = point(g.stars.positions[index as usize]) - hole.pos;
            let dist = rel.magnitude();
            assert!(
                dist >= MIN_STAR_DISTANCE_FRACTION * radius - 1e-2 && dist <= radius + 1e-2,
                "star {index} at {dist}"
            );

            let rel_vel = vector(g.stars.velocities[index as usize]) - hole.vel;
            let expected = (config.gravity / dist).sqrt();
            assert!((rel_vel.magnitude() - expected).abs() / expected < 1e-3);
            // Tangential: no radial component.
            assert!(rel_vel.normalize().dot(rel.normalize()).abs() < 1e-3);

            let [u, v] = g.sprite_coords[index as usize];
            assert!((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn padding_texels_are_zero() {
        let config = config(1, 10);
        let grid = StarGrid::new(10);
        let g = genesis(&config, grid, &mut StdRng::seed_from_u64(2));
        assert_eq!(grid.texel_count(), 16);
        assert_eq!(g.sprite_coords.len(), 10);
        for texel in 10..16 {
            assert_eq!(g.stars.positions[texel], [0.0; 4]);
            assert_eq!(g.stars.velocities[texel], [0.0; 4]);
        }
    }

    #[test]
    fn seeded_genesis_is_reproducible() {
        let config = config(2, 50);
        let grid = StarGrid::new(100);
        let a = genesis(&config, grid, &mut StdRng::seed_from_u64(9));
        let b = genesis(&config, grid, &mut StdRng::seed_from_u64(9));
        assert_eq!(a.stars, b.stars);
        assert_eq!(a.black_holes.as_slice(), b.black_holes.as_slice());
    }

    #[test]
    fn lone_galaxy_stays_bound() {
        let config = SimulationConfig {
            galaxies: 1,
            stars_per_galaxy: 1000,
            bounds: 500.0,
            ..SimulationConfig::default()
        };
        let grid = StarGrid::new(1000);
        let g = genesis(&config, grid, &mut StdRng::seed_from_u64(3));
        let mut holes = g.black_holes.clone();
        let mut field = StarField::new(grid, g.stars).expect("thread pool");
        let params = StepParams::new(config.live.speed, config.gravity);

        for _ in 0..100 {
            holes.step(config.gravity, config.live.speed as f64);
            field.step(&holes.positions(), &params);
        }

        let hole = holes.as_slice()[0].pos;
        for index in 0..grid.stars() as usize {
            let p = point(field.front().positions[index]);
            assert!(p.distance(hole) < 5000.0, "star {index} escaped to {p:?}");
        }
    }
}
