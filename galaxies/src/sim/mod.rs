use cgmath::{BaseFloat, EuclideanSpace, InnerSpace, Point3, Vector3, Zero};
use rand::Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    constants::{MAX_THREADS, MIN_SEPARATION, TEXELS_PER_THREAD},
    error::Result,
    grid::{DoubleBuffer, StarGrid},
};

mod direct;
pub mod genesis;

pub use direct::step_texels;

/// Acceleration towards a body at relative position `rel`.
///
/// Separations closer than `min_separation` are clamped, and a body exactly
/// on top of another feels nothing.
#[inline]
pub fn pull<S: BaseFloat>(rel: Vector3<S>, gravity: S, min_separation: S) -> Vector3<S> {
    let dist = rel.magnitude();
    if dist == S::zero() {
        return Vector3::zero();
    }
    let clamped = dist.max(min_separation);
    rel / dist * (gravity / (clamped * clamped))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlackHole {
    pub pos: Point3<f64>,
    pub vel: Vector3<f64>,
}

impl BlackHole {
    /// Uniformly placed in the cube of half extent `bounds`, with each
    /// velocity component uniform in `[-max_speed, max_speed]`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, bounds: f64, max_speed: f64) -> Self {
        let mut coord = |extent: f64| {
            if extent > 0.0 {
                rng.random_range(-extent..=extent)
            } else {
                0.0
            }
        };
        Self {
            pos: Point3::new(coord(bounds), coord(bounds), coord(bounds)),
            vel: Vector3::new(coord(max_speed), coord(max_speed), coord(max_speed)),
        }
    }

    #[inline]
    pub fn velocity_change_towards(&self, other: &BlackHole, gravity: f64, speed: f64) -> Vector3<f64> {
        pull(other.pos - self.pos, gravity, MIN_SEPARATION) * speed
    }
}

/// The galaxy cores. Only they attract anything; they attract each other
/// pairwise with equal and opposite velocity changes.
#[derive(Debug, Clone, Default)]
pub struct BlackHoles {
    holes: Vec<BlackHole>,
}

impl BlackHoles {
    pub fn new(holes: Vec<BlackHole>) -> Self {
        Self { holes }
    }

    pub fn as_slice(&self) -> &[BlackHole] {
        &self.holes
    }

    pub fn len(&self) -> usize {
        self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    /// One tick: update every unordered pair's velocities, then move every
    /// hole by its new velocity.
    pub fn step(&mut self, gravity: f64, speed: f64) {
        let n = self.holes.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let change = self.holes[i].velocity_change_towards(&self.holes[j], gravity, speed);
                self.holes[i].vel += change;
                self.holes[j].vel -= change;
            }
        }
        for hole in &mut self.holes {
            hole.pos += hole.vel * speed;
        }
    }

    /// Positions in the layout the GPU reads, `w` unused.
    pub fn positions(&self) -> Vec<[f32; 4]> {
        self.holes
            .iter()
            .map(|h| [h.pos.x as f32, h.pos.y as f32, h.pos.z as f32, 1.0])
            .collect()
    }

    /// Model translation that puts the black holes' centroid at the origin.
    pub fn negative_centroid(&self) -> Vector3<f64> {
        if self.holes.is_empty() {
            return Vector3::zero();
        }
        let sum = self
            .holes
            .iter()
            .fold(Vector3::zero(), |acc, h| acc + h.pos.to_vec());
        -sum / self.holes.len() as f64
    }
}

/// Per-texel star positions and velocities, `w` unused. Padding texels are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StarState {
    pub positions: Vec<[f32; 4]>,
    pub velocities: Vec<[f32; 4]>,
}

impl StarState {
    pub fn zeroed(texels: usize) -> Self {
        Self {
            positions: vec![[0.0; 4]; texels],
            velocities: vec![[0.0; 4]; texels],
        }
    }
}

/// Parameters of one star integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub speed: f32,
    pub gravity: f32,
    pub min_separation: f32,
}

impl StepParams {
    pub fn new(speed: f32, gravity: f64) -> Self {
        Self {
            speed,
            gravity: gravity as f32,
            min_separation: MIN_SEPARATION as f32,
        }
    }
}

fn compute_target_threads(texels: usize) -> usize {
    texels.div_ceil(TEXELS_PER_THREAD).clamp(1, MAX_THREADS)
}

/// Host-side star state, stepped on a dedicated rayon pool.
pub struct StarField {
    grid: StarGrid,
    buffers: DoubleBuffer<StarState>,
    pool: ThreadPool,
}

impl StarField {
    pub fn new(grid: StarGrid, initial: StarState) -> Result<Self> {
        let texels = grid.texel_count();
        debug_assert_eq!(initial.positions.len(), texels);
        let pool = ThreadPoolBuilder::new()
            .num_threads(compute_target_threads(texels))
            .build()?;

        Ok(Self {
            grid,
            buffers: DoubleBuffer::new(initial, StarState::zeroed(texels)),
            pool,
        })
    }

    pub fn grid(&self) -> StarGrid {
        self.grid
    }

    pub fn front(&self) -> &StarState {
        self.buffers.front()
    }

    pub fn front_index(&self) -> usize {
        self.buffers.front_index()
    }

    /// Read the front, write the back, then swap them.
    pub fn step(&mut self, black_holes: &[[f32; 4]], params: &StepParams) {
        let (front, back) = self.buffers.split();
        self.pool
            .install(|| step_texels(front, back, black_holes, params));
        self.buffers.swap();
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn pairwise_changes_are_equal_and_opposite() {
        let mut holes = BlackHoles::new(vec![
            BlackHole {
                pos: Point3::new(-30.0, 4.0, 2.0),
                vel: Vector3::new(0.5, 0.0, 0.0),
            },
            BlackHole {
                pos: Point3::new(25.0, -6.0, 1.0),
                vel: Vector3::new(0.0, -1.0, 0.25),
            },
        ]);
        let before = holes.clone();
        holes.step(5000.0, 1.0);

        let dv_a = holes.as_slice()[0].vel - before.as_slice()[0].vel;
        let dv_b = holes.as_slice()[1].vel - before.as_slice()[1].vel;
        assert!((dv_a + dv_b).magnitude() < 1e-12);
        // Attraction: A moves towards B.
        assert!(dv_a.x > 0.0);

        let expected = pull(
            before.as_slice()[1].pos - before.as_slice()[0].pos,
            5000.0,
            MIN_SEPARATION,
        );
        assert!((dv_a - expected).magnitude() < 1e-12);
    }

    #[test]
    fn coincident_holes_stay_finite() {
        let hole = BlackHole {
            pos: Point3::new(1.0, 2.0, 3.0),
            vel: Vector3::zero(),
        };
        let mut holes = BlackHoles::new(vec![hole.clone(), hole]);
        holes.step(5000.0, 1.0);
        for h in holes.as_slice() {
            assert_eq!(h.vel, Vector3::zero());
            assert!(h.pos.x.is_finite());
        }
    }

    #[test]
    fn close_approach_is_clamped() {
        let rel = Vector3::new(0.01_f64, 0.0, 0.0);
        let acc = pull(rel, 5000.0, 1.0);
        assert!((acc.x - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn random_holes_respect_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let hole = BlackHole::random(&mut rng, 500.0, 2.0);
            for c in [hole.pos.x, hole.pos.y, hole.pos.z] {
                assert!((-500.0..=500.0).contains(&c));
            }
            for c in [hole.vel.x, hole.vel.y, hole.vel.z] {
                assert!((-2.0..=2.0).contains(&c));
            }
        }
    }

    #[test]
    fn negative_centroid_averages_positions() {
        let holes = BlackHoles::new(vec![
            BlackHole {
                pos: Point3::new(10.0, 0.0, -4.0),
                vel: Vector3::zero(),
            },
            BlackHole {
                pos: Point3::new(-2.0, 6.0, 0.0),
                vel: Vector3::zero(),
            },
        ]);
        assert_eq!(holes.negative_centroid(), Vector3::new(-4.0, -3.0, 2.0));
        assert_eq!(BlackHoles::default().negative_centroid(), Vector3::zero());
    }

    #[test]
    fn star_field_alternates_buffers_and_moves_stars() {
        let grid = StarGrid::new(5);
        let mut initial = StarState::zeroed(grid.texel_count());
        for i in 0..grid.stars() as usize {
            initial.positions[i] = [10.0 + i as f32, -3.0, 2.0 * i as f32, 0.0];
        }
        let mut field = StarField::new(grid, initial.clone()).expect("pool");
        let holes = [[0.0, 0.0, 0.0, 0.0]];
        let params = StepParams::new(1.0, 5000.0);
        assert_eq!(field.front_index(), 0);

        field.step(&holes, &params);
        assert_eq!(field.front_index(), 1);
        let first = field.front().clone();
        for i in 0..grid.stars() as usize {
            assert_ne!(first.positions[i], initial.positions[i], "star {i}");
            assert_ne!(first.velocities[i], initial.velocities[i], "star {i}");
        }

        field.step(&holes, &params);
        assert_eq!(field.front_index(), 0);
        for i in 0..grid.stars() as usize {
            assert_ne!(field.front().positions[i], first.positions[i], "star {i}");
        }
    }

    #[test]
    fn thread_count_is_capped() {
        assert_eq!(compute_target_threads(1), 1);
        assert_eq!(compute_target_threads(TEXELS_PER_THREAD * 3), 3);
        assert_eq!(compute_target_threads(usize::MAX / 2), MAX_THREADS);
    }
}
