//! Layout of star state in square 2D arrays, and the front/back pairing used
//! to step it.

use crate::error::{Result, UniverseError};

const SPRITE_COORD_BYTES: u64 = std::mem::size_of::<[f32; 2]>() as u64;

/// Maps star indices onto a square grid of texels.
///
/// Texels are stored row-major: star `i` lives at `(i % resolution, i / resolution)`.
/// The shaders use the same mapping, see `star_vs` in `stars.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarGrid {
    stars: u32,
    resolution: u32,
}

impl StarGrid {
    pub fn new(stars: u32) -> Self {
        Self {
            stars,
            resolution: ceil_sqrt(stars),
        }
    }

    /// Grid for `stars` stars, refusing layouts whose state textures or
    /// per-star buffers would not fit within `limits`. Sprite coords are the
    /// widest per-star buffer.
    pub fn checked(stars: u64, limits: &wgpu::Limits) -> Result<Self> {
        let max_dimension = limits.max_texture_dimension_2d;
        let too_large = |resolution: u64| UniverseError::GridTooLarge {
            stars,
            resolution,
            limit: max_dimension,
        };
        let count = u32::try_from(stars).map_err(|_| too_large((stars as f64).sqrt().ceil() as u64))?;
        let grid = Self::new(count);
        if grid.resolution > max_dimension {
            return Err(too_large(grid.resolution as u64));
        }

        let bytes = stars * SPRITE_COORD_BYTES;
        let limit = limits.max_buffer_size.min(limits.max_storage_buffer_binding_size as u64);
        if bytes > limit {
            return Err(UniverseError::BufferTooLarge {
                label: "sprite coords",
                stars,
                bytes,
                limit,
            });
        }
        Ok(grid)
    }

    /// Number of real stars. Texels past this are padding.
    pub fn stars(&self) -> u32 {
        self.stars
    }

    /// Side length of the grid.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn texel_count(&self) -> usize {
        self.resolution as usize * self.resolution as usize
    }

    pub fn texel_of(&self, index: u32) -> [u32; 2] {
        [index % self.resolution, index / self.resolution]
    }

    /// Indices of every real star, in order.
    pub fn star_indices(&self) -> Vec<u32> {
        (0..self.stars).collect()
    }
}

fn ceil_sqrt(n: u32) -> u32 {
    let n = n as u64;
    let mut root = (n as f64).sqrt() as u64;
    while root * root < n {
        root += 1;
    }
    while root > 0 && (root - 1) * (root - 1) >= n {
        root -= 1;
    }
    root as u32
}

/// Two copies of some state, exactly one readable (front) and one writable
/// (back) at a time.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    front: usize,
}

impl<T> DoubleBuffer<T> {
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [front, back],
            front: 0,
        }
    }

    /// Which slot is currently the front, 0 or 1.
    pub fn front_index(&self) -> usize {
        self.front
    }

    pub fn front(&self) -> &T {
        &self.slots[self.front]
    }

    /// Borrow the front for reading and the back for writing.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.front == 0 { (&*a, b) } else { (&*b, a) }
    }

    pub fn slot(&self, index: usize) -> &T {
        &self.slots[index]
    }

    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_is_ceil_sqrt() {
        assert_eq!(StarGrid::new(1).resolution(), 1);
        assert_eq!(StarGrid::new(4).resolution(), 2);
        assert_eq!(StarGrid::new(5).resolution(), 3);
        assert_eq!(StarGrid::new(1000).resolution(), 32);
        assert_eq!(StarGrid::new(1_000_000).resolution(), 1000);
        assert_eq!(StarGrid::new(1_000_001).resolution(), 1001);
    }

    #[test]
    fn checked_rejects_grids_beyond_device_limits() {
        let limits = wgpu::Limits::default();
        let grid = StarGrid::checked(1_000_000, &limits).expect("fits");
        assert_eq!(grid.resolution(), 1000);

        // 20M stars fit a 4473 wide texture but not the sprite coord binding.
        let err = StarGrid::checked(20_000_000, &limits).expect_err("coords too large");
        assert!(matches!(
            err,
            UniverseError::BufferTooLarge {
                label: "sprite coords",
                ..
            }
        ));

        let err = StarGrid::checked(u64::from(u32::MAX) + 1, &limits).expect_err("not a u32");
        assert!(matches!(err, UniverseError::GridTooLarge { .. }));

        let narrow = wgpu::Limits {
            max_texture_dimension_2d: 31,
            ..limits.clone()
        };
        let err = StarGrid::checked(1000, &narrow).expect_err("texture too wide");
        assert!(matches!(
            err,
            UniverseError::GridTooLarge {
                resolution: 32,
                limit: 31,
                ..
            }
        ));

        let small_buffers = wgpu::Limits {
            max_buffer_size: 7999,
            ..limits.clone()
        };
        let err = StarGrid::checked(1000, &small_buffers).expect_err("coords too large");
        assert!(matches!(
            err,
            UniverseError::BufferTooLarge {
                bytes: 8000,
                limit: 7999,
                ..
            }
        ));
    }

    #[test]
    fn texel_mapping_round_trips_for_every_texel() {
        let grid = StarGrid::new(1000);
        assert_eq!(grid.texel_count(), 1024);
        for index in 0..grid.texel_count() as u32 {
            let texel = grid.texel_of(index);
            assert!(texel[0] < grid.resolution() && texel[1] < grid.resolution());
            assert_eq!(texel[1] * grid.resolution() + texel[0], index);
        }
        assert_eq!(grid.texel_of(33), [1, 1]);
    }

    #[test]
    fn double_buffer_alternates() {
        let mut buffers = DoubleBuffer::new(vec![1], vec![2]);
        assert_eq!(buffers.front_index(), 0);
        {
            let (front, back) = buffers.split();
            back[0] = front[0] + 10;
        }
        buffers.swap();
        assert_eq!(buffers.front_index(), 1);
        assert_eq!(buffers.front(), &vec![11]);
        assert_eq!(buffers.slot(0), &vec![1]);

        let (front, back) = buffers.split();
        assert_eq!(front, &vec![11]);
        assert_eq!(back, &mut vec![1]);
        buffers.swap();
        assert_eq!(buffers.front_index(), 0);
    }
}
