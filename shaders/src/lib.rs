//! GPU programs for the galaxy renderer, and the uniform records that are
//! shared byte-for-byte between the host and the WGSL side.
//!
//! Every record here is `#[repr(C)]` and padded to a multiple of 16 bytes so
//! it can be bound as a uniform buffer without further layout work.

use bytemuck::{Pod, Zeroable};

/// Per-texel star integration kernel.
pub const STAR_UPDATE: &str = include_str!("star_update.wgsl");
/// Instanced star sprites.
pub const STARS: &str = include_str!("stars.wgsl");
/// Animated black hole sprites.
pub const BLACK_HOLES: &str = include_str!("black_holes.wgsl");
/// Full-screen quad used for trails.
pub const FADE: &str = include_str!("fade.wgsl");
/// Full-screen composite from the accumulation target.
pub const TONE_MAP: &str = include_str!("tone_map.wgsl");

/// Edge length of the square workgroup in `step_stars`.
pub const STEP_WORKGROUP_SIZE: u32 = 8;

/// `1 - exp(-color * exposure)`
pub const TONE_MAP_EXPONENTIAL: u32 = 0;
/// `color * exposure`
pub const TONE_MAP_LINEAR: u32 = 1;
/// `color`
pub const TONE_MAP_PASSTHROUGH: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct StepUniforms {
    pub speed: f32,
    pub gravity: f32,
    pub min_separation: f32,
    pub black_hole_count: u32,
    pub resolution: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct StarUniforms {
    pub mvp: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub star_size: f32,
    pub intensity: f32,
    pub resolution: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct BlackHoleUniforms {
    pub mvp: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub sprite_size: f32,
    pub frame: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct FadeUniforms {
    /// Background rgb, alpha is the per-frame fade amount.
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct ToneMapUniforms {
    pub exposure: f32,
    pub mode: u32,
    pub _pad: [u32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_records_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<StepUniforms>(), 32);
        assert_eq!(std::mem::size_of::<StarUniforms>(), 96);
        assert_eq!(std::mem::size_of::<BlackHoleUniforms>(), 80);
        assert_eq!(std::mem::size_of::<FadeUniforms>(), 16);
        assert_eq!(std::mem::size_of::<ToneMapUniforms>(), 16);
    }

    #[test]
    fn sources_expose_entry_points() {
        assert!(STAR_UPDATE.contains("fn step_stars"));
        assert!(STAR_UPDATE.contains(&format!(
            "@workgroup_size({STEP_WORKGROUP_SIZE}, {STEP_WORKGROUP_SIZE}, 1)"
        )));
        assert!(STARS.contains("fn star_vs") && STARS.contains("fn star_fs"));
        assert!(BLACK_HOLES.contains("fn black_hole_vs") && BLACK_HOLES.contains("fn black_hole_fs"));
        assert!(FADE.contains("fn fade_fs"));
        assert!(TONE_MAP.contains("fn tone_map_fs"));
    }
}
