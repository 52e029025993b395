use std::f32::consts::TAU;

use image::{Rgba, RgbaImage};
use wgpu::util::DeviceExt;

use crate::constants::{BLACK_HOLE_FRAMES, GALAXY_SPRITES};

pub const GALAXY_SPRITE_SIZE: u32 = 256;
pub const BLACK_HOLE_FRAME_SIZE: u32 = 64;
/// Cells per side of the black hole atlas.
pub const BLACK_HOLE_ATLAS_CELLS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GalaxyStyle {
    /// Two loose arms around a warm core.
    Spiral { arms: f32, twist: f32 },
    /// Plain radial falloff, no arm structure.
    Elliptical,
}

impl GalaxyStyle {
    pub const ALL: [GalaxyStyle; GALAXY_SPRITES] = [
        GalaxyStyle::Spiral {
            arms: 2.0,
            twist: 4.0,
        },
        GalaxyStyle::Spiral {
            arms: 3.0,
            twist: 6.5,
        },
        GalaxyStyle::Elliptical,
    ];
}

pub struct Sprite {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Galaxy color sprites and the animated black hole atlas.
pub struct SpriteSet {
    pub galaxies: Vec<Sprite>,
    pub black_hole: Sprite,
    pub sampler: wgpu::Sampler,
}

impl SpriteSet {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let galaxies = GalaxyStyle::ALL
            .iter()
            .map(|style| {
                upload(
                    device,
                    queue,
                    "galaxy sprite",
                    &galaxy_image(*style, GALAXY_SPRITE_SIZE),
                )
            })
            .collect();
        let black_hole = upload(
            device,
            queue,
            "black hole atlas",
            &black_hole_atlas(BLACK_HOLE_FRAME_SIZE),
        );
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            galaxies,
            black_hole,
            sampler,
        }
    }

    /// Sprite for the galaxy with index `galaxy`, cycling through the set.
    pub fn galaxy(&self, galaxy: usize) -> &Sprite {
        &self.galaxies[galaxy % self.galaxies.len()]
    }
}

fn upload(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, image: &RgbaImage) -> Sprite {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        image.as_raw(),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Sprite { texture, view }
}

fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

fn to_rgba(color: [f32; 3], alpha: f32) -> Rgba<u8> {
    let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([byte(color[0]), byte(color[1]), byte(color[2]), byte(alpha)])
}

/// Map pixel `(x, y)` of a `size` square onto `[-1, 1]`.
fn centered(x: u32, y: u32, size: u32) -> (f32, f32) {
    let s = size as f32;
    (
        (x as f32 + 0.5) / s * 2.0 - 1.0,
        (y as f32 + 0.5) / s * 2.0 - 1.0,
    )
}

/// Square color image of a face-on galaxy. Stars sample it at their
/// starting disc position, so the sprite decides how each galaxy is tinted.
pub fn galaxy_image(style: GalaxyStyle, size: u32) -> RgbaImage {
    const CORE: [f32; 3] = [1.0, 0.86, 0.62];
    const RIM: [f32; 3] = [0.55, 0.7, 1.0];

    RgbaImage::from_fn(size, size, |x, y| {
        let (u, v) = centered(x, y, size);
        let r = (u * u + v * v).sqrt();
        if r > 1.0 {
            return Rgba([0, 0, 0, 0]);
        }
        let core = (-r * 6.0).exp();
        let structure = match style {
            GalaxyStyle::Spiral { arms, twist } => {
                let phase = arms * v.atan2(u) - twist * (r + 0.05).ln();
                (0.5 + 0.5 * phase.cos()).powi(3) * (1.0 - r) * 0.8
            }
            GalaxyStyle::Elliptical => (1.0 - r).powi(2) * 0.6,
        };
        let brightness = core + structure + 0.08 * (1.0 - r);
        let color = mix(CORE, RIM, r.sqrt());
        to_rgba(
            [
                color[0] * brightness.min(1.0) + 0.15,
                color[1] * brightness.min(1.0) + 0.15,
                color[2] * brightness.min(1.0) + 0.15,
            ],
            brightness,
        )
    })
}

/// 8x8 atlas of an accretion disc rotating once over the animation. The
/// shadow in the middle is opaque black.
pub fn black_hole_atlas(frame_size: u32) -> RgbaImage {
    const DISC: [f32; 3] = [1.0, 0.7, 0.35];
    let side = frame_size * BLACK_HOLE_ATLAS_CELLS;

    RgbaImage::from_fn(side, side, |x, y| {
        let frame = (y / frame_size) * BLACK_HOLE_ATLAS_CELLS + x / frame_size;
        let turn = (frame % BLACK_HOLE_FRAMES) as f32 / BLACK_HOLE_FRAMES as f32 * TAU;
        let (u, v) = centered(x % frame_size, y % frame_size, frame_size);
        let r = (u * u + v * v).sqrt();

        if r < 0.42 {
            return Rgba([0, 0, 0, 255]);
        }
        if r > 1.0 {
            return Rgba([0, 0, 0, 0]);
        }
        let ring = (-((r - 0.6) / 0.15).powi(2)).exp();
        let doppler = 0.6 + 0.4 * (v.atan2(u) - turn).cos();
        let glow = ring * doppler;
        to_rgba(
            [DISC[0] * glow * 1.4, DISC[1] * glow * 1.4, DISC[2] * glow * 1.4],
            glow * 1.5,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn galaxy_sprite_is_transparent_outside_the_disc() {
        let image = galaxy_image(GalaxyStyle::ALL[0], 64);
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(image.get_pixel(63, 63)[3], 0);
        assert!(image.get_pixel(32, 32)[3] > 200);
    }

    #[test]
    fn black_hole_frames_differ() {
        let atlas = black_hole_atlas(32);
        assert_eq!(atlas.width(), 32 * BLACK_HOLE_ATLAS_CELLS);
        // Same pixel on the disc in frames 0 and 15 (a quarter turn later).
        let first = *atlas.get_pixel(16 + 10, 16);
        let later = *atlas.get_pixel(7 * 32 + 16 + 10, 32 + 16);
        assert_ne!(first, later);
        // Shadow is opaque black in every frame.
        assert_eq!(*atlas.get_pixel(5 * 32 + 16, 3 * 32 + 16), Rgba([0, 0, 0, 255]));
    }
}
