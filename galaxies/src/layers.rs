//! Depth-sliced still images. Stars are bucketed by their world `z` into
//! equal slabs across `[-bounds, bounds]`, and each slab is rendered alone.

use image::RgbaImage;
use wgpu::TextureView;

use crate::{
    config::LiveOptions,
    constants::LAYER_FORMAT,
    error::{Result, UniverseError},
    grid::StarGrid,
    post::ToneMapPipeline,
    render::{Accumulation, clear_color, star_uniforms},
    star_pipeline::{StarDrawPipeline, index_buffer},
    surface::GpuContext,
};

/// Slab that depth `z` falls into. Out-of-range depths clamp to the outer slabs.
pub fn layer_of(z: f32, bounds: f32, layers: u32) -> u32 {
    let slab = ((z + bounds) / (2.0 * bounds) * layers as f32).floor();
    // NaN lands in the first slab.
    (slab.max(0.0) as u32).min(layers.saturating_sub(1))
}

/// Star indices per slab, each list ascending. Padding texels are skipped.
pub fn partition(positions: &[[f32; 4]], grid: StarGrid, bounds: f32, layers: u32) -> Vec<Vec<u32>> {
    let mut buckets = vec![Vec::new(); layers as usize];
    if layers == 0 {
        return buckets;
    }
    for index in 0..grid.stars() {
        let z = positions[index as usize][2];
        buckets[layer_of(z, bounds, layers) as usize].push(index);
    }
    buckets
}

/// Renders stars into a target of a fixed size and reads the result back.
pub(crate) struct LayerExtractor {
    size: (u32, u32),
    accumulation: Accumulation,
    output: wgpu::Texture,
    output_view: TextureView,
    tone_map: ToneMapPipeline,
    scene: wgpu::BindGroup,
}

impl LayerExtractor {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Result<Self> {
        let (width, height) = (width.max(1), height.max(1));
        let accumulation = Accumulation::new(&ctx.device, width, height);
        let output = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("layer output"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LAYER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());
        let tone_map = ToneMapPipeline::new(ctx, LAYER_FORMAT)?;
        let scene = tone_map.bind_scene(&ctx.device, &accumulation.view);

        Ok(Self {
            size: (width, height),
            accumulation,
            output,
            output_view,
            tone_map,
            scene,
        })
    }

    /// One image per slab, nearest `-bounds` first.
    pub fn extract(
        &self,
        ctx: &GpuContext,
        stars: &StarDrawPipeline,
        positions: &[[f32; 4]],
        front: usize,
        grid: StarGrid,
        mvp: [[f32; 4]; 4],
        live: &LiveOptions,
        bounds: f32,
        layers: u32,
    ) -> Result<Vec<RgbaImage>> {
        let buckets = partition(positions, grid, bounds, layers);
        log::info!(
            "extracting {layers} layers: {:?} stars each",
            buckets.iter().map(Vec::len).collect::<Vec<_>>()
        );

        stars.write_uniforms(&ctx.queue, &star_uniforms(mvp, self.size, live, grid.resolution()));
        self.tone_map.update(&ctx.queue, live);

        buckets
            .iter()
            .map(|bucket| self.render(ctx, stars, front, bucket, live))
            .collect()
    }

    fn render(
        &self,
        ctx: &GpuContext,
        stars: &StarDrawPipeline,
        front: usize,
        bucket: &[u32],
        live: &LiveOptions,
    ) -> Result<RgbaImage> {
        let instances = index_buffer(&ctx.device, "layer instances", bucket);
        let runs = stars.galaxy_runs(bucket);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("layer encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("layer stars"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.accumulation.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(live)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            stars.draw_indices(&mut rpass, front, live.light_mode, &instances, &runs);
        }
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("layer tone map"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            self.tone_map.draw(&mut rpass, &self.scene);
        }
        ctx.queue.submit(Some(encoder.finish()));

        let pixels = ctx.read_texture(&self.output, 4)?;
        RgbaImage::from_raw(self.size.0, self.size.1, pixels)
            .ok_or_else(|| UniverseError::Readback("layer image has the wrong size".into()))
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn slabs_cover_bounds_evenly() {
        assert_eq!(layer_of(-500.0, 500.0, 4), 0);
        assert_eq!(layer_of(-250.1, 500.0, 4), 0);
        assert_eq!(layer_of(-250.0, 500.0, 4), 1);
        assert_eq!(layer_of(0.0, 500.0, 4), 2);
        assert_eq!(layer_of(499.9, 500.0, 4), 3);
        // Clamped at both ends.
        assert_eq!(layer_of(500.0, 500.0, 4), 3);
        assert_eq!(layer_of(9000.0, 500.0, 4), 3);
        assert_eq!(layer_of(-9000.0, 500.0, 4), 0);
        assert_eq!(layer_of(f32::NAN, 500.0, 4), 0);
        assert_eq!(layer_of(123.0, 500.0, 1), 0);
    }

    #[test]
    fn every_star_lands_in_exactly_one_layer() {
        let mut rng = StdRng::seed_from_u64(5);
        let grid = StarGrid::new(997);
        let positions: Vec<[f32; 4]> = (0..grid.texel_count())
            .map(|_| [0.0, 0.0, rng.random_range(-800.0..800.0), 0.0])
            .collect();

        for layers in [1, 2, 7, 16] {
            let buckets = partition(&positions, grid, 500.0, layers);
            assert_eq!(buckets.len(), layers as usize);

            let mut seen = vec![0u32; grid.stars() as usize];
            for (layer, bucket) in buckets.iter().enumerate() {
                assert!(bucket.windows(2).all(|w| w[0] < w[1]));
                for &index in bucket {
                    seen[index as usize] += 1;
                    let z = positions[index as usize][2];
                    assert_eq!(layer_of(z, 500.0, layers), layer as u32);
                }
            }
            assert!(seen.iter().all(|&count| count == 1));
        }
    }
}
