use std::ops::Range;

use shaders::StarUniforms;
use wgpu::{
    BindGroup, BlendComponent, BlendFactor, BlendState, Buffer, BufferUsages,
    Device, PipelineCompilationOptions, PipelineLayoutDescriptor, Queue, RenderPass,
    RenderPipeline, RenderPipelineDescriptor, TextureFormat, util::DeviceExt,
};

use crate::{
    constants::ACCUMULATION_FORMAT,
    error::Result,
    kernel::StarKernel,
    render::{create_shader, sampler_entry, storage_entry, texture_entry, uniform_entry},
    sim::genesis::galaxy_of,
    sprites::SpriteSet,
    surface::GpuContext,
};

/// Per-instance vertex: the index of the star to draw.
fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Uint32];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<u32>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}

/// Upload a list of star indices as an instance buffer.
pub(crate) fn index_buffer(device: &Device, label: &str, indices: &[u32]) -> Buffer {
    // Zero-sized vertex buffers cannot be bound.
    let contents: &[u32] = if indices.is_empty() { &[0] } else { indices };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: BufferUsages::VERTEX,
    })
}

/// Instanced star sprites into the accumulation target.
pub(crate) struct StarDrawPipeline {
    additive: RenderPipeline,
    blended: RenderPipeline,
    uniforms: Buffer,
    /// `[front slot][galaxy]`
    bind_groups: [Vec<BindGroup>; 2],
    all_stars: Buffer,
    all_runs: Vec<(usize, Range<u32>)>,
    stars_per_galaxy: u32,
}

impl StarDrawPipeline {
    pub fn new(
        ctx: &GpuContext,
        kernel: &dyn StarKernel,
        sprite_coords: &[[f32; 2]],
        sprites: &SpriteSet,
        sprite_offset: usize,
        galaxies: u32,
    ) -> Result<Self> {
        let device = &ctx.device;
        let grid = kernel.grid();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("star layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                texture_entry(1, wgpu::ShaderStages::VERTEX, false),
                storage_entry(2, wgpu::ShaderStages::VERTEX),
                texture_entry(3, wgpu::ShaderStages::VERTEX, true),
                sampler_entry(4, wgpu::ShaderStages::VERTEX),
            ],
        });

        let shader = create_shader(ctx, "star shader", shaders::STARS)?;
        let (additive, blended) = ctx.validated("star pipeline", |device| {
            let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let additive = BlendState {
                color: BlendComponent {
                    src_factor: BlendFactor::One,
                    dst_factor: BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: BlendComponent {
                    src_factor: BlendFactor::One,
                    dst_factor: BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            };
            (
                build(device, &pipeline_layout, &shader, ACCUMULATION_FORMAT, additive),
                build(
                    device,
                    &pipeline_layout,
                    &shader,
                    ACCUMULATION_FORMAT,
                    BlendState::ALPHA_BLENDING,
                ),
            )
        })?;

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("star uniforms"),
            size: std::mem::size_of::<StarUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let (bind_groups, all_stars) = ctx.validated("star buffers", |device| {
            let coords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sprite coords"),
                contents: bytemuck::cast_slice(sprite_coords),
                usage: BufferUsages::STORAGE,
            });
            let bind_group = |slot: usize, galaxy: u32| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("star bind group"),
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniforms.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(kernel.position_view(slot)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: coords.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(
                                &sprites.galaxy(sprite_offset + galaxy as usize).view,
                            ),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::Sampler(&sprites.sampler),
                        },
                    ],
                })
            };
            let bind_groups: [Vec<BindGroup>; 2] =
                [0, 1].map(|slot| (0..galaxies).map(|g| bind_group(slot, g)).collect());
            (bind_groups, index_buffer(device, "star instances", &grid.star_indices()))
        })?;

        let stars_per_galaxy = grid.stars() / galaxies.max(1);
        let all_runs = (0..galaxies)
            .map(|g| (g as usize, g * stars_per_galaxy..(g + 1) * stars_per_galaxy))
            .collect();

        Ok(Self {
            additive,
            blended,
            uniforms,
            bind_groups,
            all_stars,
            all_runs,
            stars_per_galaxy,
        })
    }

    pub fn write_uniforms(&self, queue: &Queue, uniforms: &StarUniforms) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));
    }

    fn galaxy_of(&self, index: u32) -> usize {
        galaxy_of(index, self.stars_per_galaxy) as usize
    }

    /// Draw every star, reading positions from state slot `front`.
    pub fn draw_all(&self, rpass: &mut RenderPass<'_>, front: usize, light: bool) {
        self.draw_indices(rpass, front, light, &self.all_stars, &self.all_runs);
    }

    /// Draw the stars listed in `instances`. `runs` splits the buffer into
    /// runs of one galaxy each, as produced by [`galaxy_runs`].
    pub fn draw_indices(
        &self,
        rpass: &mut RenderPass<'_>,
        front: usize,
        light: bool,
        instances: &Buffer,
        runs: &[(usize, Range<u32>)],
    ) {
        rpass.set_pipeline(if light { &self.blended } else { &self.additive });
        rpass.set_vertex_buffer(0, instances.slice(..));
        for (galaxy, range) in runs {
            if range.is_empty() {
                continue;
            }
            rpass.set_bind_group(0, &self.bind_groups[front][*galaxy], &[]);
            rpass.draw(0..6, range.clone());
        }
    }

    /// Split a sorted index list into per-galaxy runs.
    pub fn galaxy_runs(&self, sorted: &[u32]) -> Vec<(usize, Range<u32>)> {
        galaxy_runs(sorted, |index| self.galaxy_of(index))
    }
}

/// Split `sorted` into maximal runs of indices that `galaxy_of` maps to the
/// same galaxy. Ranges index into `sorted`.
pub fn galaxy_runs(sorted: &[u32], galaxy_of: impl Fn(u32) -> usize) -> Vec<(usize, Range<u32>)> {
    let mut runs: Vec<(usize, Range<u32>)> = Vec::new();
    for (position, &index) in sorted.iter().enumerate() {
        let galaxy = galaxy_of(index);
        let position = position as u32;
        if let Some((last, range)) = runs.last_mut() {
            if *last == galaxy {
                range.end = position + 1;
                continue;
            }
        }
        runs.push((galaxy, position..position + 1));
    }
    runs
}

fn build(
    device: &Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: TextureFormat,
    blend: BlendState,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("star pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("star_vs"),
            buffers: &[instance_layout()],
            compilation_options: PipelineCompilationOptions::default(),
        },
        cache: None,
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("star_fs"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_follow_galaxy_boundaries() {
        let sorted = [0, 3, 4, 9, 10, 11, 25];
        let runs = galaxy_runs(&sorted, |i| (i / 10) as usize);
        assert_eq!(runs, vec![(0, 0..4), (1, 4..6), (2, 6..7)]);
        assert!(galaxy_runs(&[], |i| i as usize).is_empty());
    }
}
