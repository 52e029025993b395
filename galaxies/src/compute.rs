use shaders::{STEP_WORKGROUP_SIZE, StepUniforms};
use wgpu::{
    BindGroup, Buffer, BufferUsages, ComputePipeline, PipelineCompilationOptions, TextureView,
    util::DeviceExt,
};

use crate::{
    constants::STATE_FORMAT,
    error::Result,
    grid::{DoubleBuffer, StarGrid},
    kernel::StarKernel,
    render::{create_shader, storage_entry, uniform_entry},
    sim::{StarState, StepParams},
    surface::GpuContext,
};

/// Square `Rgba32Float` texture sized to `grid`, optionally filled with `data`.
pub(crate) fn state_texture(
    ctx: &GpuContext,
    label: &str,
    grid: StarGrid,
    data: Option<&[[f32; 4]]>,
    extra_usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    let descriptor = wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: grid.resolution(),
            height: grid.resolution(),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: STATE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | extra_usage,
        view_formats: &[],
    };
    match data {
        Some(data) => ctx.device.create_texture_with_data(
            &ctx.queue,
            &descriptor,
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(data),
        ),
        None => ctx.device.create_texture(&descriptor),
    }
}

struct StateSlot {
    position: wgpu::Texture,
    position_view: TextureView,
    velocity_view: TextureView,
}

impl StateSlot {
    fn new(ctx: &GpuContext, grid: StarGrid, state: Option<&StarState>) -> Self {
        let storage = wgpu::TextureUsages::STORAGE_BINDING;
        let position = state_texture(
            ctx,
            "star positions",
            grid,
            state.map(|s| s.positions.as_slice()),
            storage,
        );
        let velocity = state_texture(
            ctx,
            "star velocities",
            grid,
            state.map(|s| s.velocities.as_slice()),
            storage,
        );
        Self {
            position_view: position.create_view(&Default::default()),
            velocity_view: velocity.create_view(&Default::default()),
            position,
        }
    }
}

/// Stars stepped by the `step_stars` compute shader, ping-ponging between two
/// sets of storage textures.
pub struct GpuStars {
    grid: StarGrid,
    slots: DoubleBuffer<StateSlot>,
    pipeline: ComputePipeline,
    /// Indexed by the front slot: reads that slot, writes the other.
    bind_groups: [BindGroup; 2],
    uniforms: Buffer,
    black_holes: Buffer,
}

impl GpuStars {
    pub fn new(
        ctx: &GpuContext,
        grid: StarGrid,
        initial: &StarState,
        black_holes: usize,
    ) -> Result<Self> {
        let device = &ctx.device;
        let slots = DoubleBuffer::new(
            StateSlot::new(ctx, grid, Some(initial)),
            StateSlot::new(ctx, grid, None),
        );

        let read_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let write_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: STATE_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("star update layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_entry(1, wgpu::ShaderStages::COMPUTE),
                read_entry(2),
                read_entry(3),
                write_entry(4),
                write_entry(5),
            ],
        });

        let shader = create_shader(ctx, "star update shader", shaders::STAR_UPDATE)?;
        let pipeline = ctx.validated("star update pipeline", |device| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("star update pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("step_stars"),
                compilation_options: PipelineCompilationOptions::default(),
                cache: None,
            })
        })?;

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("step uniforms"),
            size: std::mem::size_of::<StepUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let holes = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("black hole positions"),
            contents: bytemuck::cast_slice(&vec![[0.0f32; 4]; black_holes.max(1)]),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
        });

        let bind_group = |front: usize| {
            let (read, write) = (slots.slot(front), slots.slot(1 - front));
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("star update bind group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: holes.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&read.position_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&read.velocity_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&write.position_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(&write.velocity_view),
                    },
                ],
            })
        };
        let bind_groups = [bind_group(0), bind_group(1)];

        Ok(Self {
            grid,
            slots,
            pipeline,
            bind_groups,
            uniforms,
            black_holes: holes,
        })
    }
}

impl StarKernel for GpuStars {
    fn grid(&self) -> StarGrid {
        self.grid
    }

    fn front_index(&self) -> usize {
        self.slots.front_index()
    }

    fn step(&mut self, ctx: &GpuContext, black_holes: &[[f32; 4]], params: &StepParams) {
        let resolution = self.grid.resolution();
        let uniforms = StepUniforms {
            speed: params.speed,
            gravity: params.gravity,
            min_separation: params.min_separation,
            black_hole_count: black_holes.len() as u32,
            resolution,
            _pad: [0; 3],
        };
        ctx.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
        ctx.queue
            .write_buffer(&self.black_holes, 0, bytemuck::cast_slice(black_holes));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("star update encoder"),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("star update"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(0, &self.bind_groups[self.slots.front_index()], &[]);
            let groups = resolution.div_ceil(STEP_WORKGROUP_SIZE);
            cpass.dispatch_workgroups(groups, groups, 1);
        }
        ctx.queue.submit(Some(encoder.finish()));
        self.slots.swap();
    }

    fn position_view(&self, slot: usize) -> &TextureView {
        &self.slots.slot(slot).position_view
    }

    fn read_positions(&self, ctx: &GpuContext) -> Result<Vec<[f32; 4]>> {
        let bytes = ctx.read_texture(&self.slots.front().position, 16)?;
        Ok(bytes
            .chunks_exact(std::mem::size_of::<[f32; 4]>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::SimulationConfig,
        kernel::CpuStars,
        sim::genesis::genesis,
    };

    #[test]
    fn gpu_and_cpu_kernels_agree() {
        let Ok(ctx) = GpuContext::headless() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let config = SimulationConfig {
            galaxies: 2,
            stars_per_galaxy: 150,
            ..SimulationConfig::default()
        };
        let grid = StarGrid::new(300);
        let g = genesis(&config, grid, &mut StdRng::seed_from_u64(11));

        let mut gpu = GpuStars::new(&ctx, grid, &g.stars, 2).expect("gpu kernel");
        let mut cpu = CpuStars::new(&ctx, grid, g.stars.clone()).expect("cpu kernel");
        let mut holes = g.black_holes.clone();
        let params = StepParams::new(1.0, config.gravity);

        for _ in 0..5 {
            holes.step(config.gravity, 1.0);
            gpu.step(&ctx, &holes.positions(), &params);
            cpu.step(&ctx, &holes.positions(), &params);
        }
        assert_eq!(gpu.front_index(), 1);

        let from_gpu = gpu.read_positions(&ctx).expect("readback");
        let from_cpu = cpu.read_positions(&ctx).expect("readback");
        assert_eq!(from_gpu.len(), grid.texel_count());
        for (index, (a, b)) in from_gpu.iter().zip(&from_cpu).enumerate() {
            for axis in 0..3 {
                let tolerance = 1e-3 * b[axis].abs().max(1.0);
                assert!(
                    (a[axis] - b[axis]).abs() <= tolerance,
                    "texel {index}: {a:?} vs {b:?}"
                );
            }
        }
    }
}
