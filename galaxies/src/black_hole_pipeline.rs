use shaders::BlackHoleUniforms;
use wgpu::{
    BindGroup, Buffer, BufferUsages, PipelineCompilationOptions, PipelineLayoutDescriptor, Queue,
    RenderPass, RenderPipeline, RenderPipelineDescriptor, TextureFormat,
};

use crate::{
    error::Result,
    render::{create_shader, sampler_entry, texture_entry, uniform_entry},
    sprites::SpriteSet,
    surface::GpuContext,
};

/// Animated sprites at each black hole, drawn over the composited frame.
pub(crate) struct BlackHoleDrawPipeline {
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    uniforms: Buffer,
    instances: Buffer,
    count: u32,
}

impl BlackHoleDrawPipeline {
    pub fn new(
        ctx: &GpuContext,
        texture_format: TextureFormat,
        sprites: &SpriteSet,
        black_holes: u32,
    ) -> Result<Self> {
        let device = &ctx.device;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("black hole layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                texture_entry(1, wgpu::ShaderStages::FRAGMENT, true),
                sampler_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let shader_module = create_shader(ctx, "black hole shader", shaders::BLACK_HOLES)?;
        let pipeline = ctx.validated("black hole pipeline", |device| {
            let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            const ATTRIBUTES: [wgpu::VertexAttribute; 1] =
                wgpu::vertex_attr_array![0 => Float32x4];

            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("black hole pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader_module,
                    entry_point: Some("black_hole_vs"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 4]>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &ATTRIBUTES,
                    }],
                    compilation_options: Default::default(),
                },
                cache: None,
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader_module,
                    entry_point: Some("black_hole_fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: texture_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                multiview: None,
            })
        })?;

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("black hole uniforms"),
            size: std::mem::size_of::<BlackHoleUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("black hole instances"),
            size: (std::mem::size_of::<[f32; 4]>() as u64) * black_holes.max(1) as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("black hole bind group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&sprites.black_hole.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sprites.sampler),
                },
            ],
        });

        Ok(Self {
            pipeline,
            bind_group,
            uniforms,
            instances,
            count: black_holes,
        })
    }

    pub fn update(&self, queue: &Queue, uniforms: &BlackHoleUniforms, positions: &[[f32; 4]]) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));
        queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(positions));
    }

    pub fn draw(&self, rpass: &mut RenderPass<'_>) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_vertex_buffer(0, self.instances.slice(..));
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.draw(0..6, 0..self.count);
    }
}
