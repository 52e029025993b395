//! Full-screen passes: fading the previous frame for trails, and tone
//! mapping the accumulation target onto the output.

use shaders::{
    FadeUniforms, TONE_MAP_EXPONENTIAL, TONE_MAP_LINEAR, TONE_MAP_PASSTHROUGH, ToneMapUniforms,
};
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, BufferUsages, PipelineCompilationOptions,
    PipelineLayoutDescriptor, Queue, RenderPass, RenderPipeline, TextureFormat, TextureView,
};

use crate::{
    config::LiveOptions,
    constants::{ACCUMULATION_FORMAT, TRAIL_FADE_ALPHA},
    error::Result,
    render::{create_shader, sampler_entry, texture_entry, uniform_entry},
    surface::GpuContext,
};

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &BindGroupLayout,
    shader: &wgpu::ShaderModule,
    fragment_entry: &str,
    format: TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("fullscreen_vs"),
            buffers: &[],
            compilation_options: PipelineCompilationOptions::default(),
        },
        cache: None,
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        multiview: None,
    })
}

/// Blends the background color over the accumulation target at low alpha.
pub(crate) struct FadePipeline {
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    uniforms: Buffer,
}

impl FadePipeline {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let device = &ctx.device;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fade layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });
        let shader = create_shader(ctx, "fade shader", shaders::FADE)?;
        let pipeline = ctx.validated("fade pipeline", |device| {
            fullscreen_pipeline(
                device,
                "fade pipeline",
                &layout,
                &shader,
                "fade_fs",
                ACCUMULATION_FORMAT,
                Some(wgpu::BlendState::ALPHA_BLENDING),
            )
        })?;
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fade uniforms"),
            size: std::mem::size_of::<FadeUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fade bind group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        Ok(Self {
            pipeline,
            bind_group,
            uniforms,
        })
    }

    pub fn update(&self, queue: &Queue, live: &LiveOptions) {
        let [r, g, b] = live.background();
        queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&FadeUniforms {
                color: [r, g, b, TRAIL_FADE_ALPHA],
            }),
        );
    }

    pub fn draw(&self, rpass: &mut RenderPass<'_>) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}

/// Tone curve selected by the live options.
pub fn tone_map_uniforms(live: &LiveOptions) -> ToneMapUniforms {
    let mode = match (live.hdr, live.light_mode) {
        (false, _) => TONE_MAP_PASSTHROUGH,
        (true, false) => TONE_MAP_EXPONENTIAL,
        (true, true) => TONE_MAP_LINEAR,
    };
    ToneMapUniforms {
        exposure: live.hdr_exposure,
        mode,
        _pad: [0; 2],
    }
}

/// Samples the accumulation target into an output of `format`.
pub(crate) struct ToneMapPipeline {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    sampler: wgpu::Sampler,
    uniforms: Buffer,
}

impl ToneMapPipeline {
    pub fn new(ctx: &GpuContext, format: TextureFormat) -> Result<Self> {
        let device = &ctx.device;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tone map layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1, wgpu::ShaderStages::FRAGMENT, true),
                sampler_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let shader = create_shader(ctx, "tone map shader", shaders::TONE_MAP)?;
        let pipeline = ctx.validated("tone map pipeline", |device| {
            fullscreen_pipeline(
                device,
                "tone map pipeline",
                &layout,
                &shader,
                "tone_map_fs",
                format,
                None,
            )
        })?;
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tone map uniforms"),
            size: std::mem::size_of::<ToneMapUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            layout,
            sampler,
            uniforms,
        })
    }

    /// Bind group sampling `scene`. Must be rebuilt whenever the scene texture is.
    pub fn bind_scene(&self, device: &wgpu::Device, scene: &TextureView) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tone map bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(scene),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    pub fn update(&self, queue: &Queue, live: &LiveOptions) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&tone_map_uniforms(live)));
    }

    pub fn draw(&self, rpass: &mut RenderPass<'_>, scene: &BindGroup) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, scene, &[]);
        rpass.draw(0..3, 0..1);
    }
}
