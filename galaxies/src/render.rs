use std::time::Instant;

use shaders::{BlackHoleUniforms, StarUniforms};
use wgpu::{BindGroup, BindGroupLayoutEntry, CommandEncoder, ShaderStages, TextureView};

use crate::{
    black_hole_pipeline::BlackHoleDrawPipeline,
    config::LiveOptions,
    constants::{
        ACCUMULATION_FORMAT, BLACK_HOLE_FRAME_MILLIS, BLACK_HOLE_FRAMES, BLACK_HOLE_SPRITE_SIZE,
    },
    error::Result,
    kernel::StarKernel,
    post::{FadePipeline, ToneMapPipeline},
    sprites::SpriteSet,
    star_pipeline::StarDrawPipeline,
    surface::GpuContext,
};

pub(crate) fn create_shader(
    ctx: &GpuContext,
    label: &'static str,
    source: &'static str,
) -> Result<wgpu::ShaderModule> {
    ctx.validated(label, |device| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })
}

pub(crate) fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn storage_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn texture_entry(
    binding: u32,
    visibility: ShaderStages,
    filterable: bool,
) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Floating point color target the star pass accumulates into.
pub(crate) struct Accumulation {
    pub texture: wgpu::Texture,
    pub view: TextureView,
}

impl Accumulation {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("accumulation target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ACCUMULATION_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}

pub(crate) fn clear_color(live: &LiveOptions) -> wgpu::Color {
    let [r, g, b] = live.background();
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: 1.0,
    }
}

pub(crate) fn star_uniforms(
    mvp: [[f32; 4]; 4],
    viewport: (u32, u32),
    live: &LiveOptions,
    resolution: u32,
) -> StarUniforms {
    StarUniforms {
        mvp,
        viewport: [viewport.0 as f32, viewport.1 as f32],
        star_size: live.star_size,
        intensity: live.star_intensity,
        resolution,
        _pad: [0; 3],
    }
}

/// Animation frame of the black hole sprite `elapsed_ms` after start.
pub fn black_hole_frame(elapsed_ms: u128) -> u32 {
    ((elapsed_ms / BLACK_HOLE_FRAME_MILLIS) % BLACK_HOLE_FRAMES as u128) as u32
}

/// Stars into the accumulation target, then tone mapped onto the output.
pub(crate) struct Renderer {
    size: (u32, u32),
    accumulation: Accumulation,
    /// Set until the accumulation target has been cleared once, so trails
    /// never fade in from uninitialized contents.
    fresh: bool,
    stars: StarDrawPipeline,
    fade: FadePipeline,
    tone_map: ToneMapPipeline,
    scene: BindGroup,
    black_holes: BlackHoleDrawPipeline,
    started: Instant,
}

impl Renderer {
    pub fn new(
        ctx: &GpuContext,
        output_format: wgpu::TextureFormat,
        size: (u32, u32),
        kernel: &dyn StarKernel,
        sprite_coords: &[[f32; 2]],
        sprites: &SpriteSet,
        sprite_offset: usize,
        galaxies: u32,
    ) -> Result<Self> {
        let accumulation = Accumulation::new(&ctx.device, size.0, size.1);
        let stars =
            StarDrawPipeline::new(ctx, kernel, sprite_coords, sprites, sprite_offset, galaxies)?;
        let fade = FadePipeline::new(ctx)?;
        let tone_map = ToneMapPipeline::new(ctx, output_format)?;
        let scene = tone_map.bind_scene(&ctx.device, &accumulation.view);
        let black_holes = BlackHoleDrawPipeline::new(ctx, output_format, sprites, galaxies)?;

        Ok(Self {
            size,
            accumulation,
            fresh: true,
            stars,
            fade,
            tone_map,
            scene,
            black_holes,
            started: Instant::now(),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn stars(&self) -> &StarDrawPipeline {
        &self.stars
    }

    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == self.accumulation.size() {
            return;
        }
        self.size = (width, height);
        self.accumulation = Accumulation::new(&ctx.device, width, height);
        self.scene = self.tone_map.bind_scene(&ctx.device, &self.accumulation.view);
        self.fresh = true;
    }

    /// Render one frame into `target`.
    pub fn draw(
        &mut self,
        ctx: &GpuContext,
        target: &TextureView,
        front: usize,
        mvp: [[f32; 4]; 4],
        live: &LiveOptions,
        resolution: u32,
        black_holes: &[[f32; 4]],
    ) {
        self.stars
            .write_uniforms(&ctx.queue, &star_uniforms(mvp, self.size, live, resolution));
        self.fade.update(&ctx.queue, live);
        self.tone_map.update(&ctx.queue, live);
        if live.show_black_holes {
            let frame = black_hole_frame(self.started.elapsed().as_millis());
            self.black_holes.update(
                &ctx.queue,
                &BlackHoleUniforms {
                    mvp,
                    viewport: [self.size.0 as f32, self.size.1 as f32],
                    sprite_size: BLACK_HOLE_SPRITE_SIZE,
                    frame,
                },
                black_holes,
            );
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        self.accumulate(&mut encoder, front, live);
        self.composite(&mut encoder, target, live);
        ctx.queue.submit(Some(encoder.finish()));
    }

    fn accumulate(&mut self, encoder: &mut CommandEncoder, front: usize, live: &LiveOptions) {
        let trails = live.blur && !self.fresh;
        let load = if trails {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(clear_color(live))
        };
        self.fresh = false;

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("star accumulation"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.accumulation.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        if trails {
            self.fade.draw(&mut rpass);
        }
        self.stars.draw_all(&mut rpass, front, live.light_mode);
    }

    fn composite(&self, encoder: &mut CommandEncoder, target: &TextureView, live: &LiveOptions) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color(live)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        self.tone_map.draw(&mut rpass, &self.scene);
        if live.show_black_holes {
            self.black_holes.draw(&mut rpass);
        }
    }
}
