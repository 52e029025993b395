use std::sync::{Arc, OnceLock};

use pollster::FutureExt;
use wgpu::{Adapter, Device, Instance, Queue, Surface, SurfaceConfiguration};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    error::{Result, UniverseError},
    sprites::SpriteSet,
};

/// Device, queue and the resources shared by every universe built on them.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
    sprites: OnceLock<Arc<SpriteSet>>,
}

impl GpuContext {
    pub async fn new(instance: Instance, compatible_surface: Option<&Surface<'_>>) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("galaxies device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let info = adapter.get_info();
        log::info!("using {} ({:?})", info.name, info.backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            sprites: OnceLock::new(),
        })
    }

    /// A context with no surface, for offscreen rendering and tests.
    pub fn headless() -> Result<Self> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        Self::new(instance, None).block_on()
    }

    /// Sprite textures, created on first use and shared for the lifetime of the context.
    pub fn sprites(&self) -> Arc<SpriteSet> {
        self.sprites
            .get_or_init(|| Arc::new(SpriteSet::new(&self.device, &self.queue)))
            .clone()
    }

    /// Block until every submitted command buffer has finished.
    pub fn wait_idle(&self) -> Result<()> {
        self.device.poll(wgpu::PollType::Wait)?;
        Ok(())
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Run `build` inside a validation error scope, so shader compile and
    /// pipeline link failures come back as errors instead of panics.
    pub fn validated<T>(&self, label: &'static str, build: impl FnOnce(&Device) -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match self.device.pop_error_scope().block_on() {
            Some(err) => Err(UniverseError::ResourceCreation {
                label,
                log: err.to_string(),
            }),
            None => Ok(value),
        }
    }

    /// Copy a whole 2D texture to the host, rows tightly packed.
    /// Stalls until the GPU has caught up.
    pub fn read_texture(&self, texture: &wgpu::Texture, bytes_per_texel: u32) -> Result<Vec<u8>> {
        let size = texture.size();
        let unpadded_bytes_per_row = size.width * bytes_per_texel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size: padded_bytes_per_row as u64 * size.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait)?;
        rx.block_on()
            .map_err(|_| UniverseError::Readback("map callback dropped".into()))?
            .map_err(|err| UniverseError::Readback(err.to_string()))?;

        let data = slice.get_mapped_range();
        let mut out = Vec::with_capacity((unpadded_bytes_per_row * size.height) as usize);
        for row in data.chunks_exact(padded_bytes_per_row as usize) {
            out.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(data);
        staging.unmap();

        Ok(out)
    }
}

pub struct SurfaceState {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
}

impl SurfaceState {
    pub fn configure(&self, device: &Device) {
        self.surface.configure(device, &self.config);
    }

    pub fn resize(&mut self, device: &Device, size: PhysicalSize<u32>) {
        if size.width != 0 && size.height != 0 {
            self.config.width = size.width;
            self.config.height = size.height;
            self.configure(device);
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
}

/// Create the context and a configured surface for `window`.
pub async fn get_surface(window: Arc<Window>) -> anyhow::Result<(GpuContext, SurfaceState)> {
    let instance = Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
    let surface = instance.create_surface(window.clone())?;
    let context = GpuContext::new(instance, Some(&surface)).await?;

    let size = window.inner_size();
    let mut config = surface
        .get_default_config(&context.adapter, size.width.max(1), size.height.max(1))
        .ok_or_else(|| anyhow::anyhow!("surface is not supported by the adapter"))?;
    config.present_mode = wgpu::PresentMode::AutoVsync;

    let state = SurfaceState {
        surface,
        config,
    };
    state.configure(&context.device);

    Ok((context, state))
}
