use std::sync::Arc;

use cgmath::Vector3;
use image::RgbaImage;
use rand::{SeedableRng, rngs::StdRng};
use wgpu::{TextureFormat, TextureView};

use crate::{
    camera::Camera,
    config::{LiveOptions, SimulationConfig},
    error::Result,
    grid::StarGrid,
    kernel::{StarKernel, create_kernel},
    layers::LayerExtractor,
    render::Renderer,
    sim::{BlackHoles, StepParams, genesis::genesis},
    surface::GpuContext,
};

/// One simulated universe and everything needed to draw it. Owns all of its
/// GPU resources apart from the shared sprite set.
pub struct Universe {
    ctx: Arc<GpuContext>,
    config: SimulationConfig,
    output_format: TextureFormat,
    black_holes: BlackHoles,
    kernel: Box<dyn StarKernel>,
    camera: Camera,
    renderer: Renderer,
    ticks: u64,
}

impl Universe {
    /// Build a universe drawing into targets of `output_format` and `size`.
    /// Out-of-range config fields fall back to their defaults.
    pub fn new(
        ctx: Arc<GpuContext>,
        config: SimulationConfig,
        output_format: TextureFormat,
        size: (u32, u32),
    ) -> Result<Self> {
        let config = config.validated();
        let size = (size.0.max(1), size.1.max(1));
        let grid = StarGrid::checked(config.star_count(), &ctx.limits())?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let initial = genesis(&config, grid, &mut rng);
        log::info!(
            "genesis: {} galaxies, {} stars on a {res}x{res} grid, {:?} kernel",
            config.galaxies,
            grid.stars(),
            config.kernel,
            res = grid.resolution(),
        );

        let kernel = create_kernel(
            &ctx,
            config.kernel,
            grid,
            initial.stars,
            initial.black_holes.len(),
        )?;
        let sprites = ctx.sprites();
        let renderer = Renderer::new(
            &ctx,
            output_format,
            size,
            kernel.as_ref(),
            &initial.sprite_coords,
            &sprites,
            initial.sprite_offset,
            config.galaxies,
        )?;

        let (width, height) = size;
        let camera = Camera::new(width as f32 / height as f32, config.bounds as f32);

        Ok(Self {
            ctx,
            config,
            output_format,
            black_holes: initial.black_holes,
            kernel,
            camera,
            renderer,
            ticks: 0,
        })
    }

    /// Replace this universe with a freshly generated one, from `config` or
    /// the current configuration. On failure the current universe is kept.
    pub fn rebuild(&mut self, config: Option<SimulationConfig>) -> Result<()> {
        let config = config.unwrap_or_else(|| self.config.clone());
        let next = Self::new(
            self.ctx.clone(),
            config,
            self.output_format,
            self.renderer.size(),
        )?;
        // In-flight work may still reference the old resources.
        self.ctx.wait_idle()?;
        *self = next;
        Ok(())
    }

    /// Advance the simulation one tick.
    pub fn update(&mut self) {
        let live = self.config.live;
        if live.auto_center && !self.camera.is_recentering() {
            let target = to_f32(self.black_holes.negative_centroid());
            if self.camera.drifted_from(target, self.config.bounds as f32) {
                log::debug!("black holes drifted out of view, recentering");
                self.camera.begin_recenter(target);
            }
        }

        self.black_holes.step(self.config.gravity, live.speed as f64);
        let positions = self.black_holes.positions();
        let params = StepParams::new(live.speed, self.config.gravity);
        self.kernel.step(&self.ctx, &positions, &params);

        self.camera.advance();
        self.ticks += 1;
        log::trace!("tick {} (front slot {})", self.ticks, self.kernel.front_index());
    }

    /// Advance only the view animation, for frames where the simulation is paused.
    pub fn animate_view(&mut self) {
        self.camera.advance();
    }

    /// Render the current state into `target`, which must be of the output
    /// format and current display size.
    pub fn draw(&mut self, target: &TextureView) {
        let mvp = self.camera.matrix().into();
        self.renderer.draw(
            &self.ctx,
            target,
            self.kernel.front_index(),
            mvp,
            &self.config.live,
            self.kernel.grid().resolution(),
            &self.black_holes.positions(),
        );
    }

    pub fn rotate_view(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.camera.rotate(delta_yaw, delta_pitch);
    }

    /// Center the view on the black holes' centroid, easing there if `animate`.
    pub fn recenter(&mut self, animate: bool) {
        let target = to_f32(self.black_holes.negative_centroid());
        log::debug!("recentering on {target:?}, animated: {animate}");
        if animate {
            self.camera.begin_recenter(target);
        } else {
            self.camera.jump_to(target);
        }
    }

    pub fn display_resized(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
        self.renderer.resize(&self.ctx, width, height);
    }

    /// Render `layers` depth slices at the display size. Stalls on a GPU
    /// readback of every star position.
    pub fn draw_layers(&mut self, layers: u32) -> Result<Vec<RgbaImage>> {
        if layers == 0 {
            return Ok(Vec::new());
        }
        let positions = self.kernel.read_positions(&self.ctx)?;
        let (width, height) = self.renderer.size();
        let extractor = LayerExtractor::new(&self.ctx, width, height)?;
        extractor.extract(
            &self.ctx,
            self.renderer.stars(),
            &positions,
            self.kernel.front_index(),
            self.kernel.grid(),
            self.camera.matrix().into(),
            &self.config.live,
            self.config.bounds as f32,
            layers,
        )
    }

    /// Apply visual and speed options from the next tick or frame on.
    pub fn set_options(&mut self, live: LiveOptions) {
        self.config.live = live.validated();
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn black_holes(&self) -> &BlackHoles {
        &self.black_holes
    }

    pub fn front_index(&self) -> usize {
        self.kernel.front_index()
    }

    pub fn view_center(&self) -> Vector3<f32> {
        self.camera.center()
    }

    pub fn is_recentering(&self) -> bool {
        self.camera.is_recentering()
    }

    /// Current star positions, padding texels included. Stalls like [`Self::draw_layers`].
    pub fn read_positions(&self) -> Result<Vec<[f32; 4]>> {
        self.kernel.read_positions(&self.ctx)
    }
}

fn to_f32(v: Vector3<f64>) -> Vector3<f32> {
    Vector3::new(v.x as f32, v.y as f32, v.z as f32)
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Zero};

    use super::*;
    use crate::{config::KernelKind, constants::RECENTER_STEPS, error::UniverseError};

    const FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

    fn small(kernel: KernelKind) -> SimulationConfig {
        SimulationConfig {
            galaxies: 2,
            stars_per_galaxy: 500,
            seed: Some(42),
            kernel,
            ..SimulationConfig::default()
        }
    }

    fn universe(config: SimulationConfig) -> Option<Universe> {
        let Ok(ctx) = GpuContext::headless() else {
            eprintln!("no GPU adapter, skipping");
            return None;
        };
        Some(Universe::new(Arc::new(ctx), config, FORMAT, (256, 256)).expect("universe"))
    }

    fn target(universe: &Universe) -> (wgpu::Texture, TextureView) {
        let texture = universe.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d {
                width: 256,
                height: 256,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        (texture, view)
    }

    #[test]
    fn update_swaps_buffers_and_moves_stars() {
        for kernel in [KernelKind::Gpu, KernelKind::Cpu] {
            let Some(mut universe) = universe(small(kernel)) else {
                return;
            };
            let before = universe.read_positions().expect("readback");
            assert_eq!(universe.front_index(), 0);

            universe.update();
            assert_eq!(universe.front_index(), 1);
            let after = universe.read_positions().expect("readback");
            let stars = universe.config().star_count() as usize;
            assert!(before[..stars].iter().zip(&after[..stars]).all(|(a, b)| a != b));

            universe.update();
            assert_eq!(universe.front_index(), 0);
            assert_eq!(universe.ticks(), 2);
        }
    }

    #[test]
    fn animated_recenter_reaches_black_hole_centroid() {
        let config = SimulationConfig {
            max_galaxy_speed: 0.0,
            live: LiveOptions {
                speed: 1e-4,
                ..LiveOptions::default()
            },
            ..small(KernelKind::Cpu)
        };
        let Some(mut universe) = universe(config) else {
            return;
        };
        universe.recenter(true);
        assert!(universe.is_recentering());
        for _ in 0..RECENTER_STEPS {
            universe.update();
        }
        assert!(!universe.is_recentering());
        let target = to_f32(universe.black_holes().negative_centroid());
        assert!((universe.view_center() - target).magnitude() < 1e-2);
    }

    #[test]
    fn auto_center_waits_for_drift() {
        let config = SimulationConfig {
            max_galaxy_speed: 0.0,
            live: LiveOptions {
                auto_center: true,
                speed: 1e-4,
                ..LiveOptions::default()
            },
            ..small(KernelKind::Cpu)
        };
        let Some(mut universe) = universe(config) else {
            return;
        };
        assert_eq!(universe.view_center(), Vector3::zero());
        universe.update();
        assert!(!universe.is_recentering());
        assert_eq!(universe.view_center(), Vector3::zero());
    }

    #[test]
    fn failed_rebuild_keeps_current_universe() {
        let Some(mut universe) = universe(small(KernelKind::Gpu)) else {
            return;
        };
        universe.update();
        let huge = SimulationConfig {
            galaxies: u32::MAX,
            stars_per_galaxy: u32::MAX,
            ..small(KernelKind::Gpu)
        };
        let err = universe.rebuild(Some(huge)).expect_err("grid cannot fit");
        assert!(matches!(err, UniverseError::GridTooLarge { .. }));
        assert_eq!(universe.config().stars_per_galaxy, 500);
        assert_eq!(universe.ticks(), 1);

        universe.rebuild(None).expect("rebuild");
        assert_eq!(universe.ticks(), 0);
        assert_eq!(universe.front_index(), 0);
    }

    #[test]
    fn oversized_star_buffers_fail_before_allocation() {
        let Some(mut universe) = universe(small(KernelKind::Gpu)) else {
            return;
        };
        let limits = universe.ctx.limits();
        let stars = limits.max_storage_buffer_binding_size / 8 + 1;
        let huge = SimulationConfig {
            galaxies: 1,
            stars_per_galaxy: stars,
            ..small(KernelKind::Gpu)
        };
        let err = universe.rebuild(Some(huge)).expect_err("buffers cannot fit");
        assert!(matches!(
            err,
            UniverseError::BufferTooLarge { .. } | UniverseError::GridTooLarge { .. }
        ));
        assert_eq!(universe.config().stars_per_galaxy, 500);
        universe.update();
        assert_eq!(universe.ticks(), 1);
    }

    #[test]
    fn frame_shows_stars_on_background() {
        let Some(mut universe) = universe(small(KernelKind::Gpu)) else {
            return;
        };
        universe.recenter(false);
        let (texture, view) = target(&universe);
        universe.draw(&view);
        let pixels = universe.ctx.read_texture(&texture, 4).expect("readback");
        assert!(pixels.chunks_exact(4).any(|p| p[0] > 0 || p[1] > 0 || p[2] > 0));
        assert!(pixels.chunks_exact(4).all(|p| p[3] == 255));

        // Trails and black holes exercise the remaining passes.
        universe.set_options(LiveOptions {
            blur: true,
            show_black_holes: true,
            ..universe.config().live
        });
        universe.update();
        universe.draw(&view);
        universe.draw(&view);
        universe.ctx.wait_idle().expect("idle");
    }

    #[test]
    fn layers_split_the_frame() {
        let Some(mut universe) = universe(small(KernelKind::Gpu)) else {
            return;
        };
        universe.recenter(false);
        universe.update();
        let images = universe.draw_layers(4).expect("layers");
        assert_eq!(images.len(), 4);
        for image in &images {
            assert_eq!(image.dimensions(), (256, 256));
        }
        assert!(universe.draw_layers(0).expect("no layers").is_empty());
        // Extraction leaves the simulation where it was.
        assert_eq!(universe.front_index(), 1);
    }
}
