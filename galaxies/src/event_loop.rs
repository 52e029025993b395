use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use pollster::FutureExt;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::{
    config::SimulationConfig,
    surface::{GpuContext, SurfaceState, get_surface},
    universe::Universe,
};

/// Radians of view rotation per pixel dragged.
const DRAG_SENSITIVITY: f32 = 0.005;

#[derive(Debug, Default, Clone)]
pub struct KeyTrigger {
    pressed: bool,
    trigger: bool,
}

impl KeyTrigger {
    pub fn event(&mut self, is_pressed: bool) {
        match (self.pressed, is_pressed) {
            (true, true) => (),
            (true, false) => self.pressed = false,
            (false, true) => {
                self.pressed = true;
                self.trigger = true;
            }
            (false, false) => (),
        }
    }

    pub fn get_trigger(&mut self) -> bool {
        let t = self.trigger;
        self.trigger = false;
        t
    }
}

#[derive(Default, Clone)]
pub struct KeyboardState {
    pub restart: KeyTrigger,
    pub pause: KeyTrigger,
    pub recenter: KeyTrigger,
    pub layers: KeyTrigger,
}

#[derive(Default)]
struct Drag {
    active: bool,
    last: Option<PhysicalPosition<f64>>,
}

impl Drag {
    /// Pixel delta since the last cursor event while the button is held.
    fn moved_to(&mut self, position: PhysicalPosition<f64>) -> Option<(f32, f32)> {
        let last = self.last.replace(position);
        if !self.active {
            return None;
        }
        last.map(|last| ((position.x - last.x) as f32, (position.y - last.y) as f32))
    }
}

struct Running {
    window: Arc<Window>,
    ctx: Arc<GpuContext>,
    surface: SurfaceState,
    universe: Universe,
}

/// Windowed driver: owns the window and one universe, forwards input to it.
pub struct GalaxyApp {
    config: SimulationConfig,
    layers: u32,
    layer_dir: PathBuf,
    running: Option<Running>,
    keys: KeyboardState,
    drag: Drag,
    paused: bool,
    error: Option<anyhow::Error>,
}

impl GalaxyApp {
    pub fn new(config: SimulationConfig, layers: u32, layer_dir: PathBuf) -> Self {
        Self {
            config,
            layers,
            layer_dir,
            running: None,
            keys: KeyboardState::default(),
            drag: Drag::default(),
            paused: false,
            error: None,
        }
    }

    /// Error that stopped the event loop, if any.
    pub fn finish(self) -> anyhow::Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running> {
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title("galaxies")
                    .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720)),
            )?,
        );
        let (ctx, surface) = get_surface(window.clone()).block_on()?;
        let ctx = Arc::new(ctx);
        let size = window.inner_size();
        let universe = Universe::new(
            ctx.clone(),
            self.config.clone(),
            surface.format(),
            (size.width.max(1), size.height.max(1)),
        )
        .context("failed to build universe")?;

        Ok(Running {
            window,
            ctx,
            surface,
            universe,
        })
    }

    fn export_layers(layers: u32, dir: &std::path::Path, universe: &mut Universe) -> anyhow::Result<()> {
        let images = universe.draw_layers(layers)?;
        std::fs::create_dir_all(dir)?;
        for (index, image) in images.iter().enumerate() {
            let path = dir.join(format!("layer_{index:02}.png"));
            image
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        log::info!("wrote {} layers to {}", images.len(), dir.display());
        Ok(())
    }

    fn redraw(running: &mut Running) {
        let output = match running.surface.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                log::warn!("get_current_texture error: {err:?}");
                match err {
                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                        running.surface.configure(&running.ctx.device);
                    }
                    _ => (),
                }
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        running.universe.draw(&view);
        running.window.pre_present_notify();
        output.present();
    }
}

impl ApplicationHandler for GalaxyApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(running) = &mut self.running else {
            return;
        };
        if window_id != running.window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("close requested, stopping");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                running.surface.resize(&running.ctx.device, size);
                running.universe.display_resized(size.width, size.height);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.drag.active = state == ElementState::Pressed,
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((dx, dy)) = self.drag.moved_to(position) {
                    running
                        .universe
                        .rotate_view(dx * DRAG_SENSITIVITY, dy * DRAG_SENSITIVITY);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let is_pressed = event.state == ElementState::Pressed;
                match event.logical_key {
                    Key::Named(NamedKey::Enter) => self.keys.restart.event(is_pressed),
                    Key::Named(NamedKey::Space) => self.keys.pause.event(is_pressed),
                    Key::Character(code) => match code.as_str() {
                        "c" => self.keys.recenter.event(is_pressed),
                        "l" => self.keys.layers.event(is_pressed),
                        _ => (),
                    },
                    _ => (),
                }
            }
            WindowEvent::RedrawRequested => Self::redraw(running),
            _ => (),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        let Some(running) = &mut self.running else {
            return;
        };

        if self.keys.restart.get_trigger() {
            match running.universe.rebuild(None) {
                Ok(()) => log::info!("universe restarted"),
                Err(err) => log::warn!("restart failed, keeping current universe: {err}"),
            }
        }
        if self.keys.pause.get_trigger() {
            self.paused = !self.paused;
        }
        if self.keys.recenter.get_trigger() {
            running.universe.recenter(true);
        }
        if self.keys.layers.get_trigger() {
            if let Err(err) = Self::export_layers(self.layers, &self.layer_dir, &mut running.universe) {
                log::warn!("layer export failed: {err:#}");
            }
        }

        if self.paused {
            running.universe.animate_view();
        } else {
            running.universe.update();
        }
        running.window.request_redraw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_fires_once_per_press() {
        let mut key = KeyTrigger::default();
        key.event(true);
        key.event(true);
        assert!(key.get_trigger());
        assert!(!key.get_trigger());
        key.event(false);
        key.event(true);
        assert!(key.get_trigger());
    }

    #[test]
    fn drag_reports_deltas_only_while_held() {
        let mut drag = Drag::default();
        assert_eq!(drag.moved_to(PhysicalPosition::new(10.0, 10.0)), None);
        drag.active = true;
        assert_eq!(drag.moved_to(PhysicalPosition::new(14.0, 7.0)), Some((4.0, -3.0)));
        drag.active = false;
        assert_eq!(drag.moved_to(PhysicalPosition::new(30.0, 7.0)), None);
    }
}
