use wgpu::TextureView;

use crate::{
    compute::{GpuStars, state_texture},
    config::KernelKind,
    error::Result,
    grid::StarGrid,
    sim::{StarField, StarState, StepParams},
    surface::GpuContext,
};

/// Per-star integration. Implementations keep two copies of the star state
/// and only ever read the front while writing the back.
pub trait StarKernel {
    fn grid(&self) -> StarGrid;

    /// State slot holding the current positions, 0 or 1.
    fn front_index(&self) -> usize;

    /// Advance every star one tick under the given black holes, then swap.
    fn step(&mut self, ctx: &GpuContext, black_holes: &[[f32; 4]], params: &StepParams);

    /// Position texture of state slot `slot`, as sampled by the star pass.
    fn position_view(&self, slot: usize) -> &TextureView;

    /// Current positions of every texel, padding included.
    fn read_positions(&self, ctx: &GpuContext) -> Result<Vec<[f32; 4]>>;
}

pub fn create_kernel(
    ctx: &GpuContext,
    kind: KernelKind,
    grid: StarGrid,
    initial: StarState,
    black_holes: usize,
) -> Result<Box<dyn StarKernel>> {
    Ok(match kind {
        KernelKind::Gpu => Box::new(GpuStars::new(ctx, grid, &initial, black_holes)?),
        KernelKind::Cpu => Box::new(CpuStars::new(ctx, grid, initial)?),
    })
}

/// Stars stepped on the host, positions mirrored into one texture after
/// every tick.
pub struct CpuStars {
    field: StarField,
    texture: wgpu::Texture,
    view: TextureView,
}

impl CpuStars {
    pub fn new(ctx: &GpuContext, grid: StarGrid, initial: StarState) -> Result<Self> {
        let texture = state_texture(
            ctx,
            "cpu star positions",
            grid,
            Some(initial.positions.as_slice()),
            wgpu::TextureUsages::empty(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            field: StarField::new(grid, initial)?,
            texture,
            view,
        })
    }
}

impl StarKernel for CpuStars {
    fn grid(&self) -> StarGrid {
        self.field.grid()
    }

    fn front_index(&self) -> usize {
        self.field.front_index()
    }

    fn step(&mut self, ctx: &GpuContext, black_holes: &[[f32; 4]], params: &StepParams) {
        self.field.step(black_holes, params);
        let resolution = self.field.grid().resolution();
        ctx.queue.write_texture(
            self.texture.as_image_copy(),
            bytemuck::cast_slice(&self.field.front().positions),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(resolution * 16),
                rows_per_image: Some(resolution),
            },
            self.texture.size(),
        );
    }

    fn position_view(&self, _slot: usize) -> &TextureView {
        &self.view
    }

    fn read_positions(&self, _ctx: &GpuContext) -> Result<Vec<[f32; 4]>> {
        Ok(self.field.front().positions.clone())
    }
}
