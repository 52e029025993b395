// PHYSICAL
/// Gravitational parameter of every black hole, in simulation units.
pub const BLACK_HOLE_GRAVITY: f64 = 5000.0;
/// Separations below this are treated as exactly this far apart.
pub const MIN_SEPARATION: f64 = 1.0;
/// Inner edge of a galaxy disc, as a fraction of the galaxy radius.
pub const MIN_STAR_DISTANCE_FRACTION: f64 = 0.15;

// GENESIS DEFAULTS
pub const DEFAULT_GALAXIES: u32 = 2;
pub const DEFAULT_STARS_PER_GALAXY: u32 = 500_000;
pub const DEFAULT_GALAXY_RADIUS: f64 = 150.0;
pub const DEFAULT_BOUNDS: f64 = 500.0;
pub const DEFAULT_MAX_GALAXY_SPEED: f64 = 2.0;

// LIVE DEFAULTS
pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_STAR_SIZE: f32 = 1000.0;
pub const DEFAULT_STAR_INTENSITY: f32 = 0.25;
pub const DEFAULT_HDR_EXPOSURE: f32 = 1.0;

// VIEW
/// Vertical field of view, radians.
pub const FIELD_OF_VIEW: f32 = std::f32::consts::FRAC_PI_3;
pub const Z_NEAR: f32 = 1.0;
pub const Z_FAR: f32 = 10000.0;
/// Ticks a recenter animation takes, progress advancing 0.005 per tick.
pub const RECENTER_STEPS: u32 = 200;

// RENDERING
/// Number of procedural galaxy sprites.
pub const GALAXY_SPRITES: usize = 3;
/// Alpha of the background quad blended over the previous frame when trails are on.
pub const TRAIL_FADE_ALPHA: f32 = 0.1;
/// Numerator of the perspective point size of a black hole sprite.
pub const BLACK_HOLE_SPRITE_SIZE: f32 = 70000.0;
/// Frames in the black hole animation atlas (8x8 grid, last four unused).
pub const BLACK_HOLE_FRAMES: u32 = 60;
/// Milliseconds each black hole animation frame is shown.
pub const BLACK_HOLE_FRAME_MILLIS: u128 = 20;
pub const ACCUMULATION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const LAYER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// SIMULATION
/// Hard cap on number of threads the CPU kernel uses.
pub const MAX_THREADS: usize = 20;
/// Minimum number of texels per CPU kernel thread.
pub const TEXELS_PER_THREAD: usize = 2000;
