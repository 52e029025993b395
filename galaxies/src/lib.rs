mod black_hole_pipeline;
pub mod camera;
mod compute;
pub mod config;
pub mod constants;
pub mod error;
mod event_loop;
pub mod grid;
pub mod kernel;
pub mod layers;
mod post;
mod render;
pub mod sim;
pub mod sprites;
mod star_pipeline;
pub mod surface;
pub mod universe;

pub use config::{KernelKind, LiveOptions, SimulationConfig};
pub use error::{Result, UniverseError};
pub use event_loop::GalaxyApp;
pub use surface::GpuContext;
pub use universe::Universe;
