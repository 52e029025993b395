use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    /// A shader module or pipeline failed validation. `log` carries the
    /// compiler output reported by the device.
    #[error("failed to create {label}: {log}")]
    ResourceCreation { label: &'static str, log: String },
    #[error(
        "{stars} stars need a {resolution}x{resolution} state texture, device limit is {limit}"
    )]
    GridTooLarge {
        stars: u64,
        resolution: u64,
        limit: u32,
    },
    #[error("{label} for {stars} stars needs {bytes} bytes, device limit is {limit}")]
    BufferTooLarge {
        label: &'static str,
        stars: u64,
        bytes: u64,
        limit: u64,
    },
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed waiting for the GPU: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("failed to start CPU kernel threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

pub type Result<T> = std::result::Result<T, UniverseError>;
