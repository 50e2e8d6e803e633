//! GPU compute backend for the stage pipeline.
//!
//! Runs the four stages as WebGPU (wgpu) compute shaders over the
//! chromosome layout generated by the descriptor.

mod backend;

pub use backend::GpuBackend;

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("Readback channel closed before the buffer was mapped")]
    ReadbackChannel,
}
