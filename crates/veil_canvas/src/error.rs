//! Canvas runtime errors

use thiserror::Error;

/// Errors surfaced by canvas initialization and rendering
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Neither the modern nor the legacy backend produced an adapter.
    /// The canvas stays blank; the host keeps working without it.
    #[error("No usable GPU backend (modern and legacy probes both failed)")]
    NoBackend,

    #[error("Failed to acquire GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Canvas was disposed; no further operations are accepted")]
    Disposed,

    #[error("Operation requires phase {required:?} but canvas is {actual:?}")]
    WrongPhase {
        required: crate::runtime::RuntimePhase,
        actual: crate::runtime::RuntimePhase,
    },

    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
