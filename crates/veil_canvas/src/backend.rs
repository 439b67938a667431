//! GPU backend selection
//!
//! The canvas probes for a modern backend (Vulkan/Metal/DX12) first and
//! falls back to GL when the probe fails. Selection happens exactly once
//! per runtime; every later consumer reads the already-resolved choice
//! instead of re-probing.

use crate::error::CanvasError;

/// Which class of backend the probe resolved to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Vulkan, Metal, or DX12
    Modern,
    /// OpenGL / GLES fallback
    Legacy,
}

/// The resolved backend: kind plus the adapter it came from
pub struct SelectedBackend {
    pub kind: BackendKind,
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
}

impl SelectedBackend {
    pub fn describe(&self) -> String {
        let info = self.adapter.get_info();
        format!("{:?} ({} / {:?})", self.kind, info.name, info.backend)
    }
}

fn try_backends(
    backends: wgpu::Backends,
    power_preference: wgpu::PowerPreference,
) -> Option<(wgpu::Instance, wgpu::Adapter)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    Some((instance, adapter))
}

/// Resolve a backend, preferring modern APIs unless `force_legacy` is set
///
/// Probe order is modern first, GL second. A total miss is an error the
/// host is expected to absorb: the page keeps running, the canvas just
/// never draws.
pub fn probe(
    force_legacy: bool,
    power_preference: wgpu::PowerPreference,
) -> Result<SelectedBackend, CanvasError> {
    if !force_legacy {
        if let Some((instance, adapter)) = try_backends(wgpu::Backends::PRIMARY, power_preference) {
            let selected = SelectedBackend {
                kind: BackendKind::Modern,
                instance,
                adapter,
            };
            tracing::info!(backend = %selected.describe(), "selected modern backend");
            return Ok(selected);
        }
        tracing::warn!("modern backend probe failed; falling back to GL");
    }

    if let Some((instance, adapter)) = try_backends(wgpu::Backends::GL, power_preference) {
        let selected = SelectedBackend {
            kind: BackendKind::Legacy,
            instance,
            adapter,
        };
        tracing::info!(backend = %selected.describe(), "selected legacy backend");
        return Ok(selected);
    }

    tracing::error!("no usable GPU backend found");
    Err(CanvasError::NoBackend)
}
