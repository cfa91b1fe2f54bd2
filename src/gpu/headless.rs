use anyhow::{Context, Result};
use tracing::info;

/// A device/queue pair acquired without a presentation surface.
#[derive(Debug)]
pub struct HeadlessGpu {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl HeadlessGpu {
    pub fn acquire() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let info = adapter.get_info();
        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("image-wall-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        info!(
            adapter = %info.name,
            backend = ?info.backend,
            max_array_layers = device.limits().max_texture_array_layers,
            "headless GPU ready"
        );
        Ok(Self { device, queue })
    }

    /// Layers one array texture can hold; the natural shard size.
    pub fn max_array_layers(&self) -> usize {
        self.device.limits().max_texture_array_layers as usize
    }
}
