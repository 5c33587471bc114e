use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::types::{GpuPowerPreference, SurfaceDimensions, WaterfallConfig, GRADIENT_SIZE};

/// Instance, device and swapchain for one window.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub(crate) fn new(window: Arc<Window>, settings: &WaterfallConfig) -> Result<Self> {
        let initial_size = window.inner_size();
        tracing::debug!(platform = window_platform(&window), "creating surface");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create rendering surface")?;

        let power_preference = match settings.power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let max_dimension = limits.max_texture_dimension_2d;
        let SurfaceDimensions { width, height } = settings.dimensions;
        if width > max_dimension || height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, ring texture is {width}x{height}"
            );
        }
        if (limits.max_texture_dimension_1d as usize) < GRADIENT_SIZE {
            anyhow::bail!(
                "GPU max 1D texture dimension {} cannot hold a {GRADIENT_SIZE}-entry gradient",
                limits.max_texture_dimension_1d
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        // The draw surface holds display-ready values; an sRGB target would encode them twice.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or_else(|| {
                let fallback = surface_caps.formats[0];
                tracing::warn!(
                    ?fallback,
                    "no linear (non-sRGB) surface format available; falling back to {:?}",
                    fallback
                );
                fallback
            });

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("waterfall device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let desired_maximum_frame_latency = settings.frame_latency.clamp(1, 3);
        if desired_maximum_frame_latency != settings.frame_latency {
            tracing::warn!(
                requested = settings.frame_latency,
                clamped = desired_maximum_frame_latency,
                "GPU frame latency clamped to valid range (1-3)"
            );
        }

        let present_mode = select_present_mode(&surface_caps, settings.vsync);
        tracing::debug!(?present_mode, vsync = settings.vsync, "using present mode");

        let size = PhysicalSize::new(initial_size.width, initial_size.height);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&device, &config);
        }

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            surface_format,
        })
    }

    /// A zero-area window has no presentable surface.
    pub(crate) fn is_presentable(&self) -> bool {
        self.size.width > 0 && self.size.height > 0
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if !self.is_presentable() {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Re-applies the current configuration after the swapchain was lost.
    pub(crate) fn reconfigure(&mut self) {
        self.resize(self.size);
    }
}

fn select_present_mode(caps: &wgpu::SurfaceCapabilities, vsync: bool) -> wgpu::PresentMode {
    let find = |wanted: wgpu::PresentMode| caps.present_modes.iter().copied().find(|m| *m == wanted);
    let fifo = find(wgpu::PresentMode::Fifo).unwrap_or(caps.present_modes[0]);
    if vsync {
        fifo
    } else {
        // Prefer Immediate (no vsync), fallback to Mailbox, then Fifo
        find(wgpu::PresentMode::Immediate)
            .or_else(|| find(wgpu::PresentMode::Mailbox))
            .unwrap_or(fifo)
    }
}

fn window_platform(window: &Window) -> &'static str {
    match window.window_handle().map(|handle| handle.as_raw()) {
        Ok(RawWindowHandle::Wayland(_)) => "wayland",
        Ok(RawWindowHandle::Xlib(_)) | Ok(RawWindowHandle::Xcb(_)) => "x11",
        Ok(RawWindowHandle::AppKit(_)) => "appkit",
        Ok(RawWindowHandle::Win32(_)) => "win32",
        Ok(_) => "other",
        Err(_) => "unavailable",
    }
}
