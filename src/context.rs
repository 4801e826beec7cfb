//! GPU device setup, with or without a window.

use std::sync::Arc;

use winit::window::Window;

use crate::error::ViewerError;

/// Color format of offscreen captures. sRGB so captures match the window.
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Formats the IBL passes render into and later sample with filtering.
const REQUIRED_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rg16Float,
];

#[derive(Debug)]
pub struct WindowSurface {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

#[derive(Debug)]
pub struct Context {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// `None` when rendering offscreen only.
    pub surface: Option<WindowSurface>,
    /// Format every scene pipeline renders into.
    pub color_format: wgpu::TextureFormat,
}

impl Context {
    /// Device presenting to `window`.
    pub async fn new(window: Arc<Window>) -> Result<Self, ViewerError> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // Backends::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The forward program writes linear color and relies on an sRGB
        // surface for the encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| {
                ViewerError::MissingCapability("the surface supports no formats".into())
            })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            adapter,
            device,
            queue,
            color_format: surface_format,
            surface: Some(WindowSurface {
                window,
                surface,
                config,
            }),
        })
    }

    /// Device without a surface, for single-shot captures and tests.
    pub async fn headless() -> Result<Self, ViewerError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let (adapter, device, queue) = request_device(&instance, None).await?;
        Ok(Self {
            adapter,
            device,
            queue,
            surface: None,
            color_format: CAPTURE_FORMAT,
        })
    }

    /// Reconfigures the surface. Zero sized windows (minimized) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(target) = self.surface.as_mut() {
            target.config.width = width;
            target.config.height = height;
            target.surface.configure(&self.device, &target.config);
        }
    }

    pub fn reconfigure(&self) {
        if let Some(target) = self.surface.as_ref() {
            target.surface.configure(&self.device, &target.config);
        }
    }
}

async fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'static>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), ViewerError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| ViewerError::NoAdapter(e.to_string()))?;
    let info = adapter.get_info();
    log::info!("Using {} ({:?})", info.name, info.backend);
    check_capabilities(&adapter)?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("viewer device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
            ..Default::default()
        })
        .await
        .map_err(|e| ViewerError::NoAdapter(e.to_string()))?;
    Ok((adapter, device, queue))
}

/// Fails unless the half float formats of the IBL maps can be rendered to
/// and filtered.
pub fn check_capabilities(adapter: &wgpu::Adapter) -> Result<(), ViewerError> {
    for format in REQUIRED_FORMATS {
        let features = adapter.get_texture_format_features(format);
        let usages = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if !features.allowed_usages.contains(usages)
            || !features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
        {
            return Err(ViewerError::MissingCapability(format!(
                "{format:?} is not renderable and filterable"
            )));
        }
    }
    Ok(())
}
