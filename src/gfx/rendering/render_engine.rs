//! WGPU-based rendering engine
//!
//! Owns the device, the window surface and the render targets, and drives
//! one [`ModelRenderer`] pass per frame into whichever target the
//! [`FramebufferManager`] selects.

use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;
use winit::window::Window;

use super::framebuffer::{
    ActiveTarget, FramebufferError, FramebufferManager, SurfaceState, TargetSize,
};
use super::mesh_renderer::{FrameTarget, MeshRenderer, ModelRenderer};
use super::wgpu_targets::WgpuTargetAllocator;
use crate::config::ViewerConfig;
use crate::gfx::camera::Viewport;
use crate::model::Model;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Framebuffer(#[from] FramebufferError),
}

/// Core rendering engine managing GPU resources and draw calls
pub struct RenderEngine {
    instance: wgpu::Instance,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: Option<wgpu::Surface<'static>>,
    config: wgpu::SurfaceConfiguration,
    framebuffers: FramebufferManager<WgpuTargetAllocator>,
    renderer: MeshRenderer,
    clear_color: wgpu::Color,
    clear_depth: f32,
}

impl RenderEngine {
    /// Creates a render engine drawing into `window`
    ///
    /// Render targets are not allocated here; the first [`render`](Self::render)
    /// does that so a failed MSAA probe never prevents start-up.
    pub async fn new(
        window: Arc<Window>,
        width: u32,
        height: u32,
        viewer: &ViewerConfig,
    ) -> Result<RenderEngine, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        info!("Using adapter: {}", adapter.get_info().name);

        // Sample counts beyond 1 and 4 are only usable with adapter
        // specific format features.
        let required_features = adapter.features()
            & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features,
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or(RenderError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: viewer.present_mode(),
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let allocator = WgpuTargetAllocator::new(&adapter, device.clone(), format);
        let framebuffers = FramebufferManager::new(allocator, viewer.msaa_samples);
        let renderer = MeshRenderer::new(device.clone(), queue.clone(), format);

        Ok(Self {
            instance,
            device,
            queue,
            surface: Some(surface),
            config,
            framebuffers,
            renderer,
            clear_color: viewer.clear_color,
            clear_depth: viewer.clear_depth,
        })
    }

    /// Draws one frame. While suspended, or after target allocation failed,
    /// nothing is drawn.
    pub fn render(
        &mut self,
        model: &dyn Model,
        viewport: &Viewport,
        fast_drawing: bool,
    ) -> Result<(), RenderError> {
        let Some(surface) = self.surface.as_ref() else {
            return Ok(());
        };

        let size = TargetSize::new(self.config.width, self.config.height);
        if self.framebuffers.state() == SurfaceState::Uninitialized {
            self.framebuffers.initialize(size)?;
        }
        let Some(active) = self.framebuffers.select(fast_drawing) else {
            return Ok(());
        };

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost or outdated, reconfiguring");
                surface.configure(&self.device, &self.config);
                surface.get_current_texture()?
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Timed out waiting for a surface texture, skipping frame");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let target = match active {
            ActiveTarget::Msaa => {
                let msaa = self
                    .framebuffers
                    .msaa_target()
                    .ok_or(FramebufferError::NotInitialized)?;
                FrameTarget {
                    color_view: &msaa.color.view,
                    resolve_target: Some(&surface_view),
                    depth_view: &msaa.depth.view,
                    sample_count: msaa.samples,
                    clear_color: self.clear_color,
                    clear_depth: self.clear_depth,
                }
            }
            ActiveTarget::Visible => {
                let depth = self
                    .framebuffers
                    .visible_depth()
                    .ok_or(FramebufferError::NotInitialized)?;
                FrameTarget {
                    color_view: &surface_view,
                    resolve_target: None,
                    depth_view: &depth.view,
                    sample_count: 1,
                    clear_color: self.clear_color,
                    clear_depth: self.clear_depth,
                }
            }
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.renderer
            .render_model(&mut encoder, &target, model, viewport);

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Resizes the surface and its render targets. Zero sizes (minimised
    /// windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = self.surface.as_ref() {
            surface.configure(&self.device, &self.config);
        }

        // A new size deserves a new attempt after a failed allocation
        self.framebuffers.retry();
        if let Err(err) = self.framebuffers.resize(TargetSize::new(width, height)) {
            warn!("Failed to resize render targets: {}", err);
        }
    }

    /// Drops the surface and everything allocated for it
    pub fn suspend(&mut self) {
        self.surface = None;
        self.framebuffers.suspend();
        self.renderer.release_gpu_resources();
    }

    /// Recreates the surface for `window` and reallocates render targets
    pub fn resume(&mut self, window: Arc<Window>) -> Result<(), RenderError> {
        let surface = self.instance.create_surface(window)?;
        surface.configure(&self.device, &self.config);
        self.surface = Some(surface);
        self.framebuffers
            .resume(TargetSize::new(self.config.width, self.config.height))?;
        Ok(())
    }

    pub fn is_suspended(&self) -> bool {
        self.surface.is_none()
    }

    /// Sample count achieved by the MSAA probe, 1 when MSAA is unavailable
    pub fn msaa_samples(&self) -> u32 {
        self.framebuffers.msaa_samples()
    }
}
