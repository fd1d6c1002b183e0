//! Texture resource management for wgpu
//!
//! Provides utilities for creating GPU textures used as render attachments:
//! depth buffers and multisampled colour targets.

/// GPU texture resource containing texture and view
///
/// Bundles the two components needed for render attachments:
/// - Texture: The actual GPU memory allocation
/// - View: Interface used by render passes
#[derive(Debug, Clone)]
pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl TextureResource {
    /// Standard depth buffer format used throughout the viewer
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Creates a depth attachment
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating resources
    /// * `width`, `height` - Attachment size in pixels, must match the colour target
    /// * `sample_count` - 1 for the visible target, the MSAA count otherwise
    /// * `label` - Debug label for the texture
    pub fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        sample_count: u32,
        label: &str,
    ) -> Self {
        Self::create_attachment(
            device,
            width,
            height,
            sample_count,
            Self::DEPTH_FORMAT,
            label,
        )
    }

    /// Creates a multisampled colour attachment that is resolved into the
    /// surface texture at the end of each pass
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating resources
    /// * `width`, `height` - Attachment size in pixels
    /// * `sample_count` - Samples per pixel
    /// * `format` - Must equal the surface format for the resolve to be valid
    /// * `label` - Debug label for the texture
    pub fn create_msaa_color_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        sample_count: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        Self::create_attachment(device, width, height, sample_count, format, label)
    }

    fn create_attachment(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        sample_count: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }

    pub fn sample_count(&self) -> u32 {
        self.texture.sample_count()
    }
}
