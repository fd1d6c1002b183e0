//! wgpu implementation of [`TargetAllocator`]

use std::sync::Arc;

use log::debug;

use super::framebuffer::{FramebufferError, TargetAllocator, TargetSize};
use crate::gfx::resources::TextureResource;

/// Allocates render targets on a wgpu device.
///
/// Support is taken from the adapter's per-format features. Without
/// `TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES` on the device, wgpu only
/// accepts the portable counts 1 and 4. Allocation failures are caught with
/// error scopes instead of surfacing as uncaptured device errors.
pub struct WgpuTargetAllocator {
    device: Arc<wgpu::Device>,
    color_format: wgpu::TextureFormat,
    color_features: wgpu::TextureFormatFeatures,
    depth_features: wgpu::TextureFormatFeatures,
    adapter_specific: bool,
}

impl WgpuTargetAllocator {
    pub fn new(
        adapter: &wgpu::Adapter,
        device: Arc<wgpu::Device>,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let adapter_specific = device
            .features()
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
        Self {
            color_features: adapter.get_texture_format_features(color_format),
            depth_features: adapter.get_texture_format_features(TextureResource::DEPTH_FORMAT),
            device,
            color_format,
            adapter_specific,
        }
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    fn scoped<T>(&self, create: impl FnOnce() -> T) -> Result<T, FramebufferError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let resource = create();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match (out_of_memory, validation) {
            (Some(_), _) => Err(FramebufferError::OutOfMemory),
            (None, Some(err)) => Err(FramebufferError::Validation(err.to_string())),
            (None, None) => Ok(resource),
        }
    }
}

impl TargetAllocator for WgpuTargetAllocator {
    type Color = TextureResource;
    type Depth = TextureResource;

    fn supports_sample_count(&self, samples: u32) -> bool {
        if samples == 1 {
            return true;
        }
        if !self.adapter_specific && samples != 4 {
            return false;
        }
        let supported = self.color_features.flags.sample_count_supported(samples)
            && self.depth_features.flags.sample_count_supported(samples);
        debug!("Probe {}x MSAA: {}", samples, supported);
        supported
    }

    fn create_color(&self, size: TargetSize, samples: u32) -> Result<TextureResource, FramebufferError> {
        if size.is_empty() {
            return Err(FramebufferError::ZeroSize);
        }
        if !self.supports_sample_count(samples) {
            return Err(FramebufferError::UnsupportedSampleCount(samples));
        }
        self.scoped(|| {
            TextureResource::create_msaa_color_texture(
                &self.device,
                size.width,
                size.height,
                samples,
                self.color_format,
                "MSAA Colour Target",
            )
        })
    }

    fn create_depth(&self, size: TargetSize, samples: u32) -> Result<TextureResource, FramebufferError> {
        if size.is_empty() {
            return Err(FramebufferError::ZeroSize);
        }
        if !self.supports_sample_count(samples) {
            return Err(FramebufferError::UnsupportedSampleCount(samples));
        }
        let label = if samples > 1 {
            "MSAA Depth Target"
        } else {
            "Visible Depth Target"
        };
        self.scoped(|| {
            TextureResource::create_depth_texture(&self.device, size.width, size.height, samples, label)
        })
    }
}
