// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Render target lifecycle, pipelines, and frame rendering.

pub mod framebuffer;
pub mod mesh_renderer;
pub mod pipeline_manager;
pub mod render_engine;
pub mod vertex;
pub mod wgpu_targets;

// Re-export main types
pub use framebuffer::{
    ActiveTarget, FramebufferError, FramebufferManager, MsaaTarget, SurfaceState, TargetAllocator,
    TargetSize,
};
pub use mesh_renderer::{FrameTarget, MeshRenderer, ModelRenderer};
pub use pipeline_manager::{PipelineConfig, PipelineManager};
pub use render_engine::{RenderEngine, RenderError};
pub use vertex::MeshVertex;
pub use wgpu_targets::WgpuTargetAllocator;
