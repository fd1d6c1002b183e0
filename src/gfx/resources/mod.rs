// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Textures backing the render targets.

pub mod texture_resource;

// Re-export main types
pub use texture_resource::TextureResource;
