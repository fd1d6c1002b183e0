// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Typed wrappers for the buffers the renderer uploads.

pub mod uniform_buffer;

// Re-export main types
pub use uniform_buffer::{GeometryBuffer, UniformBuffer};
