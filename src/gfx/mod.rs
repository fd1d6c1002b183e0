//! # Graphics Module
//!
//! Camera model and GPU rendering for the viewer.
//!
//! - **Camera** ([`camera`]) - Viewport state, gesture driven orbit, pan and
//!   zoom, clipping plane fitting
//! - **Rendering** ([`rendering`]) - Render target lifecycle with optional
//!   MSAA, mesh pipeline and the frame loop
//! - **Resources** ([`resources`]) - Texture attachments

pub mod camera;
pub mod rendering;
pub mod resources;

// Re-export commonly used types
pub use camera::Viewport;
pub use rendering::render_engine::RenderEngine;
