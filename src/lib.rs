// src/lib.rs
//! touchview
//!
//! A touch-driven 3D model viewer built on wgpu and winit: multi-touch
//! orbit, pan and pinch camera gestures, and multisampled render targets
//! that fall back gracefully when the device cannot provide them.

pub mod app;
pub mod config;
pub mod gfx;
pub mod input;
pub mod model;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::ViewerApp;
pub use config::ViewerConfig;
pub use model::{Model, ObjModel};

/// Opens `path` as an OBJ model and runs the viewer until its window closes
pub fn view_obj(path: impl Into<std::path::PathBuf>, config: ViewerConfig) -> anyhow::Result<()> {
    ViewerApp::new(Box::new(ObjModel::open(path)), config).run()
}
