pub mod camera_utils;
pub mod clipping;
pub mod viewport;

// Re-export main types
pub use camera_utils::{Camera, CameraUniform};
pub use clipping::fit_clipping_planes;
pub use viewport::{
    Frustum, MagnifyMode, NamedView, Projection, ScreenPoint, ScreenPort, Viewport,
};
