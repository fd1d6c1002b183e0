//! Viewer configuration

use std::time::Duration;

use crate::input::GestureConfig;

/// Settings for a [`ViewerApp`](crate::app::ViewerApp) run
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// MSAA sample count to probe first; halved until the device accepts it
    pub msaa_samples: u32,
    pub clear_color: wgpu::Color,
    pub clear_depth: f32,
    pub vsync: bool,
    /// Idle time after which the frame is redrawn anyway
    pub inactivity_redraw: Duration,
    pub gesture: GestureConfig,
    /// Zoom factor per scroll-wheel line
    pub wheel_zoom_step: f64,
    /// Extra room around the model for zoom extents, as a radius factor
    pub extents_border: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "touchview".to_string(),
            width: 1200,
            height: 800,
            msaa_samples: 8,
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
            clear_depth: 1.0,
            vsync: true,
            inactivity_redraw: Duration::from_secs(9),
            gesture: GestureConfig::default(),
            wheel_zoom_step: 1.1,
            extents_border: 1.05,
        }
    }
}

impl ViewerConfig {
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_owned();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// A count of 0 or 1 disables MSAA
    pub fn with_msaa_samples(mut self, samples: u32) -> Self {
        self.msaa_samples = samples.max(1);
        self
    }

    pub fn with_clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_inactivity_redraw(mut self, period: Duration) -> Self {
        self.inactivity_redraw = period;
        self
    }

    pub fn with_gesture_config(mut self, gesture: GestureConfig) -> Self {
        self.gesture = gesture;
        self
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}
