use std::sync::Arc;
use std::time::{Duration, Instant};

use cgmath::Point2;
use log::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, ModifiersState, PhysicalKey},
    window::{Window, WindowId},
};

use crate::config::ViewerConfig;
use crate::gfx::{
    camera::{fit_clipping_planes, MagnifyMode, ScreenPoint, Viewport},
    rendering::RenderEngine,
};
use crate::input::{
    pointer_event_from_button, pointer_event_from_cursor, pointer_event_from_touch, CameraGesture,
    GestureTranslator,
};
use crate::model::{Model, PreparationStatus};

/// How often progress is polled while the model is being prepared
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pixels of trackpad scrolling that count as one wheel line
const PIXELS_PER_LINE: f64 = 40.0;

/// Touch-driven model viewer.
///
/// Owns the window, the render engine, the model and the camera. Gestures
/// are ignored until the model has been prepared and the viewport set up
/// around it.
pub struct ViewerApp {
    config: ViewerConfig,
    model: Box<dyn Model>,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    viewport: Viewport,
    gestures: GestureTranslator,
    preparation_started: bool,
    preparing: bool,
    fast_drawing: bool,
    cursor: PhysicalPosition<f64>,
    modifiers: ModifiersState,
    mouse_orbit: bool,
    mouse_pan: bool,
    last_activity: Instant,
}

impl ViewerApp {
    pub fn new(model: Box<dyn Model>, config: ViewerConfig) -> Self {
        Self {
            viewport: Viewport::default_for(config.width, config.height),
            gestures: GestureTranslator::new(config.gesture),
            config,
            model,
            window: None,
            render_engine: None,
            preparation_started: false,
            preparing: false,
            fast_drawing: false,
            cursor: PhysicalPosition::new(0.0, 0.0),
            modifiers: ModifiersState::default(),
            mouse_orbit: false,
            mouse_pan: false,
            last_activity: Instant::now(),
        }
    }

    /// Runs the event loop until the window closes
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Wait);
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_fast_drawing(&self) -> bool {
        self.fast_drawing
    }

    pub fn is_preparing(&self) -> bool {
        self.preparing
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn start_preparation(&mut self) {
        if self.preparation_started {
            return;
        }
        info!("Preparing model");
        self.preparation_started = true;
        self.preparing = true;
        self.model.prepare();
    }

    /// Drains model progress. Returns true once the model became ready.
    fn poll_model(&mut self) -> bool {
        let mut became_ready = false;
        for progress in self.model.poll_progress() {
            match &progress.status {
                PreparationStatus::InProgress => {
                    debug!("Mesh preparation {:.0}%", progress.mesh_progress * 100.0)
                }
                PreparationStatus::Succeeded => {
                    self.preparing = false;
                    became_ready = true;
                }
                PreparationStatus::Failed(reason) => {
                    self.preparing = false;
                    error!("Model preparation failed: {}", reason);
                }
                PreparationStatus::Cancelled => {
                    self.preparing = false;
                    warn!("Model preparation cancelled");
                }
            }
        }
        if became_ready {
            self.on_model_ready();
        }
        became_ready
    }

    fn on_model_ready(&mut self) {
        let port = self.viewport.screen_port();
        let width = port.width().max(1) as u32;
        let height = port.height().max(1) as u32;
        let bbox = self.model.bounding_box();

        self.viewport = Viewport::setup(self.model.views(), &bbox, width, height);
        fit_clipping_planes(&mut self.viewport, &bbox);
        self.gestures.set_enabled(true);
        info!("Model ready, gestures enabled");
    }

    fn view_size(&self) -> cgmath::Vector2<f64> {
        self.viewport.screen_port().size()
    }

    /// Applies a recognized gesture to the camera
    fn apply_gesture(&mut self, gesture: CameraGesture) {
        self.last_activity = Instant::now();
        match gesture {
            CameraGesture::InteractionStarted => {
                self.fast_drawing = true;
                return;
            }
            CameraGesture::Orbit { anchor, current } => {
                let size = self.view_size();
                self.viewport.gesture_orbit(size, anchor, current);
            }
            CameraGesture::Pan { start, midpoint } => {
                self.viewport.lateral_pan(start, midpoint);
            }
            CameraGesture::Zoom { scale, center } => {
                let size = self.view_size();
                if !self.viewport.magnify(size, scale, MagnifyMode::Dolly, center) {
                    return;
                }
            }
            CameraGesture::DoubleTap { .. } => {
                self.zoom_extents();
            }
            CameraGesture::InteractionEnded => {
                // Full quality redraw
                self.fast_drawing = false;
            }
        }
        fit_clipping_planes(&mut self.viewport, &self.model.bounding_box());
        self.request_redraw();
    }

    fn zoom_extents(&mut self) {
        let bbox = self.model.bounding_box();
        if self.viewport.dolly_extents(&bbox, self.config.extents_border) {
            debug!("Zoomed to extents");
        }
    }

    fn apply_all(&mut self, gestures: Vec<CameraGesture>) {
        for gesture in gestures {
            self.apply_gesture(gesture);
        }
    }

    fn cursor_point(&self) -> ScreenPoint {
        Point2::new(self.cursor.x, self.cursor.y)
    }

    fn handle_mouse_button(&mut self, state: ElementState, button: MouseButton) {
        if !self.gestures.is_enabled() {
            return;
        }
        let now = Instant::now();
        let pan_button = matches!(button, MouseButton::Right | MouseButton::Middle)
            || (button == MouseButton::Left && self.modifiers.shift_key());

        match state {
            ElementState::Pressed if pan_button && !self.mouse_orbit && !self.mouse_pan => {
                self.mouse_pan = true;
                self.apply_gesture(CameraGesture::InteractionStarted);
            }
            ElementState::Pressed if button == MouseButton::Left && !self.mouse_pan => {
                self.mouse_orbit = true;
                let gestures = self
                    .gestures
                    .handle(pointer_event_from_button(state, self.cursor, now));
                self.apply_all(gestures);
            }
            ElementState::Released if self.mouse_pan && pan_button => {
                self.mouse_pan = false;
                self.apply_gesture(CameraGesture::InteractionEnded);
            }
            ElementState::Released if self.mouse_orbit && button == MouseButton::Left => {
                self.mouse_orbit = false;
                let gestures = self
                    .gestures
                    .handle(pointer_event_from_button(state, self.cursor, now));
                self.apply_all(gestures);
            }
            _ => {}
        }
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let previous = self.cursor_point();
        self.cursor = position;
        if self.mouse_pan {
            let current = self.cursor_point();
            self.apply_gesture(CameraGesture::Pan {
                start: previous,
                midpoint: current,
            });
        } else if self.mouse_orbit {
            let gestures = self
                .gestures
                .handle(pointer_event_from_cursor(position, Instant::now()));
            self.apply_all(gestures);
        }
    }

    fn handle_wheel(&mut self, delta: MouseScrollDelta) {
        if !self.gestures.is_enabled() {
            return;
        }
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y as f64,
            MouseScrollDelta::PixelDelta(p) => p.y / PIXELS_PER_LINE,
        };
        if lines == 0.0 {
            return;
        }
        let scale = self.config.wheel_zoom_step.powf(lines);
        let center = self.cursor_point();
        self.apply_gesture(CameraGesture::Zoom { scale, center });
    }

    fn handle_escape(&mut self, event_loop: &ActiveEventLoop) {
        if self.preparing {
            info!("Cancelling model preparation");
            self.model.cancel_preparation();
        } else {
            event_loop.exit();
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(engine) = self.render_engine.as_mut() {
            engine.resize(size.width, size.height);
        }
        self.viewport.resize(size.width, size.height);
        fit_clipping_planes(&mut self.viewport, &self.model.bounding_box());
        self.request_redraw();
    }

    fn redraw(&mut self) {
        if self.preparing {
            self.poll_model();
        }
        let Some(engine) = self.render_engine.as_mut() else {
            return;
        };
        if let Err(err) = engine.render(self.model.as_ref(), &self.viewport, self.fast_drawing) {
            error!("Render failed: {}", err);
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if let StartCause::ResumeTimeReached { .. } = cause {
            if !self.preparing {
                debug!("Inactivity redraw");
                self.last_activity = Instant::now();
            }
            self.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.clone() {
            if let Some(engine) = self.render_engine.as_mut().filter(|e| e.is_suspended()) {
                match engine.resume(window.clone()) {
                    Ok(()) => info!("Rendering resumed with {} samples", engine.msaa_samples()),
                    Err(err) => error!("Failed to resume rendering: {}", err),
                }
            }
            if self.model.is_ready_for_rendering() {
                self.gestures.set_enabled(true);
            }
            window.request_redraw();
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let engine = pollster::block_on(RenderEngine::new(
            window.clone(),
            size.width,
            size.height,
            &self.config,
        ));
        match engine {
            Ok(engine) => self.render_engine = Some(engine),
            Err(err) => {
                error!("Failed to initialize rendering: {}", err);
                event_loop.exit();
                return;
            }
        }

        self.viewport.resize(size.width.max(1), size.height.max(1));
        self.window = Some(window.clone());
        self.start_preparation();
        window.request_redraw();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        let cancelled = self.gestures.set_enabled(false);
        self.apply_all(cancelled);
        self.mouse_orbit = false;
        self.mouse_pan = false;
        self.fast_drawing = false;
        if let Some(engine) = self.render_engine.as_mut() {
            engine.suspend();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if self.preparing {
                    self.model.cancel_preparation();
                }
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.handle_escape(event_loop),
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
            }
            WindowEvent::Touch(touch) => {
                let gestures = self
                    .gestures
                    .handle(pointer_event_from_touch(&touch, Instant::now()));
                self.apply_all(gestures);
            }
            WindowEvent::CursorMoved { position, .. } => self.handle_cursor_moved(position),
            WindowEvent::MouseInput { state, button, .. } => self.handle_mouse_button(state, button),
            WindowEvent::MouseWheel { delta, .. } => self.handle_wheel(delta),
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => (),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let wake = if self.preparing {
            Instant::now() + PROGRESS_POLL_INTERVAL
        } else {
            self.last_activity + self.config.inactivity_redraw
        };
        event_loop.set_control_flow(ControlFlow::WaitUntil(wake));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::NamedView;
    use crate::model::{BoundingBox, MeshPreparationProgress, PreparedMesh};
    use cgmath::{MetricSpace, Point3};

    struct StubModel {
        pending: Vec<MeshPreparationProgress>,
        ready: bool,
        prepared: usize,
        cancelled: usize,
    }

    impl StubModel {
        fn new(pending: Vec<MeshPreparationProgress>) -> Self {
            Self {
                pending,
                ready: false,
                prepared: 0,
                cancelled: 0,
            }
        }
    }

    impl Model for StubModel {
        fn prepare(&mut self) {
            self.prepared += 1;
        }

        fn cancel_preparation(&mut self) {
            self.cancelled += 1;
        }

        fn is_ready_for_rendering(&self) -> bool {
            self.ready
        }

        fn poll_progress(&mut self) -> Vec<MeshPreparationProgress> {
            let events = std::mem::take(&mut self.pending);
            if events.iter().any(MeshPreparationProgress::did_succeed) {
                self.ready = true;
            }
            events
        }

        fn meshes(&self) -> &[PreparedMesh] {
            &[]
        }

        fn bounding_box(&self) -> BoundingBox {
            BoundingBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
        }

        fn views(&self) -> &[NamedView] {
            &[]
        }

        fn generation(&self) -> u64 {
            self.ready as u64
        }
    }

    fn app_with(pending: Vec<MeshPreparationProgress>) -> ViewerApp {
        let config = ViewerConfig::default().with_size(800, 600);
        ViewerApp::new(Box::new(StubModel::new(pending)), config)
    }

    #[test]
    fn test_gestures_disabled_until_model_ready() {
        let mut app = app_with(vec![
            MeshPreparationProgress::in_progress(0.5),
            MeshPreparationProgress::succeeded(),
        ]);
        app.start_preparation();
        assert!(app.is_preparing());
        assert!(!app.gestures.is_enabled());

        assert!(app.poll_model());
        assert!(!app.is_preparing());
        assert!(app.gestures.is_enabled());
    }

    #[test]
    fn test_preparation_starts_once() {
        let mut app = app_with(Vec::new());
        app.start_preparation();
        app.start_preparation();
        assert!(app.preparation_started);
        assert!(app.is_preparing());
    }

    #[test]
    fn test_failed_preparation_keeps_gestures_off() {
        let mut app = app_with(vec![MeshPreparationProgress {
            mesh_progress: 0.3,
            status: PreparationStatus::Failed("bad file".into()),
        }]);
        app.start_preparation();
        assert!(!app.poll_model());
        assert!(!app.is_preparing());
        assert!(!app.gestures.is_enabled());
    }

    #[test]
    fn test_fast_drawing_follows_interaction() {
        let mut app = app_with(vec![MeshPreparationProgress::succeeded()]);
        app.start_preparation();
        app.poll_model();

        app.apply_gesture(CameraGesture::InteractionStarted);
        assert!(app.is_fast_drawing());
        app.apply_gesture(CameraGesture::Orbit {
            anchor: Point2::new(100.0, 100.0),
            current: Point2::new(150.0, 100.0),
        });
        assert!(app.is_fast_drawing());
        app.apply_gesture(CameraGesture::InteractionEnded);
        assert!(!app.is_fast_drawing());
    }

    #[test]
    fn test_double_tap_frames_model() {
        let mut app = app_with(vec![MeshPreparationProgress::succeeded()]);
        app.start_preparation();
        app.poll_model();

        let center = Point2::new(400.0, 300.0);
        app.apply_gesture(CameraGesture::Zoom { scale: 4.0, center });
        let zoomed = app.viewport().camera_location().distance(Point3::new(0.0, 0.0, 0.0));

        app.apply_gesture(CameraGesture::DoubleTap { location: center });
        let framed = app.viewport().camera_location().distance(Point3::new(0.0, 0.0, 0.0));
        assert!(framed > zoomed);
        assert!(app.viewport().frustum().near > 0.0);
    }

    #[test]
    fn test_wheel_ignored_before_ready() {
        let mut app = app_with(Vec::new());
        let before = app.viewport().camera_location();
        app.handle_wheel(MouseScrollDelta::LineDelta(0.0, 3.0));
        assert_eq!(app.viewport().camera_location(), before);
    }
}
