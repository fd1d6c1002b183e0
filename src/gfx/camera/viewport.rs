//! Viewport camera model
//!
//! A [`Viewport`] is camera location, direction and up vector, a view
//! frustum and the screen port it maps onto. World up is +Z. The target
//! point always lies on the camera axis; every operation that moves the
//! camera keeps it there.
//!
//! Screen coordinates are pixels with the origin in the top-left corner
//! and y growing downward, matching touch and cursor positions.

use cgmath::{
    ortho, EuclideanSpace, InnerSpace, Matrix4, Point2, Point3, Quaternion, Rad, Rotation,
    Rotation3, Vector2, Vector3,
};
use log::debug;

use super::camera_utils::{convert_matrix4_to_array, Camera};
use crate::model::BoundingBox;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f64> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Half of the short side of a 35mm film frame, in millimetres
const FILM_HALF_SHORT_SIDE: f64 = 12.0;

/// Smallest angle allowed between the camera direction and the world Z axis
const MIN_POLAR_ANGLE: f64 = 1.0e-3;

pub type ScreenPoint = Point2<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Perspective,
    Parallel,
}

/// How [`Viewport::magnify`] realizes a zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnifyMode {
    /// Move the camera toward the target
    Dolly,
    /// Narrow the frustum, camera stays put
    Frustum,
}

/// Pixel rectangle the frustum maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPort {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl ScreenPort {
    pub fn width(&self) -> i32 {
        (self.right - self.left).abs()
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).abs()
    }

    pub fn size(&self) -> Vector2<f64> {
        Vector2::new(self.width() as f64, self.height() as f64)
    }

    pub fn aspect(&self) -> f64 {
        if self.height() == 0 {
            1.0
        } else {
            self.width() as f64 / self.height() as f64
        }
    }
}

/// View frustum in camera coordinates. For perspective projections the
/// left/right/bottom/top extents are measured on the near plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub near: f64,
    pub far: f64,
}

impl Frustum {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn aspect(&self) -> f64 {
        if self.height() == 0.0 {
            1.0
        } else {
            self.width() / self.height()
        }
    }
}

/// A viewport stored with a model
#[derive(Debug, Clone)]
pub struct NamedView {
    pub name: String,
    pub viewport: Viewport,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    camera_location: Point3<f64>,
    camera_direction: Vector3<f64>,
    camera_up: Vector3<f64>,
    target_point: Point3<f64>,
    frustum: Frustum,
    screen_port: ScreenPort,
    projection: Projection,
}

impl Camera for Viewport {
    fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        let m = self.view_projection();
        Matrix4::from(convert_matrix4_to_array(m))
    }
}

impl Viewport {
    /// Viewport used when a model carries no perspective view: camera at
    /// (10, 10, 10) looking at the origin, 50mm lens.
    pub fn default_for(width: u32, height: u32) -> Self {
        let mut viewport = Self {
            camera_location: Point3::new(10.0, 10.0, 10.0),
            camera_direction: Vector3::new(-1.0, -1.0, -1.0).normalize(),
            camera_up: Vector3::unit_z(),
            target_point: Point3::origin(),
            frustum: Frustum {
                left: -1.0,
                right: 1.0,
                bottom: -1.0,
                top: 1.0,
                near: 0.1,
                far: 1000.0,
            },
            screen_port: ScreenPort {
                left: 0,
                right: width as i32,
                top: 0,
                bottom: height as i32,
            },
            projection: Projection::Perspective,
        };
        viewport.orthonormalize();
        viewport.set_frustum_aspect(viewport.screen_port_aspect());
        viewport.set_camera_35mm_lens_length(50.0);
        viewport
    }

    /// Builds the viewport for a freshly prepared model.
    ///
    /// The first perspective view stored with the model wins; otherwise the
    /// default camera is dollied out until the model fits.
    pub fn setup(views: &[NamedView], bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let stored = views
            .iter()
            .find(|view| view.viewport.projection == Projection::Perspective);

        let mut viewport = match stored {
            Some(view) => {
                debug!("Using stored view '{}'", view.name);
                view.viewport.clone()
            }
            None => {
                let mut viewport = Self::default_for(width, height);
                viewport.dolly_extents(bbox, 1.0);
                viewport
            }
        };

        viewport.orthonormalize();
        viewport.resize(width, height);
        super::clipping::fit_clipping_planes(&mut viewport, bbox);
        viewport
    }

    pub fn camera_location(&self) -> Point3<f64> {
        self.camera_location
    }

    pub fn camera_direction(&self) -> Vector3<f64> {
        self.camera_direction
    }

    pub fn camera_up(&self) -> Vector3<f64> {
        self.camera_up
    }

    /// Unit vector pointing to the right on screen
    pub fn camera_right(&self) -> Vector3<f64> {
        self.camera_direction.cross(self.camera_up).normalize()
    }

    pub fn target_point(&self) -> Point3<f64> {
        self.target_point
    }

    pub fn frustum(&self) -> Frustum {
        self.frustum
    }

    pub fn screen_port(&self) -> ScreenPort {
        self.screen_port
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    /// Distance from the camera to the target point
    pub fn target_distance(&self) -> f64 {
        (self.target_point - self.camera_location).dot(self.camera_direction)
    }

    pub fn set_camera_location(&mut self, location: Point3<f64>) {
        let distance = self.target_distance();
        self.camera_location = location;
        self.place_target_on_axis(distance);
    }

    /// Sets the view direction. Zero vectors are ignored. The up vector is
    /// re-orthogonalized against the new direction.
    pub fn set_camera_direction(&mut self, direction: Vector3<f64>) {
        if direction.magnitude2() == 0.0 {
            return;
        }
        let distance = self.target_distance();
        self.camera_direction = direction.normalize();
        self.orthonormalize();
        self.place_target_on_axis(distance);
    }

    pub fn set_camera_up(&mut self, up: Vector3<f64>) {
        if up.magnitude2() == 0.0 {
            return;
        }
        self.camera_up = up;
        self.orthonormalize();
    }

    /// Moves the target along the camera axis to `distance` in front of the camera
    pub fn set_target_distance(&mut self, distance: f64) {
        self.place_target_on_axis(distance);
    }

    pub fn set_screen_port(&mut self, left: i32, right: i32, top: i32, bottom: i32) {
        self.screen_port = ScreenPort {
            left,
            right,
            top,
            bottom,
        };
    }

    pub fn screen_port_aspect(&self) -> f64 {
        self.screen_port.aspect()
    }

    pub fn set_frustum(&mut self, frustum: Frustum) {
        self.frustum = frustum;
    }

    pub fn frustum_aspect(&self) -> f64 {
        self.frustum.aspect()
    }

    /// Changes the frustum aspect ratio. The shorter side keeps its extent
    /// and the longer side grows to match, so the narrowest view angle is
    /// preserved across rotations of the device.
    pub fn set_frustum_aspect(&mut self, aspect: f64) {
        if !(aspect.is_finite() && aspect > 0.0) {
            return;
        }
        let f = &mut self.frustum;
        let cx = 0.5 * (f.left + f.right);
        let cy = 0.5 * (f.bottom + f.top);
        let short = f.width().abs().min(f.height().abs());

        let (half_w, half_h) = if aspect >= 1.0 {
            (0.5 * short * aspect, 0.5 * short)
        } else {
            (0.5 * short, 0.5 * short / aspect)
        };
        f.left = cx - half_w;
        f.right = cx + half_w;
        f.bottom = cy - half_h;
        f.top = cy + half_h;
    }

    /// Replaces near and far. Perspective extents are rescaled so the view
    /// angles stay the same.
    pub fn set_frustum_near_far(&mut self, near: f64, far: f64) {
        if !(near > 0.0 && far > near) {
            return;
        }
        if self.projection == Projection::Perspective {
            let s = near / self.frustum.near;
            self.frustum.left *= s;
            self.frustum.right *= s;
            self.frustum.bottom *= s;
            self.frustum.top *= s;
        }
        self.frustum.near = near;
        self.frustum.far = far;
    }

    /// Sets the view angle from a focal length on 35mm film, measured
    /// across the shorter side of the frustum.
    pub fn set_camera_35mm_lens_length(&mut self, lens_length: f64) {
        if self.projection != Projection::Perspective || !(lens_length > 0.0) {
            return;
        }
        let aspect = self.frustum.aspect();
        let half_short = self.frustum.near * FILM_HALF_SHORT_SIDE / lens_length;
        let (half_w, half_h) = if aspect >= 1.0 {
            (half_short * aspect, half_short)
        } else {
            (half_short, half_short / aspect)
        };
        self.frustum.left = -half_w;
        self.frustum.right = half_w;
        self.frustum.bottom = -half_h;
        self.frustum.top = half_h;
    }

    pub fn camera_35mm_lens_length(&self) -> f64 {
        let half_short = 0.5 * self.frustum.width().abs().min(self.frustum.height().abs());
        if half_short == 0.0 {
            return 0.0;
        }
        FILM_HALF_SHORT_SIDE * self.frustum.near / half_short
    }

    /// Adapts the viewport to a new surface size. Zero extents are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.set_screen_port(0, width as i32, 0, height as i32);
        self.set_frustum_aspect(width as f64 / height as f64);
    }

    /// Orbits the camera around the target point.
    ///
    /// Horizontal motion spins about world Z, vertical motion tilts about the
    /// camera's right axis, at `π / min(width, height)` radians per pixel.
    /// Tilting stops just short of looking straight up or down.
    pub fn gesture_orbit(
        &mut self,
        view_size: Vector2<f64>,
        anchor: ScreenPoint,
        current: ScreenPoint,
    ) {
        let short_side = view_size.x.min(view_size.y);
        if !(short_side > 0.0) {
            return;
        }
        let radians_per_pixel = std::f64::consts::PI / short_side;
        let yaw = -(current.x - anchor.x) * radians_per_pixel;
        let mut pitch = -(current.y - anchor.y) * radians_per_pixel;

        // Camera goes up when pitch is negative, which moves the direction
        // away from +Z.
        let polar = self.camera_direction.dot(Vector3::unit_z()).clamp(-1.0, 1.0).acos();
        let wanted = (polar - pitch).clamp(MIN_POLAR_ANGLE, std::f64::consts::PI - MIN_POLAR_ANGLE);
        pitch = polar - wanted;

        if pitch != 0.0 {
            let right = self.camera_right();
            self.rotate_about_target(Quaternion::from_axis_angle(right, Rad(pitch)));
        }
        if yaw != 0.0 {
            self.rotate_about_target(Quaternion::from_axis_angle(Vector3::unit_z(), Rad(yaw)));
        }
    }

    /// Slides camera and target in the view plane so the scene point under
    /// `start` ends up under `end`.
    pub fn lateral_pan(&mut self, start: ScreenPoint, end: ScreenPoint) {
        let port = self.screen_port.size();
        if port.x <= 0.0 || port.y <= 0.0 {
            return;
        }
        let from = self.screen_to_target_plane_in(start, port);
        let to = self.screen_to_target_plane_in(end, port);
        let delta = from - to;
        self.camera_location += delta;
        self.target_point += delta;
    }

    /// Zooms by `scale` (greater than one zooms in) keeping the scene point
    /// under `zoom_point` fixed on screen. Returns false when the scale is
    /// not a positive finite number.
    pub fn magnify(
        &mut self,
        view_size: Vector2<f64>,
        scale: f64,
        mode: MagnifyMode,
        zoom_point: ScreenPoint,
    ) -> bool {
        if !(scale.is_finite() && scale > 0.0) || view_size.x <= 0.0 || view_size.y <= 0.0 {
            return false;
        }

        match (mode, self.projection) {
            (MagnifyMode::Dolly, Projection::Perspective) => {
                let distance = self.target_distance();
                let fixed = self.screen_to_target_plane_in(zoom_point, view_size);
                let target = fixed + (self.target_point - fixed) / scale;
                self.camera_location = target - self.camera_direction * (distance / scale);
                self.target_point = target;
            }
            _ => {
                let (x0, y0) = self.near_plane_coordinates(zoom_point, view_size);
                let f = &mut self.frustum;
                f.left = x0 + (f.left - x0) / scale;
                f.right = x0 + (f.right - x0) / scale;
                f.bottom = y0 + (f.bottom - y0) / scale;
                f.top = y0 + (f.top - y0) / scale;
            }
        }
        true
    }

    /// Centres the target on `bbox` and backs the camera away along its
    /// direction until the bounding sphere, grown by `border`, fits the view.
    pub fn dolly_extents(&mut self, bbox: &BoundingBox, border: f64) -> bool {
        if !bbox.is_valid() {
            return false;
        }
        let mut radius = bbox.radius() * border.max(f64::EPSILON);
        if radius <= 0.0 {
            radius = 1.0;
        }
        let center = bbox.center();

        match self.projection {
            Projection::Perspective => {
                let f = self.frustum;
                let tan_half = (0.5 * f.width().abs()).min(0.5 * f.height().abs()) / f.near;
                let half_angle = tan_half.atan();
                let distance = radius / half_angle.sin();
                self.camera_location = center - self.camera_direction * distance;
                self.target_point = center;
                if f.far < distance + radius {
                    self.set_frustum_near_far(f.near, distance + radius);
                }
            }
            Projection::Parallel => {
                let distance = 2.0 * radius;
                self.camera_location = center - self.camera_direction * distance;
                self.target_point = center;
                let aspect = self.frustum.aspect();
                let (half_w, half_h) = if aspect >= 1.0 {
                    (radius * aspect, radius)
                } else {
                    (radius, radius / aspect)
                };
                self.frustum.left = -half_w;
                self.frustum.right = half_w;
                self.frustum.bottom = -half_h;
                self.frustum.top = half_h;
                self.frustum.far = self.frustum.far.max(distance + radius);
            }
        }
        true
    }

    pub fn view_matrix(&self) -> Matrix4<f64> {
        Matrix4::look_to_rh(self.camera_location, self.camera_direction, self.camera_up)
    }

    /// Projection with wgpu's `[0, 1]` depth range
    pub fn projection_matrix(&self) -> Matrix4<f64> {
        let f = self.frustum;
        let proj = match self.projection {
            Projection::Perspective => cgmath::frustum(f.left, f.right, f.bottom, f.top, f.near, f.far),
            Projection::Parallel => ortho(f.left, f.right, f.bottom, f.top, f.near, f.far),
        };
        OPENGL_TO_WGPU_MATRIX * proj
    }

    pub fn view_projection(&self) -> Matrix4<f64> {
        self.projection_matrix() * self.view_matrix()
    }

    /// Projects a world point to screen pixels. `None` for points behind a
    /// perspective camera.
    pub fn world_to_screen(&self, point: Point3<f64>) -> Option<ScreenPoint> {
        let clip = self.view_projection() * point.to_homogeneous();
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let size = self.screen_port.size();
        Some(Point2::new(
            self.screen_port.left as f64 + (ndc.x + 1.0) * 0.5 * size.x,
            self.screen_port.top as f64 + (1.0 - ndc.y) * 0.5 * size.y,
        ))
    }

    /// World point under `point` on the plane through the target point
    /// facing the camera
    pub fn screen_to_target_plane(&self, point: ScreenPoint) -> Point3<f64> {
        self.screen_to_target_plane_in(point, self.screen_port.size())
    }

    fn screen_to_target_plane_in(&self, point: ScreenPoint, view_size: Vector2<f64>) -> Point3<f64> {
        let (x, y) = self.near_plane_coordinates(point, view_size);
        let right = self.camera_right();
        let up = self.camera_up;
        let depth = self.target_distance();
        match self.projection {
            Projection::Perspective => {
                let on_near =
                    self.camera_direction * self.frustum.near + right * x + up * y;
                self.camera_location + on_near * (depth / self.frustum.near)
            }
            Projection::Parallel => {
                self.camera_location + self.camera_direction * depth + right * x + up * y
            }
        }
    }

    /// Maps a screen point to camera-space x/y on the near plane
    fn near_plane_coordinates(&self, point: ScreenPoint, view_size: Vector2<f64>) -> (f64, f64) {
        let u = (point.x - self.screen_port.left as f64) / view_size.x;
        let v = (point.y - self.screen_port.top as f64) / view_size.y;
        let f = self.frustum;
        (f.left + u * f.width(), f.top - v * f.height())
    }

    fn rotate_about_target(&mut self, rotation: Quaternion<f64>) {
        let offset = self.camera_location - self.target_point;
        self.camera_location = self.target_point + rotation.rotate_vector(offset);
        self.camera_direction = rotation.rotate_vector(self.camera_direction).normalize();
        self.camera_up = rotation.rotate_vector(self.camera_up);
        self.orthonormalize();
    }

    fn place_target_on_axis(&mut self, distance: f64) {
        let distance = if distance > 0.0 {
            distance
        } else {
            (self.target_point - self.camera_location).magnitude().max(1.0)
        };
        self.target_point = self.camera_location + self.camera_direction * distance;
    }

    /// Unitizes the direction and makes up perpendicular to it. An up vector
    /// parallel to the direction is replaced by world Z (or Y when looking
    /// straight along Z).
    fn orthonormalize(&mut self) {
        self.camera_direction = self.camera_direction.normalize();
        let d = self.camera_direction;
        let mut up = self.camera_up - d * self.camera_up.dot(d);
        if up.magnitude2() < 1.0e-12 {
            let fallback = if d.z.abs() > 0.999 {
                Vector3::unit_y()
            } else {
                Vector3::unit_z()
            };
            up = fallback - d * fallback.dot(d);
        }
        self.camera_up = up.normalize();
        let distance = self.target_distance();
        self.place_target_on_axis(distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const EPS: f64 = 1.0e-6;

    fn close(a: f64, b: f64) -> bool {
        approx::relative_eq!(a, b, epsilon = EPS, max_relative = EPS)
    }

    fn close_points(a: ScreenPoint, b: ScreenPoint) -> bool {
        (a.x - b.x).abs() < 1.0e-4 && (a.y - b.y).abs() < 1.0e-4
    }

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::default_for(800, 600);

        assert!(close(viewport.camera_direction().magnitude(), 1.0));
        assert!(close(viewport.camera_up().dot(viewport.camera_direction()), 0.0));
        assert!(viewport.camera_up().z > 0.0);
        assert!(close(viewport.camera_35mm_lens_length(), 50.0));
        assert!(close(viewport.frustum_aspect(), 800.0 / 600.0));
        assert!(close(viewport.target_distance(), 300f64.sqrt()));
    }

    #[test]
    fn test_up_vector_matches_plane_y_axis() {
        // Up for a camera looking down (-1,-1,-1) is the Y axis of the plane
        // with that normal: (-1,-1,2)/sqrt(6).
        let up = Viewport::default_for(100, 100).camera_up();
        let expected = Vector3::new(-1.0, -1.0, 2.0) / 6f64.sqrt();
        assert!((up - expected).magnitude() < EPS);
    }

    #[test]
    fn test_resize_keeps_shorter_extent() {
        let mut viewport = Viewport::default_for(800, 600);
        let short = viewport.frustum().height();

        viewport.resize(600, 800);
        assert!(close(viewport.frustum().width(), short));
        assert!(close(viewport.frustum_aspect(), 0.75));
        assert!(close(viewport.camera_35mm_lens_length(), 50.0));

        viewport.resize(0, 300);
        assert_eq!(viewport.screen_port().width(), 600);
    }

    #[test]
    fn test_horizontal_orbit_spins_about_world_z() {
        let mut viewport = Viewport::default_for(400, 400);
        let z_before = viewport.camera_location().z;
        let distance = viewport.target_distance();

        viewport.gesture_orbit(
            Vector2::new(400.0, 400.0),
            Point2::new(0.0, 200.0),
            Point2::new(400.0, 200.0),
        );

        assert!(close(viewport.camera_location().z, z_before));
        assert!(close(viewport.target_distance(), distance));
        // Dragging across a whole square view is a half turn.
        assert!(close(viewport.camera_location().x, -10.0));
        assert!(close(viewport.camera_location().y, -10.0));
    }

    #[test]
    fn test_dragging_down_raises_camera() {
        let mut viewport = Viewport::default_for(400, 400);
        let z_before = viewport.camera_location().z;
        viewport.gesture_orbit(
            Vector2::new(400.0, 400.0),
            Point2::new(200.0, 200.0),
            Point2::new(200.0, 220.0),
        );
        assert!(viewport.camera_location().z > z_before);
    }

    #[test]
    fn test_vertical_orbit_stops_at_pole() {
        let mut viewport = Viewport::default_for(400, 400);
        for _ in 0..10 {
            viewport.gesture_orbit(
                Vector2::new(400.0, 400.0),
                Point2::new(200.0, 0.0),
                Point2::new(200.0, 400.0),
            );
        }
        let d = viewport.camera_direction();
        assert!(d.z < 0.0);
        assert!(d.z > -1.0);
        assert!(viewport.camera_up().magnitude() > 0.5);
        assert!(viewport.camera_up().dot(d).abs() < EPS);
    }

    #[test]
    fn test_random_orbits_keep_camera_orthonormal() {
        let mut rng = rand::rng();
        let mut viewport = Viewport::default_for(640, 480);
        let distance = viewport.target_distance();
        let size = Vector2::new(640.0, 480.0);

        for _ in 0..500 {
            let anchor = Point2::new(rng.random_range(0.0..640.0), rng.random_range(0.0..480.0));
            let current = Point2::new(
                anchor.x + rng.random_range(-50.0..50.0),
                anchor.y + rng.random_range(-50.0..50.0),
            );
            viewport.gesture_orbit(size, anchor, current);

            assert!(close(viewport.target_distance(), distance));
            assert!(close(viewport.camera_direction().magnitude(), 1.0));
            assert!(close(viewport.camera_up().magnitude(), 1.0));
            assert!(viewport.camera_up().dot(viewport.camera_direction()).abs() < EPS);
            assert!((viewport.target_point() - Point3::origin()).magnitude() < 1.0e-6);
        }
    }

    #[test]
    fn test_lateral_pan_follows_finger() {
        let mut viewport = Viewport::default_for(800, 600);
        let start = Point2::new(400.0, 300.0);
        let end = Point2::new(520.0, 250.0);
        let grabbed = viewport.screen_to_target_plane(start);
        let distance = viewport.target_distance();
        let direction = viewport.camera_direction();

        viewport.lateral_pan(start, end);

        let landed = viewport.world_to_screen(grabbed).unwrap();
        assert!(close_points(landed, end), "{:?} != {:?}", landed, end);
        assert!(close(viewport.target_distance(), distance));
        assert!((viewport.camera_direction() - direction).magnitude() < EPS);
    }

    #[test]
    fn test_dolly_magnify_keeps_zoom_point_fixed() {
        let mut viewport = Viewport::default_for(800, 600);
        let size = Vector2::new(800.0, 600.0);
        let zoom_point = Point2::new(600.0, 150.0);
        let fixed = viewport.screen_to_target_plane(zoom_point);
        let distance = viewport.target_distance();

        assert!(viewport.magnify(size, 2.0, MagnifyMode::Dolly, zoom_point));

        assert!(close(viewport.target_distance(), distance / 2.0));
        let landed = viewport.world_to_screen(fixed).unwrap();
        assert!(close_points(landed, zoom_point));
    }

    #[test]
    fn test_frustum_magnify_keeps_zoom_point_fixed() {
        let mut viewport = Viewport::default_for(800, 600);
        let size = Vector2::new(800.0, 600.0);
        let zoom_point = Point2::new(100.0, 500.0);
        let fixed = viewport.screen_to_target_plane(zoom_point);
        let location = viewport.camera_location();
        let lens = viewport.camera_35mm_lens_length();

        assert!(viewport.magnify(size, 1.5, MagnifyMode::Frustum, zoom_point));

        assert_eq!(viewport.camera_location(), location);
        assert!(close(viewport.camera_35mm_lens_length(), lens * 1.5));
        let landed = viewport.world_to_screen(fixed).unwrap();
        assert!(close_points(landed, zoom_point));
    }

    #[test]
    fn test_magnify_rejects_degenerate_scale() {
        let mut viewport = Viewport::default_for(800, 600);
        let size = Vector2::new(800.0, 600.0);
        let center = Point2::new(400.0, 300.0);
        let location = viewport.camera_location();

        assert!(!viewport.magnify(size, 0.0, MagnifyMode::Dolly, center));
        assert!(!viewport.magnify(size, -2.0, MagnifyMode::Dolly, center));
        assert!(!viewport.magnify(size, f64::NAN, MagnifyMode::Dolly, center));
        assert!(!viewport.magnify(size, f64::INFINITY, MagnifyMode::Dolly, center));
        assert_eq!(viewport.camera_location(), location);
    }

    #[test]
    fn test_dolly_extents_frames_whole_box() {
        let bbox = BoundingBox::new(Point3::new(5.0, 5.0, 0.0), Point3::new(25.0, 9.0, 3.0));
        for (w, h) in [(800, 600), (600, 800)] {
            let mut viewport = Viewport::default_for(w, h);
            assert!(viewport.dolly_extents(&bbox, 1.0));
            assert_eq!(viewport.target_point(), bbox.center());

            for corner in bbox.corners() {
                let p = viewport.world_to_screen(corner).unwrap();
                assert!(p.x >= 0.0 && p.x <= w as f64, "{:?}", p);
                assert!(p.y >= 0.0 && p.y <= h as f64, "{:?}", p);
            }
        }
    }

    #[test]
    fn test_dolly_extents_rejects_empty_box() {
        let mut viewport = Viewport::default_for(800, 600);
        assert!(!viewport.dolly_extents(&BoundingBox::empty(), 1.0));
    }

    #[test]
    fn test_setup_prefers_stored_perspective_view() {
        let mut parallel = Viewport::default_for(100, 100);
        parallel.set_projection(Projection::Parallel);
        let mut perspective = Viewport::default_for(100, 100);
        perspective.set_camera_location(Point3::new(0.0, -20.0, 0.0));
        perspective.set_camera_direction(Vector3::new(0.0, 2.0, 0.0));

        let views = vec![
            NamedView {
                name: "Top".to_owned(),
                viewport: parallel,
            },
            NamedView {
                name: "Perspective".to_owned(),
                viewport: perspective,
            },
        ];

        let viewport = Viewport::setup(&views, &unit_box(), 320, 240);
        assert_eq!(viewport.projection(), Projection::Perspective);
        assert_eq!(viewport.camera_location(), Point3::new(0.0, -20.0, 0.0));
        assert!((viewport.camera_direction() - Vector3::unit_y()).magnitude() < EPS);
        assert_eq!(viewport.screen_port().width(), 320);
        assert!(close(viewport.frustum_aspect(), 320.0 / 240.0));
    }

    #[test]
    fn test_setup_without_views_fits_model() {
        let viewport = Viewport::setup(&[], &unit_box(), 320, 240);
        let target = viewport.target_point();
        assert!(close(target.x, 0.0) && close(target.y, 0.0) && close(target.z, 0.0), "{:?}", target);
        for corner in unit_box().corners() {
            assert!(viewport.world_to_screen(corner).is_some());
        }
        let f = viewport.frustum();
        assert!(f.near > 0.0 && f.far > f.near);
    }

    #[test]
    fn test_view_projection_maps_target_to_center() {
        let viewport = Viewport::default_for(800, 600);
        let center = viewport.world_to_screen(viewport.target_point()).unwrap();
        assert!(close_points(center, Point2::new(400.0, 300.0)));
    }

    #[test]
    fn test_screen_to_target_plane_projects_back() {
        let viewport = Viewport::default_for(800, 600);
        for point in [Point2::new(10.0, 20.0), Point2::new(640.0, 90.0), Point2::new(777.0, 555.0)] {
            let world = viewport.screen_to_target_plane(point);
            let screen = viewport.world_to_screen(world).unwrap();
            assert!(close_points(screen, point), "{:?} != {:?}", screen, point);
        }
    }

    #[test]
    fn test_projection_maps_near_and_far_to_unit_depth() {
        let viewport = Viewport::default_for(800, 600);
        let f = viewport.frustum();
        let eye = viewport.camera_location();
        let dir = viewport.camera_direction();
        let view_proj = viewport.view_projection();

        let near = view_proj * (eye + dir * f.near).to_homogeneous();
        let far = view_proj * (eye + dir * f.far).to_homogeneous();
        approx::assert_relative_eq!(near.z / near.w, 0.0, epsilon = EPS);
        approx::assert_relative_eq!(far.z / far.w, 1.0, epsilon = EPS);
        approx::assert_relative_eq!(near.w, f.near, epsilon = EPS);
    }
}
