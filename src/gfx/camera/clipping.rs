//! Near/far plane fitting

use cgmath::InnerSpace;
use log::debug;

use super::viewport::Viewport;
use crate::model::BoundingBox;

/// Far/near ratio limit, keeps depth precision usable
const MAX_DEPTH_RATIO: f64 = 1000.0;

/// Slack added around the box so coplanar faces are not clipped
const DEPTH_PADDING: f64 = 0.01;

/// Computes near and far planes that enclose `bbox` along the camera
/// direction.
///
/// Returns `None` when the box is invalid or entirely behind the camera.
pub fn clipping_planes(viewport: &Viewport, bbox: &BoundingBox) -> Option<(f64, f64)> {
    if !bbox.is_valid() {
        return None;
    }

    let eye = viewport.camera_location();
    let dir = viewport.camera_direction();
    let (min_depth, max_depth) = bbox
        .corners()
        .into_iter()
        .map(|corner| (corner - eye).dot(dir))
        .fold((f64::MAX, f64::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));

    if max_depth <= 0.0 {
        return None;
    }

    let span = (max_depth - min_depth).max(f64::EPSILON);
    let far = max_depth + span * DEPTH_PADDING;
    let near = (min_depth - span * DEPTH_PADDING).max(far / MAX_DEPTH_RATIO);
    Some((near, far))
}

/// Fits the viewport frustum to `bbox`, keeping view angles unchanged.
/// Returns false and leaves the viewport alone when no fit exists.
pub fn fit_clipping_planes(viewport: &mut Viewport, bbox: &BoundingBox) -> bool {
    match clipping_planes(viewport, bbox) {
        Some((near, far)) => {
            debug!("Clipping planes near={:.4} far={:.4}", near, far);
            viewport.set_frustum_near_far(near, far);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;
    use approx::assert_relative_eq;

    #[test]
    fn test_planes_enclose_box() {
        let mut viewport = Viewport::default_for(800, 600);
        let bbox = BoundingBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let lens = viewport.camera_35mm_lens_length();

        assert!(fit_clipping_planes(&mut viewport, &bbox));

        let f = viewport.frustum();
        let center_depth = viewport.target_distance();
        assert!(f.near < center_depth - 3f64.sqrt());
        assert!(f.far > center_depth + 3f64.sqrt());
        assert_relative_eq!(viewport.camera_35mm_lens_length(), lens, epsilon = 1.0e-9);
    }

    #[test]
    fn test_near_plane_limited_by_depth_ratio() {
        let viewport = Viewport::default_for(800, 600);
        // Box reaches past the camera
        let bbox = BoundingBox::new(Point3::new(-20.0, -20.0, -20.0), Point3::new(20.0, 20.0, 20.0));
        let (near, far) = clipping_planes(&viewport, &bbox).unwrap();
        assert_relative_eq!(near, far / MAX_DEPTH_RATIO, epsilon = 1.0e-12);
    }

    #[test]
    fn test_box_behind_camera_is_rejected() {
        let mut viewport = Viewport::default_for(800, 600);
        let before = viewport.frustum();
        let bbox = BoundingBox::new(Point3::new(20.0, 20.0, 20.0), Point3::new(30.0, 30.0, 30.0));

        assert!(!fit_clipping_planes(&mut viewport, &bbox));
        assert_eq!(viewport.frustum(), before);
        assert!(clipping_planes(&viewport, &BoundingBox::empty()).is_none());
    }
}
