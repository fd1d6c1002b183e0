//! Axis-aligned bounding boxes in world space

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};

/// Axis-aligned bounding box
///
/// An empty box has `min > max` on every axis; unioning anything with it
/// yields the other operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Box that contains nothing
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Smallest box containing every point
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point3<f64>>,
    {
        points.into_iter().fold(Self::empty(), |mut bbox, p| {
            bbox.include(p);
            bbox
        })
    }

    pub fn include(&mut self, p: Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        if !other.is_valid() {
            return *self;
        }
        if !self.is_valid() {
            return *other;
        }
        let mut bbox = *self;
        bbox.include(other.min);
        bbox.include(other.max);
        bbox
    }

    /// True when min <= max on every axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn center(&self) -> Point3<f64> {
        self.min.midpoint(self.max)
    }

    pub fn diagonal(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Radius of the sphere through all eight corners
    pub fn radius(&self) -> f64 {
        self.diagonal().magnitude() * 0.5
    }

    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let bbox = BoundingBox::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(-1.0, -1.0, -1.0),
        ]);

        assert_eq!(bbox.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.center(), Point3::new(0.0, 0.5, 1.0));
    }

    #[test]
    fn test_empty_box_is_identity_for_union() {
        let empty = BoundingBox::empty();
        assert!(!empty.is_valid());

        let unit = BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(empty.union(&unit), unit);
        assert_eq!(unit.union(&empty), unit);
    }

    #[test]
    fn test_corners_lie_on_radius() {
        let bbox = BoundingBox::new(Point3::new(-1.0, -2.0, -3.0), Point3::new(1.0, 2.0, 3.0));
        let center = bbox.center();
        for corner in bbox.corners() {
            assert!(((corner - center).magnitude() - bbox.radius()).abs() < 1e-12);
        }
    }
}
