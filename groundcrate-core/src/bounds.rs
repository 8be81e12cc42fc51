//! Axis-aligned bounding boxes

use crate::point::{is_finite_point, Point3f, Vector3f};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box of a set of points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3f,
    pub max: Point3f,
}

impl Aabb {
    /// Bounds of the finite points yielded by `points`.
    ///
    /// Returns `None` when no finite point is present.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3f>,
    {
        let mut finite = points.into_iter().filter(|p| is_finite_point(p));
        let first = *finite.next()?;
        let mut min = first;
        let mut max = first;

        for p in finite {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);

            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some(Self { min, max })
    }

    /// Size of the box along each axis
    pub fn extent(&self) -> Vector3f {
        self.max - self.min
    }

    /// True when the planar (x, y) footprint has zero area.
    pub fn is_planar_degenerate(&self) -> bool {
        let e = self.extent();
        e.x <= 0.0 || e.y <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_extent() {
        let points = [Point3f::new(0.0, 0.0, 0.0), Point3f::new(2.0, 4.0, 6.0)];
        let aabb = Aabb::from_points(points.iter()).unwrap();

        assert_relative_eq!(aabb.extent().y, 4.0);
        assert_relative_eq!(aabb.extent().z, 6.0);
        assert!(!aabb.is_planar_degenerate());
    }

    #[test]
    fn test_single_point_is_degenerate() {
        let points = [Point3f::new(1.0, 1.0, 1.0)];
        let aabb = Aabb::from_points(points.iter()).unwrap();
        assert!(aabb.is_planar_degenerate());
    }
}
