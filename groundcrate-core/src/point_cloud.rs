//! Point cloud container

use crate::bounds::Aabb;
use crate::point::Point3f;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// An ordered collection of points.
///
/// Order is significant: it is the insertion order of the source and every
/// stage that selects points from a cloud keeps their relative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

/// A point cloud with 3D points
pub type PointCloud3f = PointCloud<Point3f>;

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a new point cloud with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, point: T) {
        self.points.push(point);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.points.iter()
    }
}

impl PointCloud<Point3f> {
    /// Bounds of the finite points, or `None` if there are none.
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.points.iter())
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<T> IntoIterator for PointCloud<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> Extend<T> for PointCloud<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            points: Vec::from_iter(iter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_skips_non_finite() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(1.0, 2.0, 3.0),
            Point3f::new(f32::NAN, 0.0, 0.0),
            Point3f::new(-1.0, 5.0, 0.5),
        ]);

        let bounds = cloud.bounding_box().unwrap();
        assert_eq!(bounds.min, Point3f::new(-1.0, 2.0, 0.5));
        assert_eq!(bounds.max, Point3f::new(1.0, 5.0, 3.0));
    }

    #[test]
    fn test_bounding_box_empty() {
        assert!(PointCloud3f::new().bounding_box().is_none());

        let only_nan = PointCloud::from_points(vec![Point3f::new(f32::NAN, f32::NAN, f32::NAN)]);
        assert!(only_nan.bounding_box().is_none());
    }

    #[test]
    fn test_collect_preserves_order() {
        let cloud: PointCloud3f = (0..4).map(|i| Point3f::new(i as f32, 0.0, 0.0)).collect();
        let xs: Vec<f32> = cloud.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
