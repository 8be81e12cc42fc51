//! Point types

use nalgebra::{Point3, Vector3};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// Returns true when all three coordinates are finite.
///
/// Non-finite points (NaN or infinite coordinates, as produced by sensors
/// for missing returns) cannot be binned and are handled separately by
/// every stage.
#[inline]
pub fn is_finite_point(point: &Point3f) -> bool {
    point.x.is_finite() && point.y.is_finite() && point.z.is_finite()
}
