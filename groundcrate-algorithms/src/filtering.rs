//! Voxel grid downsampling

use groundcrate_core::{is_finite_point, Error, Point3f, PointCloud3f, Result};
use rayon::prelude::*;
use tracing::{debug, info};

/// Integer voxel coordinates of a point.
///
/// Each index is `floor(coordinate / leaf_size)`, so every voxel is the
/// half-open box `[k * leaf, (k + 1) * leaf)` along each axis and a
/// coordinate on a shared face always lands in the same voxel.
///
/// Indices are `i64`: a leaf so small that `|coordinate| / leaf_size`
/// reaches `2^63` has no key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoxelKey {
    pub ix: i64,
    pub iy: i64,
    pub iz: i64,
}

impl VoxelKey {
    /// Key of `point`, or `None` when an index falls outside the `i64` range.
    pub fn of(point: &Point3f, leaf_size: f64) -> Option<Self> {
        let index = |v: f32| {
            let k = (v as f64 / leaf_size).floor();
            // i64::MAX as f64 rounds up to 2^63
            (k >= i64::MIN as f64 && k < i64::MAX as f64).then_some(k as i64)
        };
        Some(Self {
            ix: index(point.x)?,
            iy: index(point.y)?,
            iz: index(point.z)?,
        })
    }
}

/// Reduces point density by replacing the points of each occupied voxel
/// with their centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelDownsampler {
    pub leaf_size: f32,
}

impl VoxelDownsampler {
    pub fn new(leaf_size: f32) -> Self {
        Self { leaf_size }
    }

    /// Whether [`apply`](Self::apply) actually bins points.
    pub fn is_enabled(&self) -> bool {
        self.leaf_size.is_finite() && self.leaf_size > 0.0
    }

    pub fn apply(&self, cloud: &PointCloud3f) -> Result<PointCloud3f> {
        voxel_downsample(cloud, self.leaf_size)
    }
}

/// Voxel grid downsampling
///
/// Partitions space into cubes of edge `leaf_size` and emits the centroid of
/// the points that fall in each occupied cube. Output points are ordered by
/// ascending voxel key `(ix, iy, iz)`, which makes the result independent of
/// thread scheduling.
///
/// A `leaf_size <= 0` disables the stage: the input is returned unchanged.
/// Points with non-finite coordinates are dropped when the stage runs.
///
/// # Errors
/// [`Error::InvalidGeometry`] when `leaf_size` is too small for the
/// coordinates to have a [`VoxelKey`]. No voxels are merged in that case.
///
/// # Example
/// ```rust
/// use groundcrate_core::{PointCloud, Point3f};
/// use groundcrate_algorithms::voxel_downsample;
///
/// let cloud = PointCloud::from_points(vec![
///     Point3f::new(0.0, 0.0, 0.0),
///     Point3f::new(0.05, 0.0, 0.0),
///     Point3f::new(1.0, 1.0, 1.0),
/// ]);
///
/// let downsampled = voxel_downsample(&cloud, 0.1).unwrap();
/// assert_eq!(downsampled.len(), 2);
/// ```
pub fn voxel_downsample(cloud: &PointCloud3f, leaf_size: f32) -> Result<PointCloud3f> {
    if !(leaf_size.is_finite() && leaf_size > 0.0) {
        info!(leaf_size, "voxel downsampling skipped");
        return Ok(cloud.clone());
    }

    if cloud.is_empty() {
        return Ok(PointCloud3f::new());
    }

    let leaf = leaf_size as f64;

    // (key, original index) pairs; sorting them groups each voxel's points
    // together in original order.
    let mut keyed: Vec<(VoxelKey, usize)> = cloud
        .points
        .par_iter()
        .enumerate()
        .filter(|(_, p)| is_finite_point(p))
        .map(|(idx, p)| VoxelKey::of(p, leaf).map(|key| (key, idx)))
        .collect::<Option<_>>()
        .ok_or_else(|| {
            Error::InvalidGeometry(format!(
                "voxel leaf size {} is too small for the cloud's coordinate range",
                leaf_size
            ))
        })?;

    let dropped = cloud.len() - keyed.len();
    if dropped > 0 {
        debug!(dropped, "non-finite points dropped by voxel downsampling");
    }

    keyed.par_sort_unstable();

    let voxels: Vec<&[(VoxelKey, usize)]> = keyed.chunk_by(|a, b| a.0 == b.0).collect();

    let points: Vec<Point3f> = voxels
        .par_iter()
        .map(|members| centroid(cloud, members))
        .collect();

    info!(
        input = cloud.len(),
        output = points.len(),
        leaf_size,
        "voxel downsampling complete"
    );

    Ok(PointCloud3f::from_points(points))
}

fn centroid(cloud: &PointCloud3f, members: &[(VoxelKey, usize)]) -> Point3f {
    let (sx, sy, sz) = members.iter().fold((0.0f64, 0.0f64, 0.0f64), |(sx, sy, sz), &(_, idx)| {
        let p = &cloud.points[idx];
        (sx + p.x as f64, sy + p.y as f64, sz + p.z as f64)
    });
    let n = members.len() as f64;
    Point3f::new((sx / n) as f32, (sy / n) as f32, (sz / n) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_voxel_downsample_empty_cloud() {
        let cloud = PointCloud3f::new();
        assert!(voxel_downsample(&cloud, 0.1).unwrap().is_empty());
    }

    #[test]
    fn test_voxel_downsample_centroid() {
        let cloud = PointCloud3f::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.05, 0.0, 0.0),
        ]);

        let downsampled = voxel_downsample(&cloud, 0.1).unwrap();
        assert_eq!(downsampled.len(), 1);
        assert_relative_eq!(downsampled[0].x, 0.025, epsilon = 1e-6);
        assert_relative_eq!(downsampled[0].y, 0.0);
        assert_relative_eq!(downsampled[0].z, 0.0);
    }

    #[test]
    fn test_voxel_downsample_disabled_is_identity() {
        let cloud = PointCloud3f::from_points(vec![
            Point3f::new(3.0, 0.0, 0.0),
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.0, 0.0, 0.0),
        ]);

        assert_eq!(voxel_downsample(&cloud, 0.0).unwrap(), cloud);
        assert_eq!(voxel_downsample(&cloud, -1.0).unwrap(), cloud);
        assert!(!VoxelDownsampler::new(0.0).is_enabled());
    }

    #[test]
    fn test_voxel_downsample_orders_by_key() {
        let cloud = PointCloud3f::from_points(vec![
            Point3f::new(2.5, 0.0, 0.0),
            Point3f::new(-1.5, 0.0, 0.0),
            Point3f::new(0.5, 0.0, 0.0),
        ]);

        let downsampled = voxel_downsample(&cloud, 1.0).unwrap();
        let xs: Vec<f32> = downsampled.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![-1.5, 0.5, 2.5]);
    }

    #[test]
    fn test_voxel_key_boundary_floors() {
        assert_eq!(
            VoxelKey::of(&Point3f::new(1.0, -1.0, 0.0), 1.0),
            Some(VoxelKey { ix: 1, iy: -1, iz: 0 })
        );
        assert_eq!(
            VoxelKey::of(&Point3f::new(-0.5, 0.999, 0.0), 1.0),
            Some(VoxelKey { ix: -1, iy: 0, iz: 0 })
        );
    }

    #[test]
    fn test_voxel_downsample_drops_non_finite() {
        let cloud = PointCloud3f::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(f32::NAN, 0.0, 0.0),
            Point3f::new(f32::INFINITY, 0.0, 0.0),
        ]);

        assert_eq!(voxel_downsample(&cloud, 0.1).unwrap().len(), 1);
    }

    #[test]
    fn test_voxel_downsample_never_grows() {
        let cloud: PointCloud3f = (0..200)
            .map(|i| {
                Point3f::new((i % 13) as f32 * 0.07, (i % 7) as f32 * 0.11, (i % 3) as f32 * 0.05)
            })
            .collect();

        for leaf in [0.01, 0.1, 0.5, 10.0] {
            assert!(voxel_downsample(&cloud, leaf).unwrap().len() <= cloud.len());
        }
        assert_eq!(voxel_downsample(&cloud, 10.0).unwrap().len(), 1);
    }

    #[test]
    fn test_key_out_of_range_is_rejected() {
        assert_eq!(VoxelKey::of(&Point3f::new(1.0e20, 0.0, 0.0), 1.0), None);
        assert_eq!(VoxelKey::of(&Point3f::new(0.0, -1.0e19, 0.0), 1.0), None);
        assert!(VoxelKey::of(&Point3f::new(1.0e18, -1.0e18, 0.0), 1.0).is_some());

        // both points would share the saturated key if it were clamped
        let cloud = PointCloud3f::from_points(vec![
            Point3f::new(1.0e30, 0.0, 0.0),
            Point3f::new(2.0e30, 0.0, 0.0),
        ]);
        assert!(matches!(
            voxel_downsample(&cloud, 1.0e-3),
            Err(Error::InvalidGeometry(_))
        ));
        assert_eq!(voxel_downsample(&cloud, 1.0e12).unwrap().len(), 2);
    }
}
