//! Ground segmentation pipeline
//!
//! Chains voxel downsampling, the progressive morphological filter and the
//! partition step, driven by a [`SegmentationConfig`].

use crate::filtering::VoxelDownsampler;
use crate::partition::partition_by_indices;
use crate::pmf::ProgressiveMorphologicalFilter;
use groundcrate_core::{PointCloud3f, Result, SegmentationConfig};
use serde::Serialize;
use tracing::{info, warn};

/// Point counts at each stage of a segmentation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentationStats {
    pub input: usize,
    pub downsampled: usize,
    pub ground: usize,
    pub obstacle: usize,
    /// False when the voxel stage was skipped (`voxel_leaf_size <= 0`)
    pub downsampling_applied: bool,
}

/// Output of a segmentation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub ground: PointCloud3f,
    pub obstacle: PointCloud3f,
    pub stats: SegmentationStats,
}

/// Runs the full downsample -> filter -> partition sequence
#[derive(Debug, Clone)]
pub struct GroundSegmentationPipeline {
    config: SegmentationConfig,
}

impl GroundSegmentationPipeline {
    /// Build a pipeline, replacing invalid configuration fields by their
    /// defaults. One warning is logged per replaced field.
    pub fn new(config: SegmentationConfig) -> Self {
        let (config, warnings) = config.validated();
        for warning in &warnings {
            warn!("{}", warning);
        }
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn run(&self, cloud: PointCloud3f) -> Result<Segmentation> {
        let input = cloud.len();
        info!(points = input, "segmentation started");

        let downsampler = VoxelDownsampler::new(self.config.voxel_leaf_size);
        let downsampling_applied = downsampler.is_enabled();
        let downsampled = if downsampling_applied {
            downsampler.apply(&cloud)?
        } else {
            info!(
                leaf_size = self.config.voxel_leaf_size,
                "voxel_leaf_size <= 0, voxel downsampling skipped"
            );
            cloud
        };

        let filter = ProgressiveMorphologicalFilter::from_config(&self.config);
        let ground_indices = filter.extract(&downsampled)?;

        let partition = partition_by_indices(&downsampled, &ground_indices)?;

        let stats = SegmentationStats {
            input,
            downsampled: downsampled.len(),
            ground: partition.ground.len(),
            obstacle: partition.obstacle.len(),
            downsampling_applied,
        };

        info!(
            input = stats.input,
            downsampled = stats.downsampled,
            ground = stats.ground,
            obstacle = stats.obstacle,
            "segmentation complete"
        );

        Ok(Segmentation {
            ground: partition.ground,
            obstacle: partition.obstacle,
            stats,
        })
    }
}

/// Segment `cloud` into ground and obstacle points.
///
/// # Example
/// ```rust
/// use groundcrate_core::{Point3f, PointCloud, SegmentationConfig};
/// use groundcrate_algorithms::segment;
///
/// fn main() -> groundcrate_core::Result<()> {
///     let mut points = Vec::new();
///     for i in 0..10 {
///         for j in 0..10 {
///             points.push(Point3f::new(i as f32, j as f32, 0.0));
///         }
///     }
///     points.push(Point3f::new(5.0, 5.0, 20.0));
///
///     let result = segment(PointCloud::from_points(points), &SegmentationConfig::default())?;
///     assert_eq!(result.stats.ground, 100);
///     assert_eq!(result.stats.obstacle, 1);
///     Ok(())
/// }
/// ```
pub fn segment(cloud: PointCloud3f, config: &SegmentationConfig) -> Result<Segmentation> {
    GroundSegmentationPipeline::new(*config).run(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundcrate_core::Point3f;

    #[test]
    fn test_segment_empty_cloud() {
        let result = segment(PointCloud3f::new(), &SegmentationConfig::default()).unwrap();

        assert!(result.ground.is_empty());
        assert!(result.obstacle.is_empty());
        assert_eq!(result.stats, SegmentationStats {
            downsampling_applied: true,
            ..Default::default()
        });
    }

    #[test]
    fn test_pipeline_repairs_invalid_config() {
        let pipeline = GroundSegmentationPipeline::new(SegmentationConfig {
            max_window_size: 0,
            slope: f32::NAN,
            ..Default::default()
        });

        assert_eq!(pipeline.config().max_window_size, 33);
        assert_eq!(pipeline.config().slope, 1.0);
    }

    #[test]
    fn test_skipped_downsampling_is_reported() {
        let cloud = PointCloud3f::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.01, 0.0, 0.0),
        ]);
        let config = SegmentationConfig {
            voxel_leaf_size: 0.0,
            ..Default::default()
        };

        let result = segment(cloud, &config).unwrap();
        assert!(!result.stats.downsampling_applied);
        assert_eq!(result.stats.downsampled, 2);
        assert_eq!(result.stats.ground + result.stats.obstacle, 2);
    }
}
