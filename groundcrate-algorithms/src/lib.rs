//! # groundcrate algorithms
//!
//! The ground segmentation engine: voxel downsampling, elevation
//! rasterisation, grey-scale morphology and the progressive morphological
//! filter, plus the pipeline that chains them into a ground / obstacle
//! partition of a point cloud.

pub mod filtering;
pub mod elevation_grid;
pub mod morphology;
pub mod pmf;
pub mod partition;
pub mod pipeline;

// Re-export commonly used items
pub use filtering::*;
pub use elevation_grid::*;
pub use morphology::*;
pub use pmf::*;
pub use partition::*;
pub use pipeline::*;
