//! Core data structures for groundcrate
//!
//! This crate provides the types shared by every stage of the ground
//! segmentation pipeline: points, point clouds, axis-aligned bounds,
//! the segmentation configuration and the common error type.

pub mod point;
pub mod point_cloud;
pub mod bounds;
pub mod config;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use bounds::*;
pub use config::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
