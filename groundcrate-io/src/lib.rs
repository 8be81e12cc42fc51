//! I/O for groundcrate
//!
//! Readers for PCD and PLY point clouds, an ASCII PCD writer for the
//! segmentation output, and the `key = value` configuration file loader.

pub mod config;
pub mod pcd;
pub mod ply;

pub use config::{load_config, parse_config, LoadedConfig, DEFAULT_CONFIG_PATH};
pub use pcd::{write_obstacles, write_pcd_ascii, PcdReader, PcdWriter};
pub use ply::PlyReader;

use groundcrate_core::{Error, PointCloud3f, Result};
use std::path::Path;

/// Trait for reading point clouds from files
pub trait PointCloudReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud3f>;
}

/// Trait for writing point clouds to files
pub trait PointCloudWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud3f, path: P) -> Result<()>;
}

/// Read a point cloud, choosing the format from the file extension.
///
/// `.pcd` and `.ply` are recognised, case-insensitively.
pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud3f> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pcd") => PcdReader::read_point_cloud(path),
        Some("ply") => PlyReader::read_point_cloud(path),
        _ => Err(Error::UnsupportedFormat(format!(
            "{}: expected a .pcd or .ply file",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension() {
        let err = read_point_cloud("cloud.xyz").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));

        let err = read_point_cloud("cloud").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_point_cloud("does/not/exist.PCD").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
