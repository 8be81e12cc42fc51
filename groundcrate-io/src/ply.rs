//! PLY format support
//!
//! Only the `x`, `y` and `z` properties of the `vertex` element are read.

use crate::PointCloudReader;
use groundcrate_core::{Error, Point3f, PointCloud3f, Result};
use ply_rs::{
    parser::Parser,
    ply::{DefaultElement, Property},
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

pub struct PlyReader;

impl PlyReader {
    /// Read the vertex positions of a PLY stream (ASCII or binary)
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<PointCloud3f> {
        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(reader)?;

        let Some(vertices) = ply.payload.get("vertex") else {
            debug!("PLY file has no vertex element");
            return Ok(PointCloud3f::new());
        };

        vertices
            .iter()
            .map(|vertex| {
                Ok(Point3f::new(
                    extract_property_value(vertex, "x")?,
                    extract_property_value(vertex, "y")?,
                    extract_property_value(vertex, "z")?,
                ))
            })
            .collect()
    }
}

impl PointCloudReader for PlyReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud3f> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

fn extract_property_value(element: &DefaultElement, name: &str) -> Result<f32> {
    match element.get(name) {
        Some(Property::Float(val)) => Ok(*val),
        Some(Property::Double(val)) => Ok(*val as f32),
        Some(Property::Int(val)) => Ok(*val as f32),
        Some(Property::UInt(val)) => Ok(*val as f32),
        Some(Property::Short(val)) => Ok(*val as f32),
        Some(Property::UShort(val)) => Ok(*val as f32),
        Some(Property::Char(val)) => Ok(*val as f32),
        Some(Property::UChar(val)) => Ok(*val as f32),
        _ => Err(Error::InvalidData(format!(
            "vertex property '{}' not found or not a scalar",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ascii_vertices() {
        let text = "\
ply
format ascii 1.0
element vertex 2
property float x
property float y
property double z
property uchar red
end_header
1 2 3 255
-0.5 0.25 10 0
";
        let cloud = PlyReader::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(cloud.points, vec![Point3f::new(1.0, 2.0, 3.0), Point3f::new(-0.5, 0.25, 10.0)]);
    }

    #[test]
    fn test_integer_coordinates() {
        let text = "\
ply
format ascii 1.0
element vertex 1
property int x
property short y
property uint z
end_header
-4 7 9
";
        let cloud = PlyReader::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(cloud[0], Point3f::new(-4.0, 7.0, 9.0));
    }

    #[test]
    fn test_missing_coordinate_property() {
        let text = "\
ply
format ascii 1.0
element vertex 1
property float x
property float y
end_header
1 2
";
        assert!(matches!(
            PlyReader::read_from(&mut Cursor::new(text)),
            Err(Error::InvalidData(_))
        ));
    }
}
