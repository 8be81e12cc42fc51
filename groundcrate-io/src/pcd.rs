//! PCD (Point Cloud Data) format support
//!
//! Reads `ascii` and `binary` PCD files, keeping only the `x`, `y` and `z`
//! fields, and writes ASCII PCD v0.7 files with those three fields.

use crate::{PointCloudReader, PointCloudWriter};
use groundcrate_core::{Error, Point3f, PointCloud3f, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// PCD data section encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdDataFormat {
    Ascii,
    Binary,
    BinaryCompressed,
}

/// A field declared in a PCD header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcdField {
    pub name: String,
    /// Bytes per element
    pub size: usize,
    /// `I`, `U` or `F`
    pub kind: char,
    /// Elements per point
    pub count: usize,
}

/// PCD header information
#[derive(Debug, Clone, PartialEq)]
pub struct PcdHeader {
    pub version: String,
    pub fields: Vec<PcdField>,
    pub width: usize,
    pub height: usize,
    pub points: usize,
    pub data_format: PcdDataFormat,
}

impl PcdHeader {
    /// Position of `name` as `(value offset, byte offset)` within one point record
    fn locate(&self, name: &str) -> Result<(usize, usize, &PcdField)> {
        let mut value_offset = 0;
        let mut byte_offset = 0;
        for field in &self.fields {
            if field.name == name {
                return Ok((value_offset, byte_offset, field));
            }
            value_offset += field.count;
            byte_offset += field.size * field.count;
        }
        Err(Error::InvalidData(format!("PCD file has no '{}' field", name)))
    }

    /// Bytes per point in a binary data section
    fn record_size(&self) -> usize {
        self.fields.iter().map(|f| f.size * f.count).sum()
    }
}

/// Upper bound on the capacity reserved from a header's point count
const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

pub struct PcdReader;

impl PcdReader {
    /// Read a PCD stream
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<PointCloud3f> {
        let header = Self::read_header(reader)?;
        debug!(
            version = %header.version,
            width = header.width,
            height = header.height,
            points = header.points,
            "PCD header read"
        );

        match header.data_format {
            PcdDataFormat::Ascii => Self::read_ascii_points(reader, &header),
            PcdDataFormat::Binary => Self::read_binary_points(reader, &header),
            PcdDataFormat::BinaryCompressed => Err(Error::UnsupportedFormat(
                "binary_compressed PCD data is not supported".to_string(),
            )),
        }
    }

    /// Read the header, up to and including the `DATA` line
    pub fn read_header<R: BufRead>(reader: &mut R) -> Result<PcdHeader> {
        let mut version = None;
        let mut names: Vec<String> = Vec::new();
        let mut sizes: Vec<usize> = Vec::new();
        let mut kinds: Vec<char> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        let mut width = None;
        let mut height = None;
        let mut points = None;

        let mut line = String::new();

        let data_format = loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(Error::InvalidData("unexpected end of file in PCD header".to_string()));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let keyword = parts.next().unwrap_or_default();
            let values: Vec<&str> = parts.collect();

            match keyword {
                "VERSION" => version = values.first().map(|v| v.to_string()),
                "FIELDS" => names = values.iter().map(|v| v.to_string()).collect(),
                "SIZE" => sizes = parse_list(keyword, &values)?,
                "TYPE" => {
                    kinds = values
                        .iter()
                        .map(|v| match *v {
                            "I" => Ok('I'),
                            "U" => Ok('U'),
                            "F" => Ok('F'),
                            other => {
                                Err(Error::InvalidData(format!("unknown PCD TYPE '{}'", other)))
                            }
                        })
                        .collect::<Result<_>>()?
                }
                "COUNT" => counts = parse_list(keyword, &values)?,
                "WIDTH" => width = Some(parse_single(keyword, &values)?),
                "HEIGHT" => height = Some(parse_single(keyword, &values)?),
                "POINTS" => points = Some(parse_single(keyword, &values)?),
                "DATA" => {
                    break match values.first().copied() {
                        Some("ascii") => PcdDataFormat::Ascii,
                        Some("binary") => PcdDataFormat::Binary,
                        Some("binary_compressed") => PcdDataFormat::BinaryCompressed,
                        other => {
                            return Err(Error::InvalidData(format!(
                                "unknown PCD DATA format {:?}",
                                other
                            )))
                        }
                    };
                }
                // VIEWPOINT and unknown keywords carry nothing we need
                _ => {}
            }
        };

        let width = width
            .ok_or_else(|| Error::InvalidData("missing WIDTH in PCD header".to_string()))?;
        let height = height.unwrap_or(1);

        if names.is_empty() {
            return Err(Error::InvalidData("missing FIELDS in PCD header".to_string()));
        }
        if sizes.is_empty() {
            sizes = vec![4; names.len()];
        }
        if kinds.is_empty() {
            kinds = vec!['F'; names.len()];
        }
        if counts.is_empty() {
            counts = vec![1; names.len()];
        }
        if sizes.len() != names.len() || kinds.len() != names.len() || counts.len() != names.len() {
            return Err(Error::InvalidData(
                "mismatch between FIELDS, SIZE, TYPE and COUNT declarations".to_string(),
            ));
        }

        let fields: Vec<PcdField> = names
            .into_iter()
            .zip(sizes)
            .zip(kinds)
            .zip(counts)
            .map(|(((name, size), kind), count)| PcdField { name, size, kind, count })
            .collect();

        let mut record = 0usize;
        for field in &fields {
            if field.size == 0 || field.count == 0 {
                return Err(Error::InvalidData(format!(
                    "PCD field '{}' has SIZE {} and COUNT {}",
                    field.name, field.size, field.count
                )));
            }
            record = field
                .size
                .checked_mul(field.count)
                .and_then(|bytes| record.checked_add(bytes))
                .ok_or_else(|| Error::InvalidData("PCD point record size overflows".to_string()))?;
        }

        let points = match points {
            Some(points) => points,
            None => width.checked_mul(height).ok_or_else(|| {
                Error::InvalidData(format!("PCD WIDTH {} x HEIGHT {} overflows", width, height))
            })?,
        };

        Ok(PcdHeader {
            version: version.unwrap_or_else(|| "0.7".to_string()),
            fields,
            width,
            height,
            points,
            data_format,
        })
    }

    fn read_ascii_points<R: BufRead>(reader: &mut R, header: &PcdHeader) -> Result<PointCloud3f> {
        let (xi, _, _) = header.locate("x")?;
        let (yi, _, _) = header.locate("y")?;
        let (zi, _, _) = header.locate("z")?;

        let mut cloud = PointCloud3f::with_capacity(header.points.min(MAX_PREALLOCATED_POINTS));
        let mut line = String::new();

        while cloud.len() < header.points {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(Error::InvalidData(format!(
                    "PCD declares {} points but only {} were found",
                    header.points,
                    cloud.len()
                )));
            }

            let values: Vec<&str> = line.split_whitespace().collect();
            if values.is_empty() {
                continue;
            }

            let coordinate = |idx: usize| -> Result<f32> {
                let token = values.get(idx).ok_or_else(|| {
                    Error::InvalidData("not enough values in ASCII PCD line".to_string())
                })?;
                token
                    .parse::<f32>()
                    .map_err(|_| Error::InvalidData(format!("invalid PCD value '{}'", token)))
            };

            cloud.push(Point3f::new(coordinate(xi)?, coordinate(yi)?, coordinate(zi)?));
        }

        Ok(cloud)
    }

    fn read_binary_points<R: Read>(reader: &mut R, header: &PcdHeader) -> Result<PointCloud3f> {
        let (_, xo, xf) = header.locate("x")?;
        let (_, yo, yf) = header.locate("y")?;
        let (_, zo, zf) = header.locate("z")?;
        let record = header.record_size();

        let expected = record.checked_mul(header.points).ok_or_else(|| {
            Error::InvalidData(format!(
                "{} points of {} bytes overflow the binary PCD data size",
                header.points, record
            ))
        })?;

        let mut data = Vec::new();
        reader.take(expected as u64).read_to_end(&mut data)?;
        if data.len() != expected {
            return Err(Error::InvalidData(format!(
                "binary PCD data has {} bytes, expected {} points of {} bytes",
                data.len(),
                header.points,
                record
            )));
        }

        data.chunks_exact(record)
            .map(|bytes| {
                Ok(Point3f::new(
                    decode_scalar(&bytes[xo..], xf)?,
                    decode_scalar(&bytes[yo..], yf)?,
                    decode_scalar(&bytes[zo..], zf)?,
                ))
            })
            .collect()
    }
}

impl PointCloudReader for PcdReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud3f> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// Little-endian scalar at the start of `bytes`, converted to f32
fn decode_scalar(bytes: &[u8], field: &PcdField) -> Result<f32> {
    macro_rules! le {
        ($t:ty, $n:expr) => {{
            let mut buf = [0u8; $n];
            buf.copy_from_slice(&bytes[..$n]);
            <$t>::from_le_bytes(buf) as f32
        }};
    }

    Ok(match (field.kind, field.size) {
        ('F', 4) => le!(f32, 4),
        ('F', 8) => le!(f64, 8),
        ('I', 1) => le!(i8, 1),
        ('I', 2) => le!(i16, 2),
        ('I', 4) => le!(i32, 4),
        ('I', 8) => le!(i64, 8),
        ('U', 1) => le!(u8, 1),
        ('U', 2) => le!(u16, 2),
        ('U', 4) => le!(u32, 4),
        ('U', 8) => le!(u64, 8),
        (kind, size) => {
            return Err(Error::InvalidData(format!(
                "unsupported PCD field '{}' of type {}{}",
                field.name, kind, size
            )))
        }
    })
}

fn parse_single(keyword: &str, values: &[&str]) -> Result<usize> {
    values
        .first()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::InvalidData(format!("invalid {} value in PCD header", keyword)))
}

fn parse_list(keyword: &str, values: &[&str]) -> Result<Vec<usize>> {
    values
        .iter()
        .map(|v| {
            v.parse().map_err(|_| {
                Error::InvalidData(format!("invalid {} value '{}' in PCD header", keyword, v))
            })
        })
        .collect()
}

pub struct PcdWriter;

impl PcdWriter {
    /// Write `cloud` as an ASCII PCD v0.7 stream with float x, y, z fields
    pub fn write_ascii_to<W: Write>(cloud: &PointCloud3f, writer: &mut W) -> Result<()> {
        writeln!(writer, "# .PCD v0.7 - Point Cloud Data file format")?;
        writeln!(writer, "VERSION 0.7")?;
        writeln!(writer, "FIELDS x y z")?;
        writeln!(writer, "SIZE 4 4 4")?;
        writeln!(writer, "TYPE F F F")?;
        writeln!(writer, "COUNT 1 1 1")?;
        writeln!(writer, "WIDTH {}", cloud.len())?;
        writeln!(writer, "HEIGHT 1")?;
        writeln!(writer, "VIEWPOINT 0 0 0 1 0 0 0")?;
        writeln!(writer, "POINTS {}", cloud.len())?;
        writeln!(writer, "DATA ascii")?;

        for p in cloud.iter() {
            writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl PointCloudWriter for PcdWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud3f, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_ascii_to(cloud, &mut writer)
    }
}

/// Write `cloud` to `path` as ASCII PCD
pub fn write_pcd_ascii<P: AsRef<Path>>(cloud: &PointCloud3f, path: P) -> Result<()> {
    PcdWriter::write_point_cloud(cloud, path)
}

/// Persist the obstacle points of a segmentation.
///
/// Nothing is written for an empty cloud. Returns whether a file was written.
pub fn write_obstacles<P: AsRef<Path>>(obstacle: &PointCloud3f, path: P) -> Result<bool> {
    let path = path.as_ref();
    if obstacle.is_empty() {
        info!("no obstacle points, {} not written", path.display());
        return Ok(false);
    }

    write_pcd_ascii(obstacle, path)?;
    info!(points = obstacle.len(), path = %path.display(), "obstacle cloud written");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ascii_with_extra_fields() {
        let text = "\
# .PCD v0.7 - Point Cloud Data file format
VERSION 0.7
FIELDS x y z intensity
SIZE 4 4 4 4
TYPE F F F F
COUNT 1 1 1 1
WIDTH 2
HEIGHT 1
VIEWPOINT 0 0 0 1 0 0 0
POINTS 2
DATA ascii
1.5 2 3 100
-1 nan 0.25 7
";
        let cloud = PcdReader::read_from(&mut Cursor::new(text)).unwrap();

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud[0], Point3f::new(1.5, 2.0, 3.0));
        assert_eq!(cloud[1].x, -1.0);
        assert!(cloud[1].y.is_nan());
    }

    #[test]
    fn test_ascii_field_order_and_counts() {
        let text = "\
VERSION .7
FIELDS normal z y x
SIZE 4 4 4 4
TYPE F F F F
COUNT 3 1 1 1
WIDTH 1
HEIGHT 1
DATA ascii
0 0 1 30 20 10
";
        let cloud = PcdReader::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(cloud[0], Point3f::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn test_binary_mixed_types() {
        let header = "\
VERSION 0.7
FIELDS x y z ring
SIZE 8 4 2 1
TYPE F F I U
COUNT 1 1 1 1
WIDTH 2
HEIGHT 1
POINTS 2
DATA binary
";
        let mut bytes = header.as_bytes().to_vec();
        for (x, y, z, ring) in [(1.0f64, 2.0f32, -3i16, 4u8), (5.0, 6.0, 7, 8)] {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
            bytes.extend_from_slice(&z.to_le_bytes());
            bytes.push(ring);
        }

        let cloud = PcdReader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(cloud.points, vec![Point3f::new(1.0, 2.0, -3.0), Point3f::new(5.0, 6.0, 7.0)]);
    }

    #[test]
    fn test_truncated_data_is_rejected() {
        let text = "FIELDS x y z\nWIDTH 3\nHEIGHT 1\nDATA ascii\n0 0 0\n";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(text)),
            Err(Error::InvalidData(_))
        ));

        let binary = "FIELDS x y z\nWIDTH 1\nDATA binary\n\x00\x00";
        assert!(PcdReader::read_from(&mut Cursor::new(binary)).is_err());
    }

    #[test]
    fn test_huge_point_count_is_rejected() {
        let ascii = "FIELDS x y z\nWIDTH 1\nPOINTS 18446744073709551615\nDATA ascii\n0 0 0\n";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(ascii)),
            Err(Error::InvalidData(_))
        ));

        // 2^61 records of 12 bytes overflow usize
        let overflow = "FIELDS x y z\nWIDTH 1\nPOINTS 2305843009213693952\nDATA binary\n";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(overflow)),
            Err(Error::InvalidData(_))
        ));

        let short = "FIELDS x y z\nWIDTH 1\nPOINTS 1099511627776\nDATA binary\n\x00\x00\x00\x00";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(short)),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_width_height_overflow_is_rejected() {
        let text = "FIELDS x y z\nWIDTH 18446744073709551615\nHEIGHT 2\nDATA ascii\n";
        assert!(matches!(
            PcdReader::read_header(&mut Cursor::new(text)),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_empty_fields_are_rejected() {
        let zero_count = "FIELDS x y z\nCOUNT 1 0 1\nWIDTH 1\nDATA binary\n\x00\x00\x00\x00";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(zero_count)),
            Err(Error::InvalidData(_))
        ));

        let zero_size = "FIELDS x y z\nSIZE 0 0 0\nWIDTH 1\nDATA binary\n";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(zero_size)),
            Err(Error::InvalidData(_))
        ));

        let huge_record = "FIELDS x y z\nCOUNT 1 1 18446744073709551615\nWIDTH 1\nDATA binary\n";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(huge_record)),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_missing_coordinate_field() {
        let text = "FIELDS x y\nWIDTH 1\nDATA ascii\n0 0\n";
        assert!(PcdReader::read_from(&mut Cursor::new(text)).is_err());
    }

    #[test]
    fn test_compressed_is_unsupported() {
        let text = "FIELDS x y z\nWIDTH 1\nDATA binary_compressed\n";
        assert!(matches!(
            PcdReader::read_from(&mut Cursor::new(text)),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_writer_output_reads_back() {
        let cloud = PointCloud3f::from_points(vec![
            Point3f::new(0.1, -2.5, 3.0),
            Point3f::new(1e-3, 4.0, 1234.5),
        ]);

        let mut buffer = Vec::new();
        PcdWriter::write_ascii_to(&cloud, &mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.contains("WIDTH 2\nHEIGHT 1\n"));
        assert!(text.contains("POINTS 2\nDATA ascii\n"));

        let read = PcdReader::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(read, cloud);
    }
}
