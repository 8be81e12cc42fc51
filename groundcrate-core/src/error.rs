//! Error types for groundcrate

use thiserror::Error;

/// Main error type for groundcrate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(
        "elevation grid of {cols} x {rows} cells needs {required_bytes} bytes, \
         exceeding the {limit_bytes} byte limit; increase max_grid_bytes or use a coarser cell_size"
    )]
    ResourceExhausted {
        cols: usize,
        rows: usize,
        required_bytes: usize,
        limit_bytes: usize,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// Result type alias for groundcrate operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_exhausted_message_is_actionable() {
        let err = Error::ResourceExhausted {
            cols: 10,
            rows: 20,
            required_bytes: 2600,
            limit_bytes: 1024,
        };
        let message = err.to_string();
        assert!(message.contains("10 x 20"));
        assert!(message.contains("max_grid_bytes"));
    }
}
