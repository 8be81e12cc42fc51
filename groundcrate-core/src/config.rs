//! Segmentation configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default upper bound on the memory used by the dense elevation grids (1 GiB).
pub const DEFAULT_MAX_GRID_BYTES: usize = 1 << 30;

/// Cell size used when neither `cell_size` nor `voxel_leaf_size` is positive.
pub const FALLBACK_CELL_SIZE: f32 = 1.0;

/// Parameters of the ground segmentation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Largest morphological window, in grid cells.
    pub max_window_size: usize,
    /// Terrain slope used to grow the elevation threshold with the window.
    pub slope: f32,
    /// Elevation threshold of the first (smallest) window.
    pub initial_distance: f32,
    /// Upper bound on the elevation threshold.
    pub max_distance: f32,
    /// Voxel edge length for downsampling. `<= 0` disables downsampling.
    pub voxel_leaf_size: f32,
    /// Elevation grid cell size. `<= 0` follows `voxel_leaf_size`.
    pub cell_size: f32,
    /// Memory ceiling for the elevation grids.
    pub max_grid_bytes: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_window_size: 33,
            slope: 1.0,
            initial_distance: 0.15,
            max_distance: 3.0,
            voxel_leaf_size: 0.1,
            cell_size: 0.0,
            max_grid_bytes: DEFAULT_MAX_GRID_BYTES,
        }
    }
}

/// A recoverable configuration problem.
///
/// Each warning names the offending field; the configuration it was
/// reported for already carries the default for that field.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// The configuration file does not exist or could not be opened.
    Missing { path: PathBuf, reason: String },
    /// A known key whose value could not be parsed.
    Unparsable { key: String, value: String },
    /// A value that parsed but lies outside the field's valid range.
    OutOfRange { key: String, value: String },
    /// A key that is not part of the configuration schema.
    UnknownKey { key: String },
    /// `max_distance` is below `initial_distance`; the value is kept.
    MaxBelowInitial { initial_distance: f32, max_distance: f32 },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::Missing { path, reason } => write!(
                f,
                "configuration file {} unavailable ({}), using defaults",
                path.display(),
                reason
            ),
            ConfigWarning::Unparsable { key, value } => {
                write!(f, "could not parse {} = {:?}, using default", key, value)
            }
            ConfigWarning::OutOfRange { key, value } => {
                write!(f, "{} = {} is out of range, using default", key, value)
            }
            ConfigWarning::UnknownKey { key } => write!(f, "unknown configuration key {:?}", key),
            ConfigWarning::MaxBelowInitial {
                initial_distance,
                max_distance,
            } => write!(
                f,
                "max_distance ({}) is below initial_distance ({}); \
                 every threshold will be capped at max_distance",
                max_distance, initial_distance
            ),
        }
    }
}

impl SegmentationConfig {
    /// Replace every out-of-range field with its default.
    ///
    /// Returns the repaired configuration and one warning per replaced field.
    pub fn validated(self) -> (Self, Vec<ConfigWarning>) {
        let defaults = Self::default();
        let mut config = self;
        let mut warnings = Vec::new();

        let mut out_of_range = |key: &str, value: String| {
            warnings.push(ConfigWarning::OutOfRange {
                key: key.to_string(),
                value,
            });
        };

        if config.max_window_size == 0 {
            out_of_range("max_window_size", config.max_window_size.to_string());
            config.max_window_size = defaults.max_window_size;
        }
        if !(config.slope.is_finite() && config.slope >= 0.0) {
            out_of_range("slope", config.slope.to_string());
            config.slope = defaults.slope;
        }
        if !(config.initial_distance.is_finite() && config.initial_distance >= 0.0) {
            out_of_range("initial_distance", config.initial_distance.to_string());
            config.initial_distance = defaults.initial_distance;
        }
        if !(config.max_distance.is_finite() && config.max_distance >= 0.0) {
            out_of_range("max_distance", config.max_distance.to_string());
            config.max_distance = defaults.max_distance;
        }
        if !config.voxel_leaf_size.is_finite() {
            out_of_range("voxel_leaf_size", config.voxel_leaf_size.to_string());
            config.voxel_leaf_size = defaults.voxel_leaf_size;
        }
        if !config.cell_size.is_finite() {
            out_of_range("cell_size", config.cell_size.to_string());
            config.cell_size = defaults.cell_size;
        }
        if config.max_grid_bytes == 0 {
            out_of_range("max_grid_bytes", config.max_grid_bytes.to_string());
            config.max_grid_bytes = defaults.max_grid_bytes;
        }

        if config.max_distance < config.initial_distance {
            warnings.push(ConfigWarning::MaxBelowInitial {
                initial_distance: config.initial_distance,
                max_distance: config.max_distance,
            });
        }

        (config, warnings)
    }

    /// True when the voxel downsampling stage should run.
    pub fn downsampling_enabled(&self) -> bool {
        self.voxel_leaf_size > 0.0
    }

    /// Cell size of the elevation grid.
    ///
    /// An explicit positive `cell_size` wins; otherwise the grid resolution
    /// matches the voxel leaf size, and falls back to [`FALLBACK_CELL_SIZE`]
    /// when downsampling is disabled.
    pub fn effective_cell_size(&self) -> f32 {
        if self.cell_size > 0.0 {
            self.cell_size
        } else if self.downsampling_enabled() {
            self.voxel_leaf_size
        } else {
            FALLBACK_CELL_SIZE
        }
    }
}
