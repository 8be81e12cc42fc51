//! `key = value` configuration files
//!
//! ```text
//! # ProgressiveMorphologicalFilter
//! max_window_size = 33
//! slope = 1.0
//! initial_distance = 0.15
//! max_distance = 3.0
//!
//! # Downsampling
//! voxel_leaf_size = 0.1
//! ```
//!
//! Problems never abort loading: every bad line leaves the field at its
//! default and produces a [`ConfigWarning`].

use groundcrate_core::{ConfigWarning, SegmentationConfig};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.txt";

/// A parsed configuration and the problems met while reading it
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: SegmentationConfig,
    pub warnings: Vec<ConfigWarning>,
}

/// Load the configuration file at `path`.
///
/// A missing or unreadable file yields the default configuration and a
/// [`ConfigWarning::Missing`]. Each warning is logged.
pub fn load_config<P: AsRef<Path>>(path: P) -> LoadedConfig {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => {
            let loaded = parse_config(&text);
            info!(path = %path.display(), config = ?loaded.config, "configuration loaded");
            loaded
        }
        Err(e) => {
            let warning = ConfigWarning::Missing {
                path: path.to_path_buf(),
                reason: e.to_string(),
            };
            warn!("{}", warning);
            LoadedConfig {
                config: SegmentationConfig::default(),
                warnings: vec![warning],
            }
        }
    }
}

/// Parse configuration text.
///
/// Blank lines, `#` comments and lines without `=` are skipped. Keys and
/// values are trimmed.
pub fn parse_config(text: &str) -> LoadedConfig {
    let mut config = SegmentationConfig::default();
    let mut warnings = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        let outcome = match key {
            "max_window_size" => parse_window(value).map(|v| config.max_window_size = v),
            "slope" => parse_value(value).map(|v| config.slope = v),
            "initial_distance" => parse_value(value).map(|v| config.initial_distance = v),
            "max_distance" => parse_value(value).map(|v| config.max_distance = v),
            "voxel_leaf_size" => parse_value(value).map(|v| config.voxel_leaf_size = v),
            "cell_size" => parse_value(value).map(|v| config.cell_size = v),
            "max_grid_bytes" => parse_value(value).map(|v| config.max_grid_bytes = v),
            _ => Err(Rejection::UnknownKey),
        };

        if let Err(rejection) = outcome {
            let warning = rejection.into_warning(key, value);
            warn!("{}", warning);
            warnings.push(warning);
        }
    }

    LoadedConfig { config, warnings }
}

enum Rejection {
    Unparsable,
    OutOfRange,
    UnknownKey,
}

impl Rejection {
    fn into_warning(self, key: &str, value: &str) -> ConfigWarning {
        let key = key.to_string();
        let value = value.to_string();
        match self {
            Rejection::Unparsable => ConfigWarning::Unparsable { key, value },
            Rejection::OutOfRange => ConfigWarning::OutOfRange { key, value },
            Rejection::UnknownKey => ConfigWarning::UnknownKey { key },
        }
    }
}

fn parse_value<T: FromStr>(value: &str) -> Result<T, Rejection> {
    value.parse().map_err(|_| Rejection::Unparsable)
}

/// Window sizes are integers; zero and negative values are out of range.
fn parse_window(value: &str) -> Result<usize, Rejection> {
    let window: i64 = parse_value(value)?;
    if window < 1 {
        return Err(Rejection::OutOfRange);
    }
    usize::try_from(window).map_err(|_| Rejection::OutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let text = "\
# ProgressiveMorphologicalFilter Parameters
max_window_size = 20
slope=0.5
  initial_distance =  0.2
max_distance = 2.5

# Downsampling Parameters
voxel_leaf_size = 0.05
";
        let loaded = parse_config(text);
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.config.max_window_size, 20);
        assert_eq!(loaded.config.slope, 0.5);
        assert_eq!(loaded.config.initial_distance, 0.2);
        assert_eq!(loaded.config.max_distance, 2.5);
        assert_eq!(loaded.config.voxel_leaf_size, 0.05);
    }

    #[test]
    fn test_unparsable_value_keeps_default() {
        let loaded = parse_config("slope = steep\nmax_distance = 4\n");

        assert_eq!(loaded.config.slope, 1.0);
        assert_eq!(loaded.config.max_distance, 4.0);
        assert_eq!(
            loaded.warnings,
            vec![ConfigWarning::Unparsable {
                key: "slope".to_string(),
                value: "steep".to_string()
            }]
        );
    }

    #[test]
    fn test_window_must_be_positive_integer() {
        let loaded = parse_config("max_window_size = -3");
        assert_eq!(loaded.config.max_window_size, 33);
        assert!(matches!(loaded.warnings[0], ConfigWarning::OutOfRange { .. }));

        let loaded = parse_config("max_window_size = 7.5");
        assert_eq!(loaded.config.max_window_size, 33);
        assert!(matches!(loaded.warnings[0], ConfigWarning::Unparsable { .. }));
    }

    #[test]
    fn test_unknown_keys_and_junk_lines() {
        let loaded = parse_config("colour = red\nthis line has no separator\n# slope = 9\n");

        assert_eq!(loaded.config, SegmentationConfig::default());
        assert_eq!(
            loaded.warnings,
            vec![ConfigWarning::UnknownKey {
                key: "colour".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let loaded = load_config("definitely/not/here/config.txt");

        assert_eq!(loaded.config, SegmentationConfig::default());
        assert!(matches!(loaded.warnings.as_slice(), [ConfigWarning::Missing { .. }]));
    }
}
