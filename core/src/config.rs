//! Application configuration.
//!
//! Stored as TOML. Without an explicit path the file lives in the platform
//! config directory under the `rankmap` app name (managed by `confy`).

use std::fs;
use std::path::{Path, PathBuf};

use rankmap_types::{ChartControls, PeriodRange};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "rankmap";
const ENTITY_PLACEHOLDER: &str = "{entity}";

/// Where datasets and period metadata are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory path or `http(s)://` base URL
    pub base: String,
    /// Key template for a dataset; `{entity}` is replaced by the entity id
    pub dataset_key: String,
    pub period_meta_key: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base: default_data_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| ".".to_string()),
            dataset_key: format!("map/{ENTITY_PLACEHOLDER}.tsv.gz"),
            period_meta_key: "raid_info.json.gz".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn dataset_key_for(&self, entity: u32) -> String {
        self.dataset_key
            .replace(ENTITY_PLACEHOLDER, &entity.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankmapConfig {
    pub source: SourceConfig,
    /// Controls applied when a session starts
    pub controls: ChartControls,
    /// Reported as the full period range while a dataset is empty
    pub default_period_range: PeriodRange,
}

impl Default for RankmapConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            controls: ChartControls::default(),
            default_period_range: PeriodRange::default(),
        }
    }
}

/// Load the configuration from `path`, or from the per-user config file.
///
/// The per-user file is created with defaults on first use. An explicit
/// path must exist.
pub fn load_config(path: Option<&Path>) -> Result<RankmapConfig, ConfigError> {
    let Some(path) = path else {
        return confy::load(APP_NAME, None).map_err(|e| ConfigError::StoreError {
            path: default_config_path(),
            source: e,
        });
    };

    let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save the configuration to `path`, or to the per-user config file.
pub fn save_config(path: Option<&Path>, config: &RankmapConfig) -> Result<(), ConfigError> {
    let Some(path) = path else {
        return confy::store(APP_NAME, None, config).map_err(|e| ConfigError::StoreError {
            path: default_config_path(),
            source: e,
        });
    };

    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError {
        path: path.to_path_buf(),
        source: e,
    })?;

    fs::write(path, contents).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Path of the per-user config file, empty if the platform has none.
pub fn default_config_path() -> PathBuf {
    confy::get_configuration_file_path(APP_NAME, None).unwrap_or_default()
}

/// Default dataset directory
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(APP_NAME))
}

/// Errors that can occur while loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    SerializeError {
        path: PathBuf,
        source: toml::ser::Error,
    },
    StoreError {
        path: PathBuf,
        source: confy::ConfyError,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError { path, source } => {
                write!(f, "IO error reading {:?}: {}", path, source)
            }
            Self::ParseError { path, source } => {
                write!(f, "Parse error in {:?}: {}", path, source)
            }
            Self::SerializeError { path, source } => {
                write!(f, "Serialize error for {:?}: {}", path, source)
            }
            Self::StoreError { path, source } => {
                write!(f, "Config store error for {:?}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError { source, .. } => Some(source),
            Self::ParseError { source, .. } => Some(source),
            Self::SerializeError { source, .. } => Some(source),
            Self::StoreError { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankmap_types::{Difficulty, DifficultySelect, NormalizationMode};

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
default_period_range = { min = 0, max = 120 }

[source]
base = "https://data.example.net/rank"
dataset_key = "map/{entity}.tsv.gz"
period_meta_key = "raid_info.json.gz"

[controls]
entity = 42
bucket_width = 100
difficulty = "Lunatic"
hide_threshold = 250.0
heatmap_mode = "percent"
selected_categories = [3, 4]

[controls.period_range]
min = 10
max = 90
"#;

        let config: RankmapConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.source.base, "https://data.example.net/rank");
        assert_eq!(config.source.dataset_key_for(42), "map/42.tsv.gz");
        assert_eq!(config.controls.entity, Some(42));
        assert_eq!(config.controls.bucket_width.get(), 100);
        assert_eq!(
            config.controls.difficulty,
            DifficultySelect::Only(Difficulty::Lunatic)
        );
        assert_eq!(config.controls.period_range, PeriodRange::new(10, 90));
        assert_eq!(config.controls.heatmap_mode, NormalizationMode::Percent);
        assert_eq!(config.controls.histogram_mode, NormalizationMode::Absolute);
        assert_eq!(config.default_period_range, PeriodRange::new(0, 120));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: RankmapConfig = toml::from_str("[source]\nbase = \"/srv/data\"\n").unwrap();
        assert_eq!(config.source.base, "/srv/data");
        assert_eq!(config.source.period_meta_key, "raid_info.json.gz");
        assert_eq!(config.controls, ChartControls::default());
        assert_eq!(config.default_period_range, PeriodRange::new(0, 150));
    }

    #[test]
    fn test_save_then_load_file() {
        let dir = std::env::temp_dir().join(format!("rankmap-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rankmap.toml");

        let mut config = RankmapConfig::default();
        config.source.base = "/srv/data".to_string();
        config.controls.entity = Some(7);
        config.controls.selected_categories.insert(5);
        save_config(Some(&path), &config).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/rankmap.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }

    #[test]
    fn test_invalid_width_is_parse_error() {
        let dir = std::env::temp_dir().join(format!("rankmap-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        fs::write(&path, "[controls]\nbucket_width = 0\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        fs::remove_dir_all(&dir).unwrap();
    }
}
