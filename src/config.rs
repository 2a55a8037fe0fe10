// Pipeline configuration
// Explicit settings for every stage; loaded from TOML, validated before use

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level configuration for one extraction run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub labels: LabelConfig,
    pub segmentation: SegmentationConfig,
    pub evaluation: EvaluationConfig,
    pub output: OutputConfig,
}

/// Where subject sensor files live and how their columns are named
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub data_dir: PathBuf,

    /// Only files whose name starts with this prefix are subject files
    pub file_prefix: String,

    pub file_extension: String,

    pub columns: ColumnMap,
}

/// Source column names for the timestamp and the six sensor channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub timestamp: String,
    pub vx: String,
    pub vy: String,
    pub vz: String,
    pub wx: String,
    pub wy: String,
    pub wz: String,
}

/// Ground-truth score table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub path: PathBuf,
    pub id_column: String,
    pub score_columns: Vec<String>,
    pub min_score: f64,
    pub max_score: f64,
}

/// Segmenter and validator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Nominal sensor sample rate, used to sanity-check stream timing
    pub sample_rate_hz: f64,

    /// A timestamp step larger than this starts a new swing
    pub gap_threshold_ms: f64,

    /// Segments with fewer samples are discarded
    pub min_segment_samples: usize,

    /// Segments whose peak v_norm is below this are discarded
    pub noise_floor: f64,
}

/// Train/test split and random forest parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub test_fraction: f64,
    pub seed: u64,

    /// Number of trees in the forest
    pub n_trees: usize,

    /// Maximum depth of each tree; depth 0 is a single leaf
    pub max_depth: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dataset_csv: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub trace: Option<PathBuf>,

    /// Process subjects on a rayon pool instead of one by one
    pub parallel: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            data_dir: PathBuf::from("data/time_series_data_csv"),
            file_prefix: "h".to_string(),
            file_extension: "csv".to_string(),
            columns: ColumnMap::default(),
        }
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            timestamp: "time".to_string(),
            vx: "acc_x".to_string(),
            vy: "acc_y".to_string(),
            vz: "acc_z".to_string(),
            wx: "gyro_x".to_string(),
            wy: "gyro_y".to_string(),
            wz: "gyro_z".to_string(),
        }
    }
}

impl ColumnMap {
    /// Mapping for tables that already use the canonical names
    pub fn canonical() -> Self {
        ColumnMap {
            timestamp: "timestamp".to_string(),
            vx: "vx".to_string(),
            vy: "vy".to_string(),
            vz: "vz".to_string(),
            wx: "wx".to_string(),
            wy: "wy".to_string(),
            wz: "wz".to_string(),
        }
    }

    /// Source names in canonical order: timestamp, vx, vy, vz, wx, wy, wz
    pub fn names(&self) -> [&str; 7] {
        [
            self.timestamp.as_str(),
            self.vx.as_str(),
            self.vy.as_str(),
            self.vz.as_str(),
            self.wx.as_str(),
            self.wy.as_str(),
            self.wz.as_str(),
        ]
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        LabelConfig {
            path: PathBuf::from("data/label/labels.csv"),
            id_column: "Filename".to_string(),
            score_columns: vec![
                "Swing Path Accuracy".to_string(),
                "Swing Speed Smoothness".to_string(),
                "Wrist Rotation Timing Accuracy".to_string(),
                "Hit Timing Accuracy".to_string(),
                "Ball Contact Position Accuracy".to_string(),
            ],
            min_score: 0.0,
            max_score: 5.0,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig {
            sample_rate_hz: 203.0,
            gap_threshold_ms: 50.0,
            min_segment_samples: 10,
            noise_floor: 1e-6,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            test_fraction: 0.2,
            seed: 42,
            n_trees: 200,
            max_depth: 8,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML config file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;

        if !(seg.gap_threshold_ms > 0.0) {
            return Err(ConfigError::Validation(
                "Gap threshold must be positive".to_string(),
            ));
        }

        if !(seg.sample_rate_hz > 0.0) {
            return Err(ConfigError::Validation(
                "Sample rate must be positive".to_string(),
            ));
        }

        // Peak and end time need at least two samples to mean anything
        if seg.min_segment_samples < 2 {
            return Err(ConfigError::Validation(
                "Minimum segment samples must be at least 2".to_string(),
            ));
        }

        if seg.noise_floor < 0.0 {
            return Err(ConfigError::Validation(
                "Noise floor must not be negative".to_string(),
            ));
        }

        if self.labels.score_columns.is_empty() {
            return Err(ConfigError::Validation(
                "At least one score column is required".to_string(),
            ));
        }

        if self.labels.min_score >= self.labels.max_score {
            return Err(ConfigError::Validation(
                "Score range is empty".to_string(),
            ));
        }

        let fraction = self.evaluation.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::Validation(
                "Test fraction must be between 0 and 1".to_string(),
            ));
        }

        if self.evaluation.n_trees == 0 {
            return Err(ConfigError::Validation(
                "Forest needs at least one tree".to_string(),
            ));
        }

        Ok(())
    }
}
