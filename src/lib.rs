// Swingscore - badminton swing extraction from IMU sessions
// Module declarations

pub mod config;
pub mod dataset;
pub mod logger;
pub mod pipeline;
pub mod scoring;
pub mod sensor;
pub mod state;
pub mod swing;

pub use config::{ConfigError, PipelineConfig};
pub use dataset::{Dataset, DatasetError, LabeledExample};
pub use pipeline::{run_pipeline, PipelineError, PipelineRun};
pub use scoring::{evaluate_models, EvaluationReport, LiveScorer, ScoreCard, ScoringModel};
pub use swing::{extract_single_swing, SwingFeatureVector, SwingFeatures};
