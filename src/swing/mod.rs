// Swing detection module
// Gap-based segmentation, segment validation and per-swing feature extraction

pub mod features;
pub mod segmenter;
pub mod types;
pub mod validator;

pub use features::{
    extract_segment_features, extract_single_swing, extract_single_swing_str, extract_swings,
    ExtractionSkip, SegmentStats,
};
pub use segmenter::{estimate_sample_rate, sample_rate_plausible, segment_stream, segment_with_config};
pub use types::{
    NormalizedSample, NormalizedStream, RawSample, SwingFeatureVector, SwingFeatures,
    SwingSegment, FEATURE_COUNT, FEATURE_NAMES,
};
pub use validator::{validate_segment, SegmentRejection, ValidatorConfig};
