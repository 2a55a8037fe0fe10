// Segment validation
// Drops candidate segments that are too short or contain no real motion

use thiserror::Error;

use crate::config::SegmentationConfig;
use crate::swing::types::NormalizedSample;

/// Why a candidate segment was not passed on to feature extraction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentRejection {
    #[error("segment has {len} samples, minimum is {min}")]
    TooShort { len: usize, min: usize },

    #[error("peak v_norm {peak:e} is below noise floor {floor:e}")]
    NoMotion { peak: f64, floor: f64 },
}

/// Validator thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatorConfig {
    pub min_samples: usize,
    pub noise_floor: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            min_samples: 10,
            noise_floor: 1e-6,
        }
    }
}

impl From<&SegmentationConfig> for ValidatorConfig {
    fn from(config: &SegmentationConfig) -> Self {
        ValidatorConfig {
            min_samples: config.min_segment_samples,
            noise_floor: config.noise_floor,
        }
    }
}

/// Check a segment before any time normalization or peak search runs on it
pub fn validate_segment(
    samples: &[NormalizedSample],
    config: &ValidatorConfig,
) -> Result<(), SegmentRejection> {
    if samples.len() < config.min_samples {
        return Err(SegmentRejection::TooShort {
            len: samples.len(),
            min: config.min_samples,
        });
    }

    let peak = samples
        .iter()
        .map(|s| s.v_norm)
        .fold(f64::NEG_INFINITY, f64::max);

    if !(peak >= config.noise_floor) {
        return Err(SegmentRejection::NoMotion {
            peak,
            floor: config.noise_floor,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::types::RawSample;

    fn samples_with_v(values: &[f64]) -> Vec<NormalizedSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                NormalizedSample::from_raw(RawSample {
                    timestamp: i as f64 * 10.0,
                    vx: v,
                    vy: 0.0,
                    vz: 0.0,
                    wx: 0.0,
                    wy: 0.0,
                    wz: 0.0,
                })
            })
            .collect()
    }

    #[test]
    fn test_accepts_normal_segment() {
        let samples = samples_with_v(&[0.5; 12]);
        assert!(validate_segment(&samples, &ValidatorConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_short_segment() {
        let samples = samples_with_v(&[3.0; 9]);
        let result = validate_segment(&samples, &ValidatorConfig::default());
        assert_eq!(result, Err(SegmentRejection::TooShort { len: 9, min: 10 }));
    }

    #[test]
    fn test_rejects_empty_segment() {
        let result = validate_segment(&[], &ValidatorConfig::default());
        assert!(matches!(result, Err(SegmentRejection::TooShort { len: 0, .. })));
    }

    #[test]
    fn test_rejects_motionless_segment() {
        let samples = samples_with_v(&[0.0; 15]);
        let result = validate_segment(&samples, &ValidatorConfig::default());
        assert!(matches!(result, Err(SegmentRejection::NoMotion { .. })));
    }

    #[test]
    fn test_config_from_segmentation() {
        let mut seg = SegmentationConfig::default();
        seg.min_segment_samples = 4;
        seg.noise_floor = 0.5;

        let config = ValidatorConfig::from(&seg);
        assert_eq!(config.min_samples, 4);

        let samples = samples_with_v(&[0.1, 0.2, 0.3, 0.4]);
        assert!(matches!(
            validate_segment(&samples, &config),
            Err(SegmentRejection::NoMotion { .. })
        ));
    }
}
