// Swing feature extraction
// Temporal and kinematic summary statistics for each validated segment,
// plus the single-reading variant used for live scoring

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SegmentationConfig;
use crate::swing::segmenter::segment_with_config;
use crate::swing::types::{NormalizedSample, NormalizedStream, SwingFeatureVector, SwingFeatures};
use crate::swing::validator::{validate_segment, SegmentRejection, ValidatorConfig};

/// Placeholder timings for a single instantaneous reading (seconds)
pub const SINGLE_SWING_ACCEL_TIME: f64 = 0.15;
pub const SINGLE_SWING_DECEL_TIME: f64 = 0.35;
pub const SINGLE_SWING_V_PEAK_TIME: f64 = 0.18;

/// Time constant used to approximate w_integral from one reading (seconds)
pub const SINGLE_SWING_DT: f64 = 0.01;

/// Why a validated segment produced no feature vector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionSkip {
    #[error("segment is empty")]
    Empty,

    #[error("peak index {index} outside normalized time series of length {len}")]
    PeakOutOfRange { index: usize, len: usize },
}

/// Per-stream counts of what happened to each candidate segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub candidates: usize,
    pub too_short: usize,
    pub no_motion: usize,
    pub extraction_skipped: usize,
    pub extracted: usize,
}

impl SegmentStats {
    pub fn rejected(&self) -> usize {
        self.too_short + self.no_motion + self.extraction_skipped
    }

    fn record_rejection(&mut self, rejection: &SegmentRejection) {
        match rejection {
            SegmentRejection::TooShort { .. } => self.too_short += 1,
            SegmentRejection::NoMotion { .. } => self.no_motion += 1,
        }
    }
}

/// Segment timestamps relative to the first sample, in seconds
fn normalized_times(samples: &[NormalizedSample]) -> Vec<f64> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let t0 = first.timestamp();
    samples
        .iter()
        .map(|s| (s.timestamp() - t0) / 1000.0)
        .collect()
}

/// Index of the maximum v_norm; ties go to the first occurrence
fn peak_index(samples: &[NormalizedSample]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, sample) in samples.iter().enumerate() {
        match best {
            Some((_, value)) if sample.v_norm <= value => {}
            _ => best = Some((i, sample.v_norm)),
        }
    }
    best.map(|(i, _)| i)
}

/// Trapezoidal integral of `values` over `times`
fn trapezoid(values: &[f64], times: &[f64]) -> f64 {
    values
        .windows(2)
        .zip(times.windows(2))
        .map(|(v, t)| (t[1] - t[0]) * (v[0] + v[1]) / 2.0)
        .sum()
}

/// Compute the feature vector of one segment
///
/// Deterministic: the same samples always yield bit-identical features.
pub fn extract_segment_features(
    samples: &[NormalizedSample],
) -> Result<SwingFeatures, ExtractionSkip> {
    let times = normalized_times(samples);
    let peak = peak_index(samples).ok_or(ExtractionSkip::Empty)?;

    // Peak comes from the samples, times from their timestamps; both must agree
    let (Some(&peak_time), Some(&end_time)) = (times.get(peak), times.last()) else {
        return Err(ExtractionSkip::PeakOutOfRange {
            index: peak,
            len: times.len(),
        });
    };

    let v_norms: Vec<f64> = samples.iter().map(|s| s.v_norm).collect();
    let w_norms: Vec<f64> = samples.iter().map(|s| s.w_norm).collect();

    let max_v = v_norms[peak];
    let mean_v = v_norms.iter().sum::<f64>() / v_norms.len() as f64;
    let max_w = w_norms.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(SwingFeatures {
        max_v,
        mean_v,
        max_w,
        accel_time: peak_time,
        decel_time: end_time - peak_time,
        v_peak_time: peak_time,
        w_integral: trapezoid(&w_norms, &times),
    })
}

/// Segment, validate and extract every swing of one subject's stream
///
/// Rejected or failed segments are logged and counted, never propagated;
/// surviving vectors keep the segmenter's order.
pub fn extract_swings(
    subject_id: &str,
    stream: &NormalizedStream,
    config: &SegmentationConfig,
) -> (Vec<SwingFeatureVector>, SegmentStats) {
    let validator = ValidatorConfig::from(config);
    let segments = segment_with_config(stream, config);

    let mut stats = SegmentStats {
        candidates: segments.len(),
        ..SegmentStats::default()
    };
    let mut vectors = Vec::with_capacity(segments.len());

    for segment in &segments {
        let samples = stream.segment_samples(segment);

        if let Err(rejection) = validate_segment(samples, &validator) {
            debug!(
                "Subject {} swing {}: dropped ({})",
                subject_id, segment.swing_id, rejection
            );
            stats.record_rejection(&rejection);
            continue;
        }

        match extract_segment_features(samples) {
            Ok(features) => {
                vectors.push(SwingFeatureVector {
                    subject_id: subject_id.to_string(),
                    swing_id: segment.swing_id,
                    features,
                });
                stats.extracted += 1;
            }
            Err(skip) => {
                warn!(
                    "Subject {} swing {}: feature extraction skipped ({})",
                    subject_id, segment.swing_id, skip
                );
                stats.extraction_skipped += 1;
            }
        }
    }

    (vectors, stats)
}

/// Features of one instantaneous reading `[vx, vy, vz, wx, wy, wz]`
///
/// There is no time axis, so the timing fields are fixed placeholders.
/// Anything other than exactly six finite values yields the all-zero vector.
pub fn extract_single_swing(values: &[f64]) -> SwingFeatures {
    let [vx, vy, vz, wx, wy, wz] = match values {
        [a, b, c, d, e, f] => [*a, *b, *c, *d, *e, *f],
        _ => {
            warn!(
                "Single swing input needs 6 values (vx, vy, vz, wx, wy, wz), got {}",
                values.len()
            );
            return SwingFeatures::zero();
        }
    };

    if values.iter().any(|v| !v.is_finite()) {
        warn!("Single swing input contains non-finite values");
        return SwingFeatures::zero();
    }

    let v_norm = (vx * vx + vy * vy + vz * vz).sqrt();
    let w_norm = (wx * wx + wy * wy + wz * wz).sqrt();

    SwingFeatures {
        max_v: v_norm,
        mean_v: v_norm,
        max_w: w_norm,
        accel_time: SINGLE_SWING_ACCEL_TIME,
        decel_time: SINGLE_SWING_DECEL_TIME,
        v_peak_time: SINGLE_SWING_V_PEAK_TIME,
        w_integral: w_norm * SINGLE_SWING_DT,
    }
}

/// Parse a comma or whitespace separated reading and extract its features
/// Unparseable input yields the all-zero vector
pub fn extract_single_swing_str(input: &str) -> SwingFeatures {
    let parsed: Result<Vec<f64>, _> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse::<f64>)
        .collect();

    match parsed {
        Ok(values) => extract_single_swing(&values),
        Err(e) => {
            warn!("Single swing input is not numeric: {}", e);
            SwingFeatures::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::types::RawSample;

    fn sample(t: f64, v: f64, w: f64) -> NormalizedSample {
        NormalizedSample::from_raw(RawSample {
            timestamp: t,
            vx: v,
            vy: 0.0,
            vz: 0.0,
            wx: 0.0,
            wy: w,
            wz: 0.0,
        })
    }

    /// 12 samples at 10 ms spacing, v rising to 10.0 at index 5 then falling to 2.0
    fn reference_swing() -> Vec<NormalizedSample> {
        let v = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 8.4, 6.8, 5.2, 4.0, 3.0, 2.0];
        v.iter()
            .enumerate()
            .map(|(i, &v)| sample(1_000.0 + i as f64 * 10.0, v, 1.0))
            .collect()
    }

    #[test]
    fn test_reference_swing_features() {
        let features = extract_segment_features(&reference_swing()).unwrap();

        assert_eq!(features.max_v, 10.0);
        assert!((features.v_peak_time - 0.05).abs() < 1e-12);
        assert_eq!(features.accel_time, features.v_peak_time);
        assert!((features.decel_time - 0.06).abs() < 1e-12);
        assert!((features.accel_time + features.decel_time - 0.11).abs() < 1e-12);
        assert_eq!(features.max_w, 1.0);

        let expected_mean = 59.4 / 12.0;
        assert!((features.mean_v - expected_mean).abs() < 1e-12);
    }

    #[test]
    fn test_constant_w_integral_equals_duration() {
        // w_norm = 1 over 0.11 s integrates to 0.11
        let features = extract_segment_features(&reference_swing()).unwrap();
        assert!((features.w_integral - 0.11).abs() < 1e-12);
    }

    #[test]
    fn test_w_integral_non_negative() {
        let samples: Vec<NormalizedSample> = (0..15)
            .map(|i| sample(i as f64 * 7.0, 1.0 + i as f64, ((i * 37) % 11) as f64))
            .collect();
        let features = extract_segment_features(&samples).unwrap();
        assert!(features.w_integral >= 0.0);
    }

    #[test]
    fn test_peak_tie_uses_first_occurrence() {
        let samples: Vec<NormalizedSample> = [1.0, 5.0, 3.0, 5.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| sample(i as f64 * 10.0, v, 0.0))
            .collect();

        assert_eq!(peak_index(&samples), Some(1));
        let features = extract_segment_features(&samples).unwrap();
        assert!((features.v_peak_time - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let samples = reference_swing();
        let first = extract_segment_features(&samples).unwrap();
        let second = extract_segment_features(&samples).unwrap();

        let first_bits: Vec<u64> = first.as_array().iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u64> = second.as_array().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_empty_segment_is_skipped() {
        assert_eq!(extract_segment_features(&[]), Err(ExtractionSkip::Empty));
    }

    #[test]
    fn test_trapezoid() {
        let area = trapezoid(&[0.0, 2.0, 2.0], &[0.0, 1.0, 3.0]);
        assert!((area - 5.0).abs() < 1e-12);
        assert_eq!(trapezoid(&[4.0], &[0.0]), 0.0);
    }

    #[test]
    fn test_extract_swings_two_gaps() {
        let mut samples = reference_swing();
        // Second swing after a 500 ms pause
        samples.extend(
            reference_swing()
                .into_iter()
                .map(|s| sample(s.timestamp() + 500.0, s.v_norm * 2.0, 2.0)),
        );
        // Lone sample after another pause
        samples.push(sample(5_000.0, 3.0, 0.0));
        let stream = NormalizedStream::new(samples);

        let (vectors, stats) = extract_swings("h1", &stream, &SegmentationConfig::default());

        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.extracted, 2);
        assert_eq!(stats.too_short, 1);
        assert_eq!(stats.rejected(), 1);

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].swing_id, 0);
        assert_eq!(vectors[1].swing_id, 1);
        assert_eq!(vectors[1].features.max_v, 20.0);
        assert!(vectors.iter().all(|v| v.subject_id == "h1"));
    }

    #[test]
    fn test_motionless_stream_yields_no_vectors() {
        let mut samples: Vec<NormalizedSample> =
            (0..20).map(|i| sample(i as f64 * 10.0, 0.0, 0.0)).collect();
        samples.extend((0..20).map(|i| sample(1_000.0 + i as f64 * 10.0, 0.0, 0.0)));
        let stream = NormalizedStream::new(samples);

        let (vectors, stats) = extract_swings("h2", &stream, &SegmentationConfig::default());

        assert!(vectors.is_empty());
        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.no_motion, 2);
    }

    #[test]
    fn test_single_swing_values() {
        let features = extract_single_swing(&[3.0, 4.0, 0.0, 0.0, 0.6, 0.8]);

        assert_eq!(features.max_v, 5.0);
        assert_eq!(features.mean_v, 5.0);
        assert!((features.max_w - 1.0).abs() < 1e-12);
        assert_eq!(features.accel_time, SINGLE_SWING_ACCEL_TIME);
        assert_eq!(features.decel_time, SINGLE_SWING_DECEL_TIME);
        assert_eq!(features.v_peak_time, SINGLE_SWING_V_PEAK_TIME);
        assert!((features.w_integral - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_single_swing_wrong_count_is_zero() {
        assert!(extract_single_swing(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_zero());
        assert!(extract_single_swing(&[1.0; 7]).is_zero());
        assert!(extract_single_swing(&[]).is_zero());
        assert!(extract_single_swing(&[1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0]).is_zero());
    }

    #[test]
    fn test_single_swing_from_string() {
        let features = extract_single_swing_str("-5.946, 1.15, 8.466, 0.378, 0.058, -1.066");
        assert!(!features.is_zero());
        assert!(features.max_v > 10.0);

        assert!(extract_single_swing_str("1 2 3 4 5").is_zero());
        assert!(extract_single_swing_str("1,2,x,4,5,6").is_zero());
    }
}
