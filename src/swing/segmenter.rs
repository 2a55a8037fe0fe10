// Swing segmentation
// Splits a normalized stream into swings wherever the sample timing has a gap

use crate::config::SegmentationConfig;
use crate::swing::types::{NormalizedStream, SwingSegment};

/// Split a stream into contiguous, non-overlapping segments
///
/// Single forward pass over the timestamp deltas. The first sample's delta
/// is treated as zero; every delta strictly greater than the threshold opens
/// a new segment. Every sample ends up in exactly one segment, including
/// tiny ones that the validator will discard later. Swing ids are dense and
/// start at zero.
pub fn segment_stream(stream: &NormalizedStream, gap_threshold_ms: f64) -> Vec<SwingSegment> {
    let samples = &stream.samples;
    if samples.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut start = 0;

    for i in 1..samples.len() {
        let delta = samples[i].timestamp() - samples[i - 1].timestamp();
        if delta > gap_threshold_ms {
            segments.push(SwingSegment {
                swing_id: segments.len(),
                range: start..i,
            });
            start = i;
        }
    }

    segments.push(SwingSegment {
        swing_id: segments.len(),
        range: start..samples.len(),
    });

    segments
}

/// Segment using the threshold from a segmentation config
pub fn segment_with_config(
    stream: &NormalizedStream,
    config: &SegmentationConfig,
) -> Vec<SwingSegment> {
    segment_stream(stream, config.gap_threshold_ms)
}

/// Effective sample rate of a stream in Hz, from its first and last timestamps
/// Returns None when the stream is too short or its time span is not positive
pub fn estimate_sample_rate(stream: &NormalizedStream) -> Option<f64> {
    if stream.len() < 2 {
        return None;
    }

    let first = stream.samples.first()?.timestamp();
    let last = stream.samples.last()?.timestamp();
    let span_ms = last - first;

    if span_ms > 0.0 {
        Some((stream.len() - 1) as f64 * 1000.0 / span_ms)
    } else {
        None
    }
}

/// Whether an estimated rate is within a factor of 1.5 of the nominal rate
pub fn sample_rate_plausible(estimated_hz: f64, nominal_hz: f64) -> bool {
    if nominal_hz <= 0.0 {
        return false;
    }
    let ratio = estimated_hz / nominal_hz;
    (1.0 / 1.5..=1.5).contains(&ratio)
}
