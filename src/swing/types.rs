// Swing data types
// Sensor samples, normalized streams, segments and per-swing feature vectors

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Number of scalar features computed per swing
pub const FEATURE_COUNT: usize = 7;

/// Feature column names, in the order used by `SwingFeatures::as_array`
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "max_v",
    "mean_v",
    "max_w",
    "accel_time",
    "decel_time",
    "v_peak_time",
    "w_integral",
];

/// One sensor reading: linear acceleration and angular rate on three axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Milliseconds; non-decreasing in principle but irregularly spaced
    pub timestamp: f64,

    pub vx: f64,
    pub vy: f64,
    pub vz: f64,

    pub wx: f64,
    pub wy: f64,
    pub wz: f64,
}

impl RawSample {
    /// Euclidean norm of the acceleration vector
    pub fn v_norm(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy + self.vz * self.vz).sqrt()
    }

    /// Euclidean norm of the angular rate vector
    pub fn w_norm(&self) -> f64 {
        (self.wx * self.wx + self.wy * self.wy + self.wz * self.wz).sqrt()
    }
}

/// A raw sample carrying its derived magnitude channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSample {
    pub raw: RawSample,
    pub v_norm: f64,
    pub w_norm: f64,
}

impl NormalizedSample {
    pub fn from_raw(raw: RawSample) -> Self {
        NormalizedSample {
            v_norm: raw.v_norm(),
            w_norm: raw.w_norm(),
            raw,
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.raw.timestamp
    }
}

/// Ordered samples of one subject's session
/// Owned by a single subject; never shared across subjects
#[derive(Debug, Clone, Default)]
pub struct NormalizedStream {
    pub samples: Vec<NormalizedSample>,
}

impl NormalizedStream {
    pub fn new(samples: Vec<NormalizedSample>) -> Self {
        NormalizedStream { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples covered by a segment
    pub fn segment_samples(&self, segment: &SwingSegment) -> &[NormalizedSample] {
        &self.samples[segment.range.clone()]
    }
}

/// Contiguous run of stream samples hypothesized to be one swing
///
/// `swing_id` is a dense zero-based index scoped to one stream; `range`
/// indexes into that stream's sample arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwingSegment {
    pub swing_id: usize,
    pub range: Range<usize>,
}

impl SwingSegment {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// The seven scalar features of one swing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingFeatures {
    /// Peak acceleration magnitude
    pub max_v: f64,

    /// Mean acceleration magnitude
    pub mean_v: f64,

    /// Peak angular rate magnitude
    pub max_w: f64,

    /// Seconds from segment start to the acceleration peak
    pub accel_time: f64,

    /// Seconds from the acceleration peak to segment end
    pub decel_time: f64,

    /// Seconds from segment start to the acceleration peak.
    /// Same value as `accel_time`; both columns exist in the label schema.
    pub v_peak_time: f64,

    /// Trapezoidal integral of angular rate magnitude over time (seconds)
    pub w_integral: f64,
}

impl SwingFeatures {
    /// All-zero vector, the fallback for unusable single-swing input
    pub fn zero() -> Self {
        SwingFeatures {
            max_v: 0.0,
            mean_v: 0.0,
            max_w: 0.0,
            accel_time: 0.0,
            decel_time: 0.0,
            v_peak_time: 0.0,
            w_integral: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|v| *v == 0.0)
    }

    /// Features in `FEATURE_NAMES` order
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.max_v,
            self.mean_v,
            self.max_w,
            self.accel_time,
            self.decel_time,
            self.v_peak_time,
            self.w_integral,
        ]
    }
}

/// Features of one valid swing, keyed by subject and swing index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingFeatureVector {
    pub subject_id: String,
    pub swing_id: usize,
    pub features: SwingFeatures,
}
