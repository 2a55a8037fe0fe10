// Regression model abstraction
// The training side only needs fit/predict over fixed-size feature rows

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::swing::types::FEATURE_COUNT;

/// Errors raised while fitting or evaluating a model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("No training rows")]
    EmptyTrainingSet,

    #[error("Dimension mismatch: expected {expected} values, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Invalid model parameter: {0}")]
    InvalidParameter(String),

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Multi-target regressor over one standardized feature row
pub trait Regressor: Send + Sync {
    /// Number of score targets produced per prediction
    fn targets(&self) -> usize;

    /// Predict one value per target
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Vec<f64>;
}

/// Null model: always predicts the per-target mean of the training scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRegressor {
    means: Vec<f64>,
}

impl MeanRegressor {
    pub fn fit(scores: &[Vec<f64>]) -> Result<Self, ScoringError> {
        let first = scores.first().ok_or(ScoringError::EmptyTrainingSet)?;
        let targets = first.len();
        let mut sums = vec![0.0; targets];

        for row in scores {
            if row.len() != targets {
                return Err(ScoringError::DimensionMismatch {
                    expected: targets,
                    found: row.len(),
                });
            }
            for (sum, value) in sums.iter_mut().zip(row) {
                *sum += value;
            }
        }

        let n = scores.len() as f64;
        let means: Vec<f64> = sums.into_iter().map(|s| s / n).collect();
        if means.iter().any(|m| !m.is_finite()) {
            return Err(ScoringError::NonFinite("training scores"));
        }

        Ok(MeanRegressor { means })
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }
}

impl Regressor for MeanRegressor {
    fn targets(&self) -> usize {
        self.means.len()
    }

    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        self.means.clone()
    }
}
