// Live scoring of a single reading
// Never fails outward: any prediction problem yields an all-zero score card

use log::warn;
use serde::{Deserialize, Serialize};

use super::evaluate::ScoringModel;
use super::model::{Regressor, ScoringError};
use super::standardize::Standardizer;
use crate::config::LabelConfig;
use crate::swing::features::{extract_single_swing, extract_single_swing_str};
use crate::swing::types::SwingFeatures;

/// Predicted score per rating dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub columns: Vec<String>,
    pub values: Vec<f64>,
}

impl ScoreCard {
    pub fn zero(columns: &[String]) -> Self {
        ScoreCard {
            columns: columns.to_vec(),
            values: vec![0.0; columns.len()],
        }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct LiveScorer {
    standardizer: Standardizer,
    regressor: Box<dyn Regressor>,
    score_columns: Vec<String>,
    min_score: f64,
    max_score: f64,
}

impl LiveScorer {
    pub fn new(
        standardizer: Standardizer,
        regressor: Box<dyn Regressor>,
        score_columns: Vec<String>,
        min_score: f64,
        max_score: f64,
    ) -> Self {
        LiveScorer {
            standardizer,
            regressor,
            score_columns,
            min_score,
            max_score,
        }
    }

    /// Score with the fitted forest of an evaluated or loaded model
    pub fn from_model(model: ScoringModel, labels: &LabelConfig) -> Self {
        Self::new(
            model.standardizer,
            Box::new(model.forest),
            model.score_columns,
            labels.min_score,
            labels.max_score,
        )
    }

    pub fn score_columns(&self) -> &[String] {
        &self.score_columns
    }

    /// Raw model output for one feature vector, before rounding and clamping
    pub fn predict(&self, features: &SwingFeatures) -> Result<Vec<f64>, ScoringError> {
        let scaled = self.standardizer.transform(&features.as_array());
        let predicted = self.regressor.predict(&scaled);

        if predicted.len() != self.score_columns.len() {
            return Err(ScoringError::DimensionMismatch {
                expected: self.score_columns.len(),
                found: predicted.len(),
            });
        }
        if predicted.iter().any(|v| !v.is_finite()) {
            return Err(ScoringError::NonFinite("prediction"));
        }
        Ok(predicted)
    }

    /// Score an already extracted feature vector
    pub fn score_features(&self, features: &SwingFeatures) -> ScoreCard {
        match self.predict(features) {
            Ok(predicted) => ScoreCard {
                columns: self.score_columns.clone(),
                values: predicted
                    .into_iter()
                    .map(|v| round2(v).clamp(self.min_score, self.max_score))
                    .collect(),
            },
            Err(e) => {
                warn!("Prediction failed, returning zero scores: {}", e);
                ScoreCard::zero(&self.score_columns)
            }
        }
    }

    /// Score six raw channel values (vx, vy, vz, wx, wy, wz)
    ///
    /// Malformed input is scored as the all-zero feature vector.
    pub fn score(&self, values: &[f64]) -> ScoreCard {
        self.score_features(&extract_single_swing(values))
    }

    /// Score a comma or whitespace separated reading
    pub fn score_str(&self, input: &str) -> ScoreCard {
        self.score_features(&extract_single_swing_str(input))
    }
}
