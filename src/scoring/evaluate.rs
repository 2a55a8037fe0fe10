// Model evaluation
// Seeded train/test split, null model and forest fits, per-target RMSE over an assembled dataset

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::forest::{ForestParams, RandomForestRegressor};
use super::model::{MeanRegressor, Regressor, ScoringError};
use super::standardize::Standardizer;
use crate::config::EvaluationConfig;
use crate::dataset::Dataset;
use crate::swing::types::FEATURE_COUNT;

/// Row indices of a train/test partition, each side in ascending order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with a seeded RNG and hold out `ceil(n * test_fraction)` rows
///
/// Both sides are guaranteed non-empty, so at least two rows are required.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split, ScoringError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ScoringError::InvalidSplit(format!(
            "test fraction {} outside (0, 1)",
            test_fraction
        )));
    }
    if n < 2 {
        return Err(ScoringError::InvalidSplit(format!(
            "need at least 2 rows, have {}",
            n
        )));
    }

    let test_len = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test = indices[..test_len].to_vec();
    let mut train = indices[test_len..].to_vec();
    test.sort_unstable();
    train.sort_unstable();

    Ok(Split { train, test })
}

/// Root mean squared error per target column
pub fn rmse_per_target(predicted: &[Vec<f64>], actual: &[Vec<f64>]) -> Result<Vec<f64>, ScoringError> {
    if predicted.len() != actual.len() {
        return Err(ScoringError::DimensionMismatch {
            expected: actual.len(),
            found: predicted.len(),
        });
    }
    let targets = actual.first().ok_or(ScoringError::EmptyTrainingSet)?.len();

    let mut sums = vec![0.0; targets];
    for (p, a) in predicted.iter().zip(actual) {
        if p.len() != targets || a.len() != targets {
            return Err(ScoringError::DimensionMismatch {
                expected: targets,
                found: if p.len() != targets { p.len() } else { a.len() },
            });
        }
        for (sum, (pv, av)) in sums.iter_mut().zip(p.iter().zip(a)) {
            *sum += (pv - av) * (pv - av);
        }
    }

    let n = actual.len() as f64;
    Ok(sums.into_iter().map(|s| (s / n).sqrt()).collect())
}

/// Errors reading or writing a fitted model file
#[derive(Debug, Error)]
pub enum ModelFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything the live scorer needs: preprocessing, both fitted models and
/// the score columns they predict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringModel {
    pub score_columns: Vec<String>,
    pub standardizer: Standardizer,
    pub null_model: MeanRegressor,
    pub forest: RandomForestRegressor,
}

impl ScoringModel {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Write the model as JSON, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ModelFileError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_bytes()?)?;
        info!("Saved scoring model to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelFileError> {
        let data = std::fs::read(path)?;
        Ok(Self::from_json_bytes(&data)?)
    }
}

/// Held-out error of the null model and the forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub score_columns: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub null_rmse: Vec<f64>,
    pub forest_rmse: Vec<f64>,
}

impl EvaluationReport {
    /// (column, null rmse, forest rmse) in column order
    pub fn per_target(&self) -> impl Iterator<Item = (&str, f64, f64)> + '_ {
        self.score_columns
            .iter()
            .zip(self.null_rmse.iter().zip(&self.forest_rmse))
            .map(|(column, (null, forest))| (column.as_str(), *null, *forest))
    }
}

fn predict_rows(model: &dyn Regressor, rows: &[[f64; FEATURE_COUNT]], indices: &[usize]) -> Vec<Vec<f64>> {
    indices.iter().map(|&i| model.predict(&rows[i])).collect()
}

/// Fit the standardizer on all rows, fit the mean model and the random forest
/// on the training split and report both RMSEs on the held-out split
pub fn evaluate_models(
    dataset: &Dataset,
    config: &EvaluationConfig,
) -> Result<(ScoringModel, EvaluationReport), ScoringError> {
    let features = dataset.feature_matrix();
    let scores = dataset.score_matrix();

    let standardizer = Standardizer::fit(&features)?;
    let scaled = standardizer.transform_all(&features);

    let split = train_test_split(dataset.len(), config.test_fraction, config.seed)?;

    let train_rows: Vec<[f64; FEATURE_COUNT]> = split.train.iter().map(|&i| scaled[i]).collect();
    let train_scores: Vec<Vec<f64>> = split.train.iter().map(|&i| scores[i].clone()).collect();

    let null_model = MeanRegressor::fit(&train_scores)?;
    if null_model.targets() != dataset.score_columns.len() {
        return Err(ScoringError::DimensionMismatch {
            expected: dataset.score_columns.len(),
            found: null_model.targets(),
        });
    }

    let params = ForestParams::from(config);
    let forest = RandomForestRegressor::fit(&train_rows, &train_scores, &params)?;
    info!(
        "Fitted {} trees (max depth {}) on {} rows",
        params.n_trees,
        params.max_depth,
        train_rows.len()
    );

    let actual: Vec<Vec<f64>> = split.test.iter().map(|&i| scores[i].clone()).collect();
    let null_rmse = rmse_per_target(&predict_rows(&null_model, &scaled, &split.test), &actual)?;
    let forest_rmse = rmse_per_target(&predict_rows(&forest, &scaled, &split.test), &actual)?;

    let report = EvaluationReport {
        score_columns: dataset.score_columns.clone(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        null_rmse,
        forest_rmse,
    };

    for (column, null, forest) in report.per_target() {
        info!("RMSE {}: null {:.2}, forest {:.2}", column, null, forest);
    }

    Ok((
        ScoringModel {
            score_columns: dataset.score_columns.clone(),
            standardizer,
            null_model,
            forest,
        },
        report,
    ))
}
