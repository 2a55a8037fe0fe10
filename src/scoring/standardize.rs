// Feature standardization
// Per-column mean and population standard deviation, fitted once and reused for live input

use serde::{Deserialize, Serialize};

use super::model::ScoringError;
use crate::swing::types::FEATURE_COUNT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl Standardizer {
    /// Fit on a feature matrix; a zero-variance column gets scale 1.0
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Result<Self, ScoringError> {
        if rows.is_empty() {
            return Err(ScoringError::EmptyTrainingSet);
        }
        let n = rows.len() as f64;

        let mut mean = [0.0; FEATURE_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = [0.0; FEATURE_COUNT];
        for row in rows {
            for ((s, x), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (x - m) * (x - m);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > 0.0 { std } else { 1.0 };
        }

        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err(ScoringError::NonFinite("feature matrix"));
        }

        Ok(Standardizer { mean, scale })
    }

    pub fn transform(&self, row: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (row[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    pub fn transform_all(&self, rows: &[[f64; FEATURE_COUNT]]) -> Vec<[f64; FEATURE_COUNT]> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    pub fn mean(&self) -> &[f64; FEATURE_COUNT] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64; FEATURE_COUNT] {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(first: f64, constant: f64) -> [f64; FEATURE_COUNT] {
        let mut r = [constant; FEATURE_COUNT];
        r[0] = first;
        r
    }

    #[test]
    fn test_population_std() {
        let scaler = Standardizer::fit(&[row(1.0, 2.0), row(3.0, 2.0)]).unwrap();

        assert_eq!(scaler.mean()[0], 2.0);
        assert_eq!(scaler.scale()[0], 1.0);
        assert_eq!(scaler.transform(&row(3.0, 2.0))[0], 1.0);
        assert_eq!(scaler.transform(&row(1.0, 2.0))[0], -1.0);
    }

    #[test]
    fn test_zero_variance_column() {
        let scaler = Standardizer::fit(&[row(0.0, 5.0), row(4.0, 5.0)]).unwrap();

        assert_eq!(scaler.scale()[1], 1.0);
        assert_eq!(scaler.transform(&row(0.0, 7.0))[1], 2.0);
    }

    #[test]
    fn test_empty_fit_fails() {
        assert_eq!(Standardizer::fit(&[]), Err(ScoringError::EmptyTrainingSet));
    }
}
