// Dataset assembly
// Joins per-subject swing features with label rows into one training table

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::labels::LabelTable;
use crate::swing::features::SegmentStats;
use crate::swing::types::{SwingFeatureVector, SwingFeatures, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    /// Nothing usable came out of any subject; training cannot proceed
    #[error("No labeled swings extracted ({subjects} subjects processed, {skipped} skipped)")]
    Empty { subjects: usize, skipped: usize },
}

/// Why a whole subject contributed no rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No row for this subject in the label table
    MissingLabel,

    /// The sensor file could not be read
    Unreadable(String),

    /// Required columns are absent
    Schema(String),

    /// Every candidate segment was rejected
    NoValidSwings,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingLabel => write!(f, "no label row"),
            SkipReason::Unreadable(e) => write!(f, "unreadable input: {}", e),
            SkipReason::Schema(e) => write!(f, "schema error: {}", e),
            SkipReason::NoValidSwings => write!(f, "no valid swings"),
        }
    }
}

/// Feature vectors extracted from one subject file
#[derive(Debug, Clone)]
pub struct SubjectFeatures {
    pub subject_id: String,
    pub vectors: Vec<SwingFeatureVector>,
    pub stats: SegmentStats,
}

/// Result of processing one subject
#[derive(Debug, Clone)]
pub enum SubjectOutcome {
    Extracted(SubjectFeatures),
    Skipped { subject_id: String, reason: SkipReason },
}

impl SubjectOutcome {
    pub fn subject_id(&self) -> &str {
        match self {
            SubjectOutcome::Extracted(features) => &features.subject_id,
            SubjectOutcome::Skipped { subject_id, .. } => subject_id,
        }
    }

    pub fn skipped(subject_id: impl Into<String>, reason: SkipReason) -> Self {
        SubjectOutcome::Skipped {
            subject_id: subject_id.into(),
            reason,
        }
    }
}

/// One training row: a swing's features plus its subject's scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub subject_id: String,
    pub swing_id: usize,
    pub features: SwingFeatures,

    /// Aligned with `Dataset::score_columns`
    pub scores: Vec<f64>,
}

/// The combined table handed to the training collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub score_columns: Vec<String>,
    pub examples: Vec<LabeledExample>,
}

impl Dataset {
    pub fn new(score_columns: Vec<String>) -> Self {
        Dataset {
            score_columns,
            examples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn feature_matrix(&self) -> Vec<[f64; FEATURE_COUNT]> {
        self.examples.iter().map(|e| e.features.as_array()).collect()
    }

    pub fn score_matrix(&self) -> Vec<Vec<f64>> {
        self.examples.iter().map(|e| e.scores.clone()).collect()
    }

    /// Distinct subject ids in row order
    pub fn subjects(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for example in &self.examples {
            let id = example.subject_id.as_str();
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

/// A subject left out of the dataset, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSubject {
    pub subject_id: String,
    pub reason: SkipReason,
}

/// Assembled dataset plus the per-subject accounting
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub dataset: Dataset,
    pub included: Vec<String>,
    pub skipped: Vec<SkippedSubject>,
}

/// Join one subject's vectors with its label row, preserving swing order
pub fn label_subject(
    subject_id: &str,
    vectors: &[SwingFeatureVector],
    labels: &LabelTable,
) -> Result<Vec<LabeledExample>, SkipReason> {
    let scores = labels.get(subject_id).ok_or(SkipReason::MissingLabel)?;

    Ok(vectors
        .iter()
        .map(|v| LabeledExample {
            subject_id: subject_id.to_string(),
            swing_id: v.swing_id,
            features: v.features,
            scores: scores.to_vec(),
        })
        .collect())
}

/// Concatenate subject outcomes into one dataset
///
/// Subjects are appended in the order given; rows within a subject keep
/// segment order. Unlabeled or empty subjects are reported, not fatal. An
/// overall empty result is an error.
pub fn assemble(
    outcomes: Vec<SubjectOutcome>,
    labels: &LabelTable,
) -> Result<AssemblyReport, DatasetError> {
    let subjects = outcomes.len();
    let mut dataset = Dataset::new(labels.score_columns().to_vec());
    let mut included = Vec::new();
    let mut skipped = Vec::new();

    for outcome in outcomes {
        let features = match outcome {
            SubjectOutcome::Extracted(features) => features,
            SubjectOutcome::Skipped { subject_id, reason } => {
                warn!("Subject {} skipped: {}", subject_id, reason);
                skipped.push(SkippedSubject { subject_id, reason });
                continue;
            }
        };

        if features.vectors.is_empty() {
            warn!(
                "Subject {} skipped: {} ({} candidate segments)",
                features.subject_id,
                SkipReason::NoValidSwings,
                features.stats.candidates
            );
            skipped.push(SkippedSubject {
                subject_id: features.subject_id,
                reason: SkipReason::NoValidSwings,
            });
            continue;
        }

        match label_subject(&features.subject_id, &features.vectors, labels) {
            Ok(rows) => {
                info!("Subject {}: {} labeled swings", features.subject_id, rows.len());
                dataset.examples.extend(rows);
                included.push(features.subject_id);
            }
            Err(reason) => {
                warn!("Subject {} skipped: {}", features.subject_id, reason);
                skipped.push(SkippedSubject {
                    subject_id: features.subject_id,
                    reason,
                });
            }
        }
    }

    if dataset.is_empty() {
        return Err(DatasetError::Empty {
            subjects,
            skipped: skipped.len(),
        });
    }

    Ok(AssemblyReport {
        dataset,
        included,
        skipped,
    })
}
