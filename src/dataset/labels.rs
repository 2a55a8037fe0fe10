// Ground-truth label table
// One row of rating scores per subject, read-only once loaded

use log::warn;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::config::LabelConfig;
use crate::sensor::ingest::{ingest_csv, IngestError};

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Failed to read label file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse label file: {0}")]
    Ingest(#[from] IngestError),

    #[error("Label file is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Score rows keyed by subject id
///
/// Scores are stored in `score_columns` order. Rows with a missing,
/// non-numeric or out-of-range score are rejected at load time, so every
/// stored row is complete.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    score_columns: Vec<String>,
    rows: HashMap<String, Vec<f64>>,
}

impl LabelTable {
    pub fn new(score_columns: Vec<String>) -> Self {
        LabelTable {
            score_columns,
            rows: HashMap::new(),
        }
    }

    /// Insert a subject's scores; returns false if the subject already has a row
    pub fn insert(&mut self, subject_id: impl Into<String>, scores: Vec<f64>) -> bool {
        let subject_id = subject_id.into();
        if self.rows.contains_key(&subject_id) {
            return false;
        }
        self.rows.insert(subject_id, scores);
        true
    }

    pub fn get(&self, subject_id: &str) -> Option<&[f64]> {
        self.rows.get(subject_id).map(|v| v.as_slice())
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.rows.contains_key(subject_id)
    }

    pub fn score_columns(&self) -> &[String] {
        &self.score_columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a label CSV according to the label config
pub fn parse_labels(data: &[u8], config: &LabelConfig) -> Result<LabelTable, LabelError> {
    let table = ingest_csv(data)?;

    let mut missing = Vec::new();
    let id_index = table.column_index(&config.id_column);
    if id_index.is_none() {
        missing.push(config.id_column.clone());
    }
    let score_indices: Vec<Option<usize>> = config
        .score_columns
        .iter()
        .map(|name| table.column_index(name))
        .collect();
    for (name, index) in config.score_columns.iter().zip(&score_indices) {
        if index.is_none() {
            missing.push(name.clone());
        }
    }

    let (Some(id_index), true) = (id_index, missing.is_empty()) else {
        return Err(LabelError::MissingColumns(missing));
    };
    let score_indices: Vec<usize> = score_indices.into_iter().flatten().collect();

    let mut labels = LabelTable::new(config.score_columns.clone());

    for (line, row) in table.rows.iter().enumerate() {
        let subject_id = match row.get(id_index).map(|s| s.trim()) {
            Some(id) if !id.is_empty() => id,
            _ => {
                warn!("Label row {}: empty subject id, skipping", line + 1);
                continue;
            }
        };

        let scores: Option<Vec<f64>> = score_indices
            .iter()
            .map(|&i| {
                row.get(i)
                    .and_then(|cell| cell.parse::<f64>().ok())
                    .filter(|v| *v >= config.min_score && *v <= config.max_score)
            })
            .collect();

        let Some(scores) = scores else {
            warn!(
                "Label row for {}: scores missing or outside [{}, {}], skipping",
                subject_id, config.min_score, config.max_score
            );
            continue;
        };

        if !labels.insert(subject_id, scores) {
            warn!("Duplicate label row for {}, keeping the first", subject_id);
        }
    }

    Ok(labels)
}

/// Load the label table from the configured path
pub fn load_labels(config: &LabelConfig) -> Result<LabelTable, LabelError> {
    load_labels_from(&config.path, config)
}

pub fn load_labels_from(path: &Path, config: &LabelConfig) -> Result<LabelTable, LabelError> {
    let data = std::fs::read(path)?;
    parse_labels(&data, config)
}
