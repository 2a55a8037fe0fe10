// Data models for persisted extraction runs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub pipeline_version: String,
    pub gap_threshold_ms: f64,
    pub min_segment_samples: usize,
    pub noise_floor: f64,
    pub score_columns: Vec<String>,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Processing,
    Complete,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Processing => "processing",
            RunStatus::Complete => "complete",
            RunStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "complete" => RunStatus::Complete,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Processing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStatus {
    Included,
    Skipped,
}

impl SubjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::Included => "included",
            SubjectStatus::Skipped => "skipped",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "included" => SubjectStatus::Included,
            _ => SubjectStatus::Skipped,
        }
    }
}

/// What a run did with one subject file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject_id: String,
    pub source_path: String,
    pub source_sha256: Option<String>,
    pub status: SubjectStatus,
    pub reason: Option<String>,
    pub swing_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: ExtractionRun,
    pub subject_count: usize,
    pub example_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [RunStatus::Processing, RunStatus::Complete, RunStatus::Failed] {
            assert_eq!(RunStatus::from_string(status.as_str()), status);
        }
        assert_eq!(
            SubjectStatus::from_string(SubjectStatus::Included.as_str()),
            SubjectStatus::Included
        );
        assert_eq!(SubjectStatus::from_string("bogus"), SubjectStatus::Skipped);
    }
}
