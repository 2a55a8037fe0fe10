// Extraction run tracing
// Append-only JSONL record of what happened to each subject in a run

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::dataset::assembler::SkipReason;
use crate::swing::features::SegmentStats;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Pipeline stage a trace entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
    Discover,
    Subject,
    Assemble,
    Export,
}

/// How a stage ended for its unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Ok,
    Skipped,
    Failed,
}

/// A single line of the run trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 creation time
    pub timestamp: String,

    pub stage: TraceStage,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    pub status: TraceStatus,

    pub message: String,

    /// Structured details, e.g. segment statistics or the skip reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(stage: TraceStage, status: TraceStatus, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            subject_id: None,
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn for_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Entry for a subject whose swings were extracted
    pub fn subject_extracted(subject_id: &str, stats: &SegmentStats) -> Self {
        let entry = TraceEntry::new(
            TraceStage::Subject,
            TraceStatus::Ok,
            format!(
                "{} of {} segments extracted",
                stats.extracted, stats.candidates
            ),
        )
        .for_subject(subject_id);

        match serde_json::to_value(stats) {
            Ok(data) => entry.with_data(data),
            Err(_) => entry,
        }
    }

    /// Entry for a subject left out of the run
    pub fn subject_skipped(subject_id: &str, reason: &SkipReason) -> Self {
        let entry = TraceEntry::new(TraceStage::Subject, TraceStatus::Skipped, reason.to_string())
            .for_subject(subject_id);

        match serde_json::to_value(reason) {
            Ok(data) => entry.with_data(data),
            Err(_) => entry,
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends entries to a JSONL trace file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append one entry; creates the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.write_batch(std::slice::from_ref(entry))
    }

    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for entry in entries {
            file.write_all(entry.to_json_line()?.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_subject_extracted_entry() {
        let stats = SegmentStats {
            candidates: 4,
            too_short: 1,
            extracted: 3,
            ..SegmentStats::default()
        };
        let entry = TraceEntry::subject_extracted("h1", &stats);

        assert_eq!(entry.stage, TraceStage::Subject);
        assert_eq!(entry.status, TraceStatus::Ok);
        assert_eq!(entry.subject_id.as_deref(), Some("h1"));
        assert_eq!(entry.message, "3 of 4 segments extracted");
        assert_eq!(entry.data.unwrap()["too_short"], 1);
    }

    #[test]
    fn test_subject_skipped_entry() {
        let entry = TraceEntry::subject_skipped("h4", &SkipReason::MissingLabel);

        assert_eq!(entry.status, TraceStatus::Skipped);
        assert_eq!(entry.message, "no label row");
        assert_eq!(entry.data.unwrap()["kind"], "missing_label");
    }

    #[test]
    fn test_json_line_format() {
        let entry = TraceEntry::new(TraceStage::Assemble, TraceStatus::Failed, "empty");
        let json_line = entry.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));
        assert!(!json_line.contains("subject_id"));

        let parsed: TraceEntry = serde_json::from_str(json_line.trim()).unwrap();
        assert_eq!(parsed.stage, TraceStage::Assemble);
        assert_eq!(parsed.status, TraceStatus::Failed);
    }

    #[test]
    fn test_trace_writer_appends() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("runs").join("trace.jsonl");
        let writer = TraceWriter::new(trace_path.clone());

        writer
            .write(&TraceEntry::new(TraceStage::Discover, TraceStatus::Ok, "3 files"))
            .unwrap();
        writer
            .write_batch(&[
                TraceEntry::subject_skipped("h2", &SkipReason::NoValidSwings),
                TraceEntry::new(TraceStage::Export, TraceStatus::Ok, "done"),
            ])
            .unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].stage, TraceStage::Discover);
        assert_eq!(entries[1].subject_id.as_deref(), Some("h2"));
        assert_eq!(writer.path(), trace_path.as_path());
    }
}
