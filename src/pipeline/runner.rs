// Pipeline orchestration
// Runs normalize -> segment -> validate -> extract for every subject file, then assembles

use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, PipelineConfig};
use crate::dataset::{
    assemble, export_dataset_csv, load_labels, AssemblyReport, Dataset, DatasetError,
    ExportError, LabelError, LabelTable, SkipReason, SubjectFeatures, SubjectOutcome,
};
use crate::pipeline::trace::{TraceEntry, TraceStage, TraceStatus, TraceWriter};
use crate::sensor::{
    discover_subject_files, normalize_table, read_sensor_file, subject_id_from_path, IngestError,
    SensorTable,
};
use crate::state::{
    self, calculate_sha256, init_db, DbConnection, DbError, RunStatus, SubjectRecord,
    SubjectStatus,
};
use crate::swing::{estimate_sample_rate, extract_swings, sample_rate_plausible};

/// Failures that stop a whole run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Label table error: {0}")]
    Label(#[from] LabelError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("No stored run found")]
    NoStoredRun,
}

/// One subject file and what came out of it
#[derive(Debug, Clone)]
pub struct SubjectRun {
    pub source: PathBuf,

    /// Hex SHA-256 of the file contents; absent when the file was never read
    pub sha256: Option<String>,

    pub outcome: SubjectOutcome,
}

impl SubjectRun {
    /// Persisted form, mirroring the assembler's include/skip decision
    pub fn record(&self, labels: &LabelTable) -> SubjectRecord {
        let (status, reason, swing_count) = match &self.outcome {
            SubjectOutcome::Skipped { reason, .. } => {
                (SubjectStatus::Skipped, Some(reason.to_string()), 0)
            }
            SubjectOutcome::Extracted(features) if features.vectors.is_empty() => (
                SubjectStatus::Skipped,
                Some(SkipReason::NoValidSwings.to_string()),
                0,
            ),
            SubjectOutcome::Extracted(features) if !labels.contains(&features.subject_id) => (
                SubjectStatus::Skipped,
                Some(SkipReason::MissingLabel.to_string()),
                0,
            ),
            SubjectOutcome::Extracted(features) => {
                (SubjectStatus::Included, None, features.vectors.len())
            }
        };

        SubjectRecord {
            subject_id: self.outcome.subject_id().to_string(),
            source_path: self.source.display().to_string(),
            source_sha256: self.sha256.clone(),
            status,
            reason,
            swing_count,
        }
    }

    fn trace_entry(&self) -> TraceEntry {
        match &self.outcome {
            SubjectOutcome::Extracted(features) => {
                TraceEntry::subject_extracted(&features.subject_id, &features.stats)
            }
            SubjectOutcome::Skipped { subject_id, reason } => {
                TraceEntry::subject_skipped(subject_id, reason)
            }
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Database id of the run, when persistence is configured
    pub run_id: Option<Uuid>,
    pub report: AssemblyReport,
    pub subjects: Vec<SubjectRecord>,
}

impl PipelineRun {
    pub fn dataset(&self) -> &Dataset {
        &self.report.dataset
    }
}

/// Normalize and extract one subject's already loaded table
pub fn process_subject_table(
    subject_id: &str,
    table: &SensorTable,
    config: &PipelineConfig,
) -> SubjectOutcome {
    let normalized = match normalize_table(table, &config.input.columns) {
        Ok(normalized) => normalized,
        Err(e) => {
            warn!("Subject {}: {}", subject_id, e);
            return SubjectOutcome::skipped(subject_id, SkipReason::Schema(e.to_string()));
        }
    };

    if normalized.dropped_rows > 0 {
        warn!(
            "Subject {}: dropped {} rows with missing or non-numeric values",
            subject_id, normalized.dropped_rows
        );
    }

    let nominal_hz = config.segmentation.sample_rate_hz;
    if let Some(estimated_hz) = estimate_sample_rate(&normalized.stream) {
        if !sample_rate_plausible(estimated_hz, nominal_hz) {
            warn!(
                "Subject {}: effective sample rate {:.1} Hz far from configured {:.1} Hz",
                subject_id, estimated_hz, nominal_hz
            );
        }
    }

    let (vectors, stats) = extract_swings(subject_id, &normalized.stream, &config.segmentation);
    debug!(
        "Subject {}: {} samples, {} candidate segments, {} extracted",
        subject_id,
        normalized.stream.len(),
        stats.candidates,
        stats.extracted
    );

    SubjectOutcome::Extracted(SubjectFeatures {
        subject_id: subject_id.to_string(),
        vectors,
        stats,
    })
}

/// Process one subject file; never fails, problems become a skip reason
///
/// Subjects without a label row are skipped before their file is read.
pub fn process_subject_file(path: &Path, labels: &LabelTable, config: &PipelineConfig) -> SubjectRun {
    let subject_id = match subject_id_from_path(path) {
        Ok(id) => id,
        Err(e) => {
            warn!("{}", e);
            return SubjectRun {
                source: path.to_path_buf(),
                sha256: None,
                outcome: SubjectOutcome::skipped(
                    path.display().to_string(),
                    SkipReason::Unreadable(e.to_string()),
                ),
            };
        }
    };

    if !labels.contains(&subject_id) {
        return SubjectRun {
            source: path.to_path_buf(),
            sha256: None,
            outcome: SubjectOutcome::skipped(subject_id, SkipReason::MissingLabel),
        };
    }

    let (table, bytes) = match read_sensor_file(path) {
        Ok(read) => read,
        Err(e) => {
            warn!("Subject {}: failed to read {}: {}", subject_id, path.display(), e);
            return SubjectRun {
                source: path.to_path_buf(),
                sha256: None,
                outcome: SubjectOutcome::skipped(subject_id, SkipReason::Unreadable(e.to_string())),
            };
        }
    };

    SubjectRun {
        source: path.to_path_buf(),
        sha256: Some(calculate_sha256(&bytes)),
        outcome: process_subject_table(&subject_id, &table, config),
    }
}

fn emit(trace: Option<&TraceWriter>, entries: &[TraceEntry]) {
    if let Some(writer) = trace {
        if let Err(e) = writer.write_batch(entries) {
            warn!("Failed to write trace {}: {}", writer.path().display(), e);
        }
    }
}

/// Process every subject file in `files`, sequentially or on the rayon pool
pub fn process_subject_files(
    files: &[PathBuf],
    labels: &LabelTable,
    config: &PipelineConfig,
) -> Vec<SubjectRun> {
    if config.output.parallel {
        files
            .par_iter()
            .map(|path| process_subject_file(path, labels, config))
            .collect()
    } else {
        files
            .iter()
            .map(|path| process_subject_file(path, labels, config))
            .collect()
    }
}

/// Assemble subject runs, then export and persist as configured
fn finish_run(
    runs: Vec<SubjectRun>,
    labels: &LabelTable,
    config: &PipelineConfig,
    db: Option<(&DbConnection, Uuid)>,
    trace: Option<&TraceWriter>,
) -> Result<PipelineRun, PipelineError> {
    let subjects: Vec<SubjectRecord> = runs.iter().map(|run| run.record(labels)).collect();
    let entries: Vec<TraceEntry> = runs.iter().map(SubjectRun::trace_entry).collect();
    emit(trace, &entries);

    if let Some((db, run_id)) = db {
        state::record_subjects(db, &run_id, &subjects)?;
    }

    let outcomes = runs.into_iter().map(|run| run.outcome).collect();
    let report = match assemble(outcomes, labels) {
        Ok(report) => report,
        Err(e) => {
            emit(
                trace,
                &[TraceEntry::new(TraceStage::Assemble, TraceStatus::Failed, e.to_string())],
            );
            return Err(e.into());
        }
    };

    emit(
        trace,
        &[TraceEntry::new(
            TraceStage::Assemble,
            TraceStatus::Ok,
            format!(
                "{} examples from {} subjects, {} skipped",
                report.dataset.len(),
                report.included.len(),
                report.skipped.len()
            ),
        )],
    );

    if let Some(path) = &config.output.dataset_csv {
        let rows = export_dataset_csv(&report.dataset, path)?;
        emit(
            trace,
            &[TraceEntry::new(
                TraceStage::Export,
                TraceStatus::Ok,
                format!("{} rows written to {}", rows, path.display()),
            )],
        );
    }

    if let Some((db, run_id)) = db {
        state::insert_examples(db, &run_id, &report.dataset)?;
        state::update_run_status(db, &run_id, RunStatus::Complete)?;
    }

    Ok(PipelineRun {
        run_id: db.map(|(_, id)| id),
        report,
        subjects,
    })
}

/// Run the full extraction pipeline described by `config`
///
/// Per-subject problems are logged, traced and skipped. The run fails only on
/// configuration or IO problems of the run itself, or when no labeled swing
/// survives from any subject.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineRun, PipelineError> {
    config.validate()?;

    let labels = load_labels(&config.labels)?;
    info!(
        "Loaded {} label rows from {}",
        labels.len(),
        config.labels.path.display()
    );

    let trace = config.output.trace.clone().map(TraceWriter::new);
    let db = config.output.database.as_deref().map(init_db).transpose()?;
    let run_id = match &db {
        Some(db) => Some(state::create_run(db, &config.segmentation, labels.score_columns())?.id),
        None => None,
    };

    let files = discover_subject_files(
        &config.input.data_dir,
        &config.input.file_prefix,
        &config.input.file_extension,
    )?;
    info!(
        "Found {} subject files in {}",
        files.len(),
        config.input.data_dir.display()
    );
    emit(
        trace.as_ref(),
        &[TraceEntry::new(
            TraceStage::Discover,
            TraceStatus::Ok,
            format!("{} subject files", files.len()),
        )],
    );

    let runs = process_subject_files(&files, &labels, config);
    let db_run = db.as_ref().zip(run_id);
    let result = finish_run(runs, &labels, config, db_run, trace.as_ref());

    if let (Err(e), Some((db, run_id))) = (&result, db_run) {
        error!("Run {} failed: {}", run_id, e);
        if let Err(status_err) = state::update_run_status(db, &run_id, RunStatus::Failed) {
            warn!("Could not mark run {} as failed: {}", run_id, status_err);
        }
    }

    result
}

/// Reload a stored dataset: the given run, or the latest complete one
pub fn load_stored_dataset(database: &Path, run_id: Option<Uuid>) -> Result<Dataset, PipelineError> {
    let db = init_db(database)?;
    let run_id = match run_id {
        Some(id) => id,
        None => state::latest_complete_run(&db)?
            .ok_or(PipelineError::NoStoredRun)?
            .id,
    };

    let dataset = state::load_dataset(&db, &run_id)?;
    info!("Loaded {} examples from run {}", dataset.len(), run_id);
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::trace::read_trace_file;
    use crate::sensor::ingest_csv;
    use std::fmt::Write as _;
    use tempfile::TempDir;

    const HEADER: &str = "time,acc_x,acc_y,acc_z,time,gyro_x,gyro_y,gyro_z\n";

    /// Two swings of 12 samples at 10 ms spacing, separated by a 500 ms pause
    fn two_swing_csv() -> String {
        let mut csv = HEADER.to_string();
        for swing in 0..2 {
            let start = swing as f64 * 620.0;
            for i in 0..12 {
                let t = start + i as f64 * 10.0;
                let v = if i <= 5 { i as f64 * 2.0 } else { 10.0 - (i - 5) as f64 };
                writeln!(csv, "{},{},0,0,{},0.5,0,0", t, v, t).unwrap();
            }
        }
        csv
    }

    fn write_labels(dir: &Path) -> PathBuf {
        let path = dir.join("labels.csv");
        let mut csv = String::from(
            "Filename,Swing Path Accuracy,Swing Speed Smoothness,Wrist Rotation Timing Accuracy,Hit Timing Accuracy,Ball Contact Position Accuracy\n",
        );
        csv.push_str("h1,4,3.5,4,4.5,3\n");
        csv.push_str("h2,2,2.5,3,3,2\n");
        std::fs::write(&path, csv).unwrap();
        path
    }

    fn setup(dir: &Path) -> PipelineConfig {
        let data_dir = dir.join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        for subject in ["h1", "h2", "h3"] {
            std::fs::write(data_dir.join(format!("{}_session.csv", subject)), two_swing_csv()).unwrap();
        }
        std::fs::write(data_dir.join("notes.txt"), "ignored").unwrap();

        let mut config = PipelineConfig::default();
        config.input.data_dir = data_dir;
        config.labels.path = write_labels(dir);
        config
    }

    #[test]
    fn test_end_to_end_skips_unlabeled_subject() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = setup(temp_dir.path());
        config.output.dataset_csv = Some(temp_dir.path().join("out").join("dataset.csv"));
        config.output.trace = Some(temp_dir.path().join("trace.jsonl"));

        let run = run_pipeline(&config).unwrap();

        assert_eq!(run.dataset().len(), 4);
        assert_eq!(run.dataset().subjects(), vec!["h1", "h2"]);
        assert_eq!(run.report.skipped.len(), 1);
        assert_eq!(run.report.skipped[0].subject_id, "h3");
        assert_eq!(run.report.skipped[0].reason, SkipReason::MissingLabel);
        assert!(run.run_id.is_none());

        let first = &run.dataset().examples[0];
        assert_eq!(first.swing_id, 0);
        assert_eq!(first.features.max_v, 10.0);
        assert_eq!(first.scores, vec![4.0, 3.5, 4.0, 4.5, 3.0]);

        let csv = std::fs::read_to_string(temp_dir.path().join("out").join("dataset.csv")).unwrap();
        assert_eq!(csv.lines().count(), 5);

        let entries = read_trace_file(&temp_dir.path().join("trace.jsonl")).unwrap();
        assert_eq!(entries.first().unwrap().stage, TraceStage::Discover);
        assert!(entries
            .iter()
            .any(|e| e.subject_id.as_deref() == Some("h3") && e.status == TraceStatus::Skipped));
        assert_eq!(entries.last().unwrap().stage, TraceStage::Export);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = setup(temp_dir.path());

        let sequential = run_pipeline(&config).unwrap();
        config.output.parallel = true;
        let parallel = run_pipeline(&config).unwrap();

        assert_eq!(sequential.report.dataset, parallel.report.dataset);
    }

    #[test]
    fn test_persisted_run_reloads() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = setup(temp_dir.path());
        let db_path = temp_dir.path().join("runs.db");
        config.output.database = Some(db_path.clone());

        let run = run_pipeline(&config).unwrap();
        let run_id = run.run_id.unwrap();

        let db = init_db(&db_path).unwrap();
        let stored = state::get_run(&db, &run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Complete);

        let subjects = state::list_subjects(&db, &run_id).unwrap();
        assert_eq!(subjects.len(), 3);
        assert!(subjects[0].source_sha256.is_some());
        assert_eq!(subjects[2].status, SubjectStatus::Skipped);
        assert!(subjects[2].source_sha256.is_none());

        let reloaded = load_stored_dataset(&db_path, None).unwrap();
        assert_eq!(&reloaded, run.dataset());
    }

    #[test]
    fn test_empty_result_fails_and_marks_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = setup(temp_dir.path());
        let db_path = temp_dir.path().join("runs.db");
        config.output.database = Some(db_path.clone());
        config.labels.path = temp_dir.path().join("other_labels.csv");
        std::fs::write(
            &config.labels.path,
            "Filename,Swing Path Accuracy,Swing Speed Smoothness,Wrist Rotation Timing Accuracy,Hit Timing Accuracy,Ball Contact Position Accuracy\nh9,1,1,1,1,1\n",
        )
        .unwrap();

        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(DatasetError::Empty { .. })));

        let db = init_db(&db_path).unwrap();
        let runs = state::list_runs(&db).unwrap();
        assert_eq!(runs[0].run.status, RunStatus::Failed);
        assert!(matches!(
            load_stored_dataset(&db_path, None),
            Err(PipelineError::NoStoredRun)
        ));
    }

    #[test]
    fn test_schema_error_skips_subject() {
        let table = ingest_csv(b"time,acc_x,acc_y\n0,1,2\n").unwrap();
        let outcome = process_subject_table("h1", &table, &PipelineConfig::default());

        match outcome {
            SubjectOutcome::Skipped { subject_id, reason } => {
                assert_eq!(subject_id, "h1");
                assert!(matches!(reason, SkipReason::Schema(_)));
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_motionless_subject_yields_no_swings() {
        let mut csv = HEADER.to_string();
        for i in 0..30 {
            let t = i as f64 * 100.0;
            writeln!(csv, "{},0,0,0,{},0,0,0", t, t).unwrap();
        }
        let table = ingest_csv(csv.as_bytes()).unwrap();

        match process_subject_table("h1", &table, &PipelineConfig::default()) {
            SubjectOutcome::Extracted(features) => {
                assert!(features.vectors.is_empty());
                assert_eq!(features.stats.candidates, 30);
            }
            other => panic!("expected extraction, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_label_skips_before_read() {
        let labels = LabelTable::new(vec!["a".to_string()]);
        let run = process_subject_file(
            Path::new("/nonexistent/h7_session.csv"),
            &labels,
            &PipelineConfig::default(),
        );

        assert_eq!(run.outcome.subject_id(), "h7");
        assert!(run.sha256.is_none());
        assert_eq!(run.record(&labels).reason.as_deref(), Some("no label row"));
    }
}
