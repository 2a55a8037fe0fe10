// Database CRUD operations
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::db::{DbConnection, DbError, DbResult};
use super::models::{ExtractionRun, RunStatus, RunSummary, SubjectRecord, SubjectStatus};
use crate::config::SegmentationConfig;
use crate::dataset::{Dataset, LabeledExample};
use crate::swing::SwingFeatures;

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn parse_uuid(row: &Row<'_>, index: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&row.get::<_, String>(index)?).map_err(|e| conversion_error(index, e))
}

fn parse_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&row.get::<_, String>(index)?)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    serde_json::from_str(&row.get::<_, String>(index)?).map_err(|e| conversion_error(index, e))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<ExtractionRun> {
    Ok(ExtractionRun {
        id: parse_uuid(row, 0)?,
        created_at: parse_timestamp(row, 1)?,
        pipeline_version: row.get(2)?,
        gap_threshold_ms: row.get(3)?,
        min_segment_samples: row.get::<_, i64>(4)? as usize,
        noise_floor: row.get(5)?,
        score_columns: parse_json(row, 6)?,
        status: RunStatus::from_string(&row.get::<_, String>(7)?),
    })
}

const RUN_COLUMNS: &str = "id, created_at, pipeline_version, gap_threshold_ms, min_segment_samples, noise_floor, score_columns, status";

// ==================== RUN QUERIES ====================

/// Create a new run in the processing state
pub fn create_run(
    db: &DbConnection,
    segmentation: &SegmentationConfig,
    score_columns: &[String],
) -> DbResult<ExtractionRun> {
    let run = ExtractionRun {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        pipeline_version: env!("CARGO_PKG_VERSION").to_string(),
        gap_threshold_ms: segmentation.gap_threshold_ms,
        min_segment_samples: segmentation.min_segment_samples,
        noise_floor: segmentation.noise_floor,
        score_columns: score_columns.to_vec(),
        status: RunStatus::Processing,
    };

    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO extraction_runs (id, created_at, pipeline_version, gap_threshold_ms, min_segment_samples, noise_floor, score_columns, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run.id.to_string(),
            run.created_at.to_rfc3339(),
            run.pipeline_version,
            run.gap_threshold_ms,
            run.min_segment_samples as i64,
            run.noise_floor,
            serde_json::to_string(&run.score_columns)?,
            run.status.as_str(),
        ],
    )?;

    Ok(run)
}

/// Get a run by ID
pub fn get_run(db: &DbConnection, id: &Uuid) -> DbResult<Option<ExtractionRun>> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM extraction_runs WHERE id = ?1",
        RUN_COLUMNS
    ))?;

    match stmt.query_row([id.to_string()], run_from_row) {
        Ok(run) => Ok(Some(run)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Most recent run that finished successfully
pub fn latest_complete_run(db: &DbConnection) -> DbResult<Option<ExtractionRun>> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM extraction_runs WHERE status = 'complete'
         ORDER BY created_at DESC LIMIT 1",
        RUN_COLUMNS
    ))?;

    match stmt.query_row([], run_from_row) {
        Ok(run) => Ok(Some(run)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List all runs, newest first, with subject and example counts
pub fn list_runs(db: &DbConnection) -> DbResult<Vec<RunSummary>> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(
        "SELECT r.id, r.created_at, r.pipeline_version, r.gap_threshold_ms,
                r.min_segment_samples, r.noise_floor, r.score_columns, r.status,
                (SELECT COUNT(*) FROM subjects s WHERE s.run_id = r.id),
                (SELECT COUNT(*) FROM examples e WHERE e.run_id = r.id)
         FROM extraction_runs r
         ORDER BY r.created_at DESC",
    )?;

    let runs = stmt
        .query_map([], |row| {
            Ok(RunSummary {
                run: run_from_row(row)?,
                subject_count: row.get::<_, i64>(8)? as usize,
                example_count: row.get::<_, i64>(9)? as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

/// Update run status
pub fn update_run_status(db: &DbConnection, id: &Uuid, status: RunStatus) -> DbResult<()> {
    let conn = db.lock()?;
    let updated = conn.execute(
        "UPDATE extraction_runs SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;

    if updated == 0 {
        return Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
    }
    Ok(())
}

// ==================== SUBJECT QUERIES ====================

/// Record what the run did with each subject file, one row per source path
pub fn record_subjects(db: &DbConnection, run_id: &Uuid, records: &[SubjectRecord]) -> DbResult<()> {
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO subjects (run_id, subject_id, source_path, source_sha256, status, reason, swing_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for record in records {
            stmt.execute(params![
                run_id.to_string(),
                record.subject_id,
                record.source_path,
                record.source_sha256,
                record.status.as_str(),
                record.reason,
                record.swing_count as i64,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn list_subjects(db: &DbConnection, run_id: &Uuid) -> DbResult<Vec<SubjectRecord>> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(
        "SELECT subject_id, source_path, source_sha256, status, reason, swing_count
         FROM subjects WHERE run_id = ?1 ORDER BY source_path",
    )?;

    let records = stmt
        .query_map([run_id.to_string()], |row| {
            Ok(SubjectRecord {
                subject_id: row.get(0)?,
                source_path: row.get(1)?,
                source_sha256: row.get(2)?,
                status: SubjectStatus::from_string(&row.get::<_, String>(3)?),
                reason: row.get(4)?,
                swing_count: row.get::<_, i64>(5)? as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

// ==================== EXAMPLE QUERIES ====================

/// Store every labeled example of a dataset, preserving row order
pub fn insert_examples(db: &DbConnection, run_id: &Uuid, dataset: &Dataset) -> DbResult<usize> {
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO examples (run_id, row_index, subject_id, swing_id, max_v, mean_v, max_w,
                                   accel_time, decel_time, v_peak_time, w_integral, scores)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for (index, example) in dataset.examples.iter().enumerate() {
            let f = &example.features;
            stmt.execute(params![
                run_id.to_string(),
                index as i64,
                example.subject_id,
                example.swing_id as i64,
                f.max_v,
                f.mean_v,
                f.max_w,
                f.accel_time,
                f.decel_time,
                f.v_peak_time,
                f.w_integral,
                serde_json::to_string(&example.scores)?,
            ])?;
        }
    }
    tx.commit()?;
    Ok(dataset.len())
}

/// Rebuild the dataset stored for a run
pub fn load_dataset(db: &DbConnection, run_id: &Uuid) -> DbResult<Dataset> {
    let run = get_run(db, run_id)?
        .ok_or_else(|| DbError::CorruptRow(format!("run {} not found", run_id)))?;

    let conn = db.lock()?;
    let mut stmt = conn.prepare(
        "SELECT subject_id, swing_id, max_v, mean_v, max_w, accel_time, decel_time,
                v_peak_time, w_integral, scores
         FROM examples WHERE run_id = ?1 ORDER BY row_index",
    )?;

    let examples = stmt
        .query_map([run_id.to_string()], |row| {
            Ok(LabeledExample {
                subject_id: row.get(0)?,
                swing_id: row.get::<_, i64>(1)? as usize,
                features: SwingFeatures {
                    max_v: row.get(2)?,
                    mean_v: row.get(3)?,
                    max_w: row.get(4)?,
                    accel_time: row.get(5)?,
                    decel_time: row.get(6)?,
                    v_peak_time: row.get(7)?,
                    w_integral: row.get(8)?,
                },
                scores: parse_json(row, 9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(bad) = examples
        .iter()
        .find(|e| e.scores.len() != run.score_columns.len())
    {
        return Err(DbError::CorruptRow(format!(
            "example {}/{} has {} scores, run has {} score columns",
            bad.subject_id,
            bad.swing_id,
            bad.scores.len(),
            run.score_columns.len()
        )));
    }

    Ok(Dataset {
        score_columns: run.score_columns,
        examples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::db::init_in_memory;

    fn dataset() -> Dataset {
        let example = |subject: &str, swing_id: usize, max_v: f64| LabeledExample {
            subject_id: subject.to_string(),
            swing_id,
            features: SwingFeatures {
                max_v,
                mean_v: max_v / 2.0,
                ..SwingFeatures::zero()
            },
            scores: vec![3.5, 4.0],
        };

        Dataset {
            score_columns: vec!["a".to_string(), "b".to_string()],
            examples: vec![example("h2", 0, 9.0), example("h2", 2, 7.5), example("h1", 1, 8.0)],
        }
    }

    #[test]
    fn test_create_and_get_run() {
        let db = init_in_memory().unwrap();
        let run = create_run(&db, &SegmentationConfig::default(), &["a".to_string()]).unwrap();

        let loaded = get_run(&db, &run.id).unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.status, RunStatus::Processing);
        assert_eq!(loaded.score_columns, vec!["a".to_string()]);
        assert_eq!(loaded.min_segment_samples, 10);

        assert!(get_run(&db, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_examples_round_trip_in_order() {
        let db = init_in_memory().unwrap();
        let data = dataset();
        let run = create_run(&db, &SegmentationConfig::default(), &data.score_columns).unwrap();

        assert_eq!(insert_examples(&db, &run.id, &data).unwrap(), 3);
        let loaded = load_dataset(&db, &run.id).unwrap();

        assert_eq!(loaded, data);
    }

    #[test]
    fn test_latest_complete_run() {
        let db = init_in_memory().unwrap();
        assert!(latest_complete_run(&db).unwrap().is_none());

        let run = create_run(&db, &SegmentationConfig::default(), &["a".to_string()]).unwrap();
        assert!(latest_complete_run(&db).unwrap().is_none());

        update_run_status(&db, &run.id, RunStatus::Complete).unwrap();
        let latest = latest_complete_run(&db).unwrap().unwrap();
        assert_eq!(latest.id, run.id);

        assert!(update_run_status(&db, &Uuid::new_v4(), RunStatus::Failed).is_err());
    }

    #[test]
    fn test_subjects_and_run_summary() {
        let db = init_in_memory().unwrap();
        let data = dataset();
        let run = create_run(&db, &SegmentationConfig::default(), &data.score_columns).unwrap();

        let records = vec![
            SubjectRecord {
                subject_id: "h1".to_string(),
                source_path: "data/h1_a.csv".to_string(),
                source_sha256: Some("abc".to_string()),
                status: SubjectStatus::Included,
                reason: None,
                swing_count: 1,
            },
            SubjectRecord {
                subject_id: "h3".to_string(),
                source_path: "data/h3_a.csv".to_string(),
                source_sha256: None,
                status: SubjectStatus::Skipped,
                reason: Some("no label row".to_string()),
                swing_count: 0,
            },
        ];
        record_subjects(&db, &run.id, &records).unwrap();
        insert_examples(&db, &run.id, &data).unwrap();

        let subjects = list_subjects(&db, &run.id).unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[1].status, SubjectStatus::Skipped);
        assert_eq!(subjects[1].reason.as_deref(), Some("no label row"));

        let runs = list_runs(&db).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].subject_count, 2);
        assert_eq!(runs[0].example_count, 3);
    }
}
