// State management module
// Persists extraction runs, per-subject outcomes and labeled examples in SQLite

pub mod db;
pub mod models;
pub mod queries;
pub mod storage;

pub use db::{init_db, init_in_memory, DbConnection, DbError, DbResult};
pub use models::{ExtractionRun, RunStatus, RunSummary, SubjectRecord, SubjectStatus};
pub use queries::{
    create_run, get_run, insert_examples, latest_complete_run, list_runs, list_subjects,
    load_dataset, record_subjects, update_run_status,
};
pub use storage::calculate_sha256;
