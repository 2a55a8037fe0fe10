// Pipeline execution and monitoring module
// Orchestrates per-subject extraction and records a run trace

pub mod runner;
pub mod trace;

pub use runner::{
    load_stored_dataset, process_subject_file, process_subject_files, process_subject_table,
    run_pipeline, PipelineError, PipelineRun, SubjectRun,
};
pub use trace::{read_trace_file, TraceEntry, TraceError, TraceStage, TraceStatus, TraceWriter};
