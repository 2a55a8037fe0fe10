// Sensor input module
// Handles CSV ingestion and stream normalization

pub mod ingest;
pub mod normalize;

pub use ingest::{
    discover_subject_files, ingest_csv, read_sensor_file, subject_id_from_path, IngestError,
    SensorTable,
};
pub use normalize::{normalize_table, NormalizeError, NormalizedTable};
