// Dataset module
// Label loading, per-subject joins and CSV export of the training table

pub mod assembler;
pub mod export;
pub mod labels;

pub use assembler::{
    assemble, label_subject, AssemblyReport, Dataset, DatasetError, LabeledExample,
    SkipReason, SkippedSubject, SubjectFeatures, SubjectOutcome,
};
pub use export::{export_dataset_csv, write_dataset_csv, ExportError};
pub use labels::{load_labels, load_labels_from, parse_labels, LabelError, LabelTable};
