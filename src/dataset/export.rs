// Dataset export
// Writes the labeled example table as CSV for the training collaborator

use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::dataset::assembler::Dataset;
use crate::swing::types::FEATURE_NAMES;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Quote a cell when it would break the row
fn escape_cell(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Header: subject_id, swing_id, the seven features, then the score columns
pub fn header_row(dataset: &Dataset) -> Vec<String> {
    let mut header = vec!["subject_id".to_string(), "swing_id".to_string()];
    header.extend(FEATURE_NAMES.iter().map(|n| n.to_string()));
    header.extend(dataset.score_columns.iter().cloned());
    header
}

/// Write the dataset as CSV to any writer
pub fn write_dataset_csv<W: Write>(dataset: &Dataset, writer: &mut W) -> Result<usize, ExportError> {
    let header: Vec<String> = header_row(dataset).iter().map(|c| escape_cell(c)).collect();
    writeln!(writer, "{}", header.join(","))?;

    for example in &dataset.examples {
        let mut cells = vec![escape_cell(&example.subject_id), example.swing_id.to_string()];
        cells.extend(example.features.as_array().iter().map(|v| v.to_string()));
        cells.extend(example.scores.iter().map(|v| v.to_string()));
        writeln!(writer, "{}", cells.join(","))?;
    }

    Ok(dataset.len())
}

/// Write the dataset to a CSV file, creating parent directories as needed
pub fn export_dataset_csv(dataset: &Dataset, path: &Path) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    let rows = write_dataset_csv(dataset, &mut writer)?;
    writer.flush()?;

    info!("Exported {} labeled swings to {}", rows, path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::assembler::LabeledExample;
    use crate::sensor::ingest::ingest_csv;
    use crate::swing::types::SwingFeatures;
    use tempfile::TempDir;

    fn dataset() -> Dataset {
        Dataset {
            score_columns: vec!["Swing Path Accuracy".to_string(), "Odd, name".to_string()],
            examples: vec![LabeledExample {
                subject_id: "h1".to_string(),
                swing_id: 3,
                features: SwingFeatures {
                    max_v: 10.0,
                    mean_v: 4.5,
                    max_w: 2.0,
                    accel_time: 0.05,
                    decel_time: 0.06,
                    v_peak_time: 0.05,
                    w_integral: 0.11,
                },
                scores: vec![4.0, 2.5],
            }],
        }
    }

    #[test]
    fn test_write_dataset_csv() {
        let mut buffer = Vec::new();
        let rows = write_dataset_csv(&dataset(), &mut buffer).unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "subject_id,swing_id,max_v,mean_v,max_w,accel_time,decel_time,v_peak_time,w_integral,Swing Path Accuracy,\"Odd, name\""
        );
        assert_eq!(lines.next().unwrap(), "h1,3,10,4.5,2,0.05,0.06,0.05,0.11,4,2.5");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_exported_file_reads_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("dataset.csv");

        export_dataset_csv(&dataset(), &path).unwrap();

        let table = ingest_csv(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(table.headers.len(), 11);
        assert_eq!(table.headers[10], "Odd, name");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "h1");
    }
}
