// Stream normalization
// Types the raw table into samples and derives v_norm / w_norm per sample

use log::debug;
use thiserror::Error;

use crate::config::ColumnMap;
use crate::sensor::ingest::SensorTable;
use crate::swing::types::{NormalizedSample, NormalizedStream, RawSample};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// A typed stream plus how many rows could not be used
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub stream: NormalizedStream,

    /// Rows with a missing or non-numeric timestamp or channel value
    pub dropped_rows: usize,
}

fn parse_cell(row: &[String], index: usize) -> Option<f64> {
    row.get(index)
        .and_then(|cell| cell.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// Normalize one subject's table
///
/// Column presence is checked before any row is parsed. A table without
/// rows is valid and produces an empty stream.
pub fn normalize_table(
    table: &SensorTable,
    columns: &ColumnMap,
) -> Result<NormalizedTable, NormalizeError> {
    if table.is_empty() {
        return Ok(NormalizedTable::default());
    }

    let names = columns.names();
    let missing: Vec<String> = names
        .iter()
        .filter(|name| table.column_index(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(NormalizeError::MissingColumns(missing));
    }

    let mut indices = [0usize; 7];
    for (slot, name) in indices.iter_mut().zip(names.iter()) {
        *slot = table.column_index(name).ok_or_else(|| {
            NormalizeError::MissingColumns(vec![name.to_string()])
        })?;
    }

    let mut samples = Vec::with_capacity(table.rows.len());
    let mut dropped_rows = 0;

    for row in &table.rows {
        let mut values = [0.0f64; 7];
        let mut usable = true;
        for (value, &index) in values.iter_mut().zip(indices.iter()) {
            match parse_cell(row, index) {
                Some(v) => *value = v,
                None => {
                    usable = false;
                    break;
                }
            }
        }

        if !usable {
            dropped_rows += 1;
            continue;
        }

        let [timestamp, vx, vy, vz, wx, wy, wz] = values;
        samples.push(NormalizedSample::from_raw(RawSample {
            timestamp,
            vx,
            vy,
            vz,
            wx,
            wy,
            wz,
        }));
    }

    if dropped_rows > 0 {
        debug!(
            "Dropped {} of {} rows with missing or non-numeric values",
            dropped_rows,
            table.rows.len()
        );
    }

    Ok(NormalizedTable {
        stream: NormalizedStream::new(samples),
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ingest::ingest_csv;

    const HEADER: &str = "time,acc_x,acc_y,acc_z,time,gyro_x,gyro_y,gyro_z";

    #[test]
    fn test_normalize_computes_norms() {
        let csv = format!("{}\n0,3,4,0,0,0,0,2\n10,1,2,2,10,2,3,6\n", HEADER);
        let table = ingest_csv(csv.as_bytes()).unwrap();

        let result = normalize_table(&table, &ColumnMap::default()).unwrap();
        let samples = &result.stream.samples;

        assert_eq!(samples.len(), 2);
        assert_eq!(result.dropped_rows, 0);
        assert_eq!(samples[0].v_norm, 5.0);
        assert_eq!(samples[0].w_norm, 2.0);
        assert_eq!(samples[1].v_norm, 3.0);
        assert_eq!(samples[1].w_norm, 7.0);
        assert_eq!(samples[1].raw.timestamp, 10.0);
    }

    #[test]
    fn test_missing_columns_detected_before_parsing() {
        let csv = "time,acc_x,acc_y,acc_z\nnot,a,number,row\n";
        let table = ingest_csv(csv.as_bytes()).unwrap();

        let err = normalize_table(&table, &ColumnMap::default()).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MissingColumns(vec![
                "gyro_x".to_string(),
                "gyro_y".to_string(),
                "gyro_z".to_string(),
            ])
        );
    }

    #[test]
    fn test_empty_table_is_valid() {
        let table = ingest_csv(format!("{}\n", HEADER).as_bytes()).unwrap();
        let result = normalize_table(&table, &ColumnMap::default()).unwrap();
        assert!(result.stream.is_empty());

        // No header at all is still an empty table
        let result = normalize_table(&SensorTable::default(), &ColumnMap::default()).unwrap();
        assert!(result.stream.is_empty());
    }

    #[test]
    fn test_unusable_rows_are_dropped() {
        let csv = format!(
            "{}\n0,1,1,1,0,1,1,1\n10,1,,1,10,1,1,1\n20,1,1,1,20,1,1\n30,nan,1,1,30,1,1,1\n40,1,1,1,40,1,1,1\n",
            HEADER
        );
        let table = ingest_csv(csv.as_bytes()).unwrap();

        let result = normalize_table(&table, &ColumnMap::default()).unwrap();
        assert_eq!(result.stream.len(), 2);
        assert_eq!(result.dropped_rows, 3);
    }

    #[test]
    fn test_canonical_column_names() {
        let csv = "timestamp,vx,vy,vz,wx,wy,wz\n0,0,0,1,0,0,0\n";
        let table = ingest_csv(csv.as_bytes()).unwrap();

        let result = normalize_table(&table, &ColumnMap::canonical()).unwrap();
        assert_eq!(result.stream.samples[0].v_norm, 1.0);
    }
}
