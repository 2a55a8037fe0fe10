// Sensor file ingestion
// Reads per-subject CSV exports into a string table and derives subject ids

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read sensor file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sensor file is not valid UTF-8")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    #[error("Cannot derive subject id from file name: {0}")]
    InvalidFileName(String),
}

/// Raw tabular contents of one sensor file, before any typing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorTable {
    /// Header cells in file order; names may repeat
    pub headers: Vec<String>,

    /// Data rows; a row may be shorter or longer than the header
    pub rows: Vec<Vec<String>>,
}

impl SensorTable {
    /// Position of the first column with this name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Split one CSV line; double-quoted cells may contain commas and `""` escapes
fn split_cells(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());

    cells
}

/// Parse CSV bytes: first non-blank line is the header, blank lines are ignored
pub fn ingest_csv(data: &[u8]) -> Result<SensorTable, IngestError> {
    let text = std::str::from_utf8(data)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let headers = match lines.next() {
        Some(line) => split_cells(line),
        None => return Ok(SensorTable::default()),
    };

    let rows = lines.map(split_cells).collect();

    Ok(SensorTable { headers, rows })
}

/// Read and parse a sensor file; returns the raw bytes too, for hashing
pub fn read_sensor_file(path: &Path) -> Result<(SensorTable, Vec<u8>), IngestError> {
    let data = std::fs::read(path)?;
    let table = ingest_csv(&data)?;
    Ok((table, data))
}

/// Subject id of a sensor file: the file stem up to the first underscore
/// e.g. `h12_forehand.csv` -> `h12`
pub fn subject_id_from_path(path: &Path) -> Result<String, IngestError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IngestError::InvalidFileName(path.display().to_string()))?;

    let id = stem.split('_').next().unwrap_or(stem);
    if id.is_empty() {
        return Err(IngestError::InvalidFileName(path.display().to_string()));
    }

    Ok(id.to_string())
}

/// Subject files in a directory matching a name prefix and extension, sorted by path
pub fn discover_subject_files(
    dir: &Path,
    prefix: &str,
    extension: &str,
) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let name_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(prefix))
            .unwrap_or(false);
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);

        if name_matches && ext_matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
